//! Container and volume lookup by name prefix.
//!
//! The runtime's `name` filter matches substrings, so results are narrowed
//! here to names that actually start with the prefix.

use crate::container::runtime::{ContainerInfo, RuntimeClient, VolumeInfo};
use crate::container::{ContainerError, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("static name pattern is valid")
    })
}

/// Check that `prefix` only uses characters the runtime accepts in names.
///
/// # Errors
///
/// Returns `ConfigError` for an empty or malformed prefix.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if name_pattern().is_match(prefix) {
        Ok(())
    } else {
        Err(ContainerError::ConfigError(format!(
            "invalid name prefix '{}': expected [a-zA-Z0-9][a-zA-Z0-9_.-]*",
            prefix
        )))
    }
}

/// All containers, running or stopped, with a name starting with `prefix`.
///
/// # Errors
///
/// Returns error if the prefix is invalid or the runtime query fails.
pub async fn prefixed_containers<R>(client: &R, prefix: &str) -> Result<Vec<ContainerInfo>>
where
    R: RuntimeClient + ?Sized,
{
    validate_prefix(prefix)?;

    let containers: Vec<ContainerInfo> = client
        .list_containers(prefix)
        .await?
        .into_iter()
        .filter(|c| c.names.iter().any(|name| name.starts_with(prefix)))
        .collect();

    debug!("Found {} containers with prefix {}", containers.len(), prefix);
    Ok(containers)
}

/// All volumes with a name starting with `prefix`.
///
/// # Errors
///
/// Returns error if the prefix is invalid or the runtime query fails.
pub async fn prefixed_volumes<R>(client: &R, prefix: &str) -> Result<Vec<VolumeInfo>>
where
    R: RuntimeClient + ?Sized,
{
    validate_prefix(prefix)?;

    let volumes: Vec<VolumeInfo> = client
        .list_volumes(prefix)
        .await?
        .into_iter()
        .filter(|v| v.name.starts_with(prefix))
        .collect();

    debug!("Found {} volumes with prefix {}", volumes.len(), prefix);
    Ok(volumes)
}

/// The single container of `service` in the `prefix` deployment, named
/// `<prefix>-<service>`.
///
/// # Errors
///
/// Returns `NotFound` unless exactly one container matches.
pub async fn find_service_container<R>(
    client: &R,
    prefix: &str,
    service: &str,
) -> Result<ContainerInfo>
where
    R: RuntimeClient + ?Sized,
{
    let name = format!("{}-{}", prefix, service);
    let mut matches = prefixed_containers(client, &name).await?;

    if matches.len() == 1 {
        return Ok(matches.remove(0));
    }

    Err(ContainerError::NotFound(format!(
        "could not identify {} container {} ({} candidates)",
        service,
        name,
        matches.len()
    )))
}
