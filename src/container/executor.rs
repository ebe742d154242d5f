//! One-shot command execution.
//!
//! Runs a command in a running container without bridging the terminal and
//! reports whether it succeeded.

use crate::container::interactive::copy_output;
use crate::container::runtime::{ExecFlags, RuntimeClient};
use crate::container::Result;
use tokio::io::AsyncWrite;
use tracing::debug;

/// Execution spec builder.
pub struct ExecSpecBuilder {
    cmd: Vec<String>,
    env: Vec<String>,
    working_dir: Option<String>,
    user: Option<String>,
    attach_stdout: bool,
    attach_stderr: bool,
    tty: bool,
    privileged: bool,
}

impl Default for ExecSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecSpecBuilder {
    /// Create a builder for a privileged tty session with output attached.
    pub fn new() -> Self {
        Self {
            cmd: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            user: None,
            attach_stdout: true,
            attach_stderr: true,
            tty: true,
            privileged: true,
        }
    }

    /// Program and arguments.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Directory the command starts in.
    pub fn working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Attach to stdout.
    pub fn attach_stdout(mut self, attach: bool) -> Self {
        self.attach_stdout = attach;
        self
    }

    /// Attach to stderr.
    pub fn attach_stderr(mut self, attach: bool) -> Self {
        self.attach_stderr = attach;
        self
    }

    /// Allocate a TTY. With a TTY the runtime merges stderr into stdout.
    pub fn tty(mut self, enable: bool) -> Self {
        self.tty = enable;
        self
    }

    /// Run with elevated privileges.
    pub fn privileged(mut self, enable: bool) -> Self {
        self.privileged = enable;
        self
    }

    pub fn build(self) -> ExecSpec {
        ExecSpec {
            cmd: self.cmd,
            flags: ExecFlags {
                privileged: self.privileged,
                tty: self.tty,
                attach_stdin: false,
                attach_stdout: self.attach_stdout,
                attach_stderr: self.attach_stderr,
                env: self.env,
                working_dir: self.working_dir,
                user: self.user,
            },
        }
    }
}

/// A one-shot command and the options it runs with.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    cmd: Vec<String>,
    flags: ExecFlags,
}

impl ExecSpec {
    pub fn builder() -> ExecSpecBuilder {
        ExecSpecBuilder::new()
    }

    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    pub fn flags(&self) -> &ExecFlags {
        &self.flags
    }
}

/// Execute `spec` in `container_id`, streaming its output into `out`.
///
/// Returns `true` when the command exited with code 0.
///
/// # Errors
///
/// Returns error if the session cannot be created, attached or inspected, or
/// if writing the output fails.
pub async fn exec_to_writer<R, W>(
    client: &R,
    container_id: &str,
    spec: &ExecSpec,
    out: &mut W,
) -> Result<bool>
where
    R: RuntimeClient + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    debug!(
        "Executing command in container {}: {:?}",
        container_id, spec.cmd
    );

    let id = client
        .create_exec(container_id, &spec.cmd, &spec.flags)
        .await?;
    let attachment = client.attach_exec(&id, spec.flags.tty).await?;

    // stdin is never attached, so the input half is dropped right away
    drop(attachment.input);
    let copied = copy_output(attachment.output, out).await?;

    let exit_code = client.inspect_exec(&id).await?;
    debug!(
        "Command produced {} bytes and exited with code {:?}",
        copied, exit_code
    );

    Ok(exit_code == Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testing::{Call, MockRuntime, SharedBuffer};

    #[test]
    fn test_exec_spec_builder() {
        let spec = ExecSpec::builder()
            .cmd(vec!["echo", "hello"])
            .env("FOO", "bar")
            .working_dir("/tmp")
            .user("root")
            .tty(false)
            .build();

        assert_eq!(spec.cmd(), &["echo", "hello"]);
        assert_eq!(spec.flags().env, vec!["FOO=bar"]);
        assert_eq!(spec.flags().working_dir, Some("/tmp".to_string()));
        assert_eq!(spec.flags().user, Some("root".to_string()));
        assert!(!spec.flags().tty);
        assert!(!spec.flags().attach_stdin);
    }

    #[test]
    fn test_exec_spec_defaults_match_one_shot_mode() {
        let flags = ExecSpec::builder().cmd(["true"]).build().flags().clone();
        assert!(flags.privileged);
        assert!(flags.tty);
        assert!(flags.attach_stdout && flags.attach_stderr);
    }

    #[tokio::test]
    async fn test_exec_success() {
        let runtime = MockRuntime {
            output: vec![b"ok\n".to_vec()],
            exit_code: Some(0),
            ..Default::default()
        };
        let mut out = SharedBuffer::default();
        let spec = ExecSpec::builder().cmd(["cat", "/etc/hostname"]).build();

        let success = exec_to_writer(&runtime, "dev-db", &spec, &mut out)
            .await
            .unwrap();

        assert!(success);
        assert_eq!(out.contents(), b"ok\n");
        assert_eq!(
            runtime.calls()[1],
            Call::AttachExec {
                session: "exec-dev-db".to_string(),
                tty: true
            }
        );
    }

    #[tokio::test]
    async fn test_exec_nonzero_exit_is_failure() {
        let runtime = MockRuntime {
            exit_code: Some(2),
            ..Default::default()
        };
        let mut out = SharedBuffer::default();
        let spec = ExecSpec::builder().cmd(["false"]).build();

        assert!(!exec_to_writer(&runtime, "dev-db", &spec, &mut out)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_exec_still_running_is_failure() {
        let runtime = MockRuntime {
            exit_code: None,
            ..Default::default()
        };
        let mut out = SharedBuffer::default();
        let spec = ExecSpec::builder().cmd(["sleep", "1"]).build();

        assert!(!exec_to_writer(&runtime, "dev-db", &spec, &mut out)
            .await
            .unwrap());
    }
}
