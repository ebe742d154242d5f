//! Rollback of resources created by a provisioning workflow.
//!
//! A [`CleanupCoordinator`] owns a background task that records every container
//! and volume the workflow reports. The lists live only inside that task and are
//! reachable only through messages. When the workflow completes with an error,
//! every recorded resource gets one forced removal attempt: containers first,
//! then volumes, each kind in registration order. A removal failure is reported
//! and the remaining removals still run.

use crate::container::runtime::{ResourceKind, ResourceRecord, RuntimeClient};
use crate::container::{ContainerError, Result};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Receives the outcome of each rollback step.
pub trait RollbackSink: Send + 'static {
    /// A forced removal of `record` is about to be attempted.
    fn attempted(&mut self, record: &ResourceRecord);

    /// The removal of `record` failed.
    fn failed(&mut self, record: &ResourceRecord, error: &ContainerError);
}

/// Sink that prints each attempt to `out` and each failure to `err`.
pub struct WriterSink<O, E> {
    out: O,
    err: E,
}

impl<O, E> WriterSink<O, E>
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }
}

impl WriterSink<std::io::Stdout, std::io::Stderr> {
    /// Attempts on stdout, failures on stderr.
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O, E> RollbackSink for WriterSink<O, E>
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    fn attempted(&mut self, record: &ResourceRecord) {
        let _ = writeln!(self.out, "{}", record);
    }

    fn failed(&mut self, _record: &ResourceRecord, error: &ContainerError) {
        let _ = writeln!(self.err, "{}", error);
    }
}

enum CleanupMessage {
    Register(ResourceRecord),
    Complete(Option<String>),
}

/// Cloneable registration endpoint handed to provisioning steps.
#[derive(Clone)]
pub struct CleanupHandle {
    tx: mpsc::UnboundedSender<CleanupMessage>,
}

impl CleanupHandle {
    /// Record a created container.
    pub fn register_container(&self, identifier: impl Into<String>) {
        self.register(ResourceRecord::container(identifier));
    }

    /// Record a created volume.
    pub fn register_volume(&self, identifier: impl Into<String>) {
        self.register(ResourceRecord::volume(identifier));
    }

    fn register(&self, record: ResourceRecord) {
        if self.tx.send(CleanupMessage::Register(record)).is_err() {
            debug!("Workflow already completed, ignoring registration");
        }
    }
}

/// Owner of the rollback actor for one provisioning workflow.
pub struct CleanupCoordinator {
    handle: CleanupHandle,
    task: JoinHandle<()>,
    workflow: Uuid,
}

impl CleanupCoordinator {
    /// Spawn the actor. Must be called within a tokio runtime.
    pub fn start<R, S>(client: Arc<R>, sink: S) -> Self
    where
        R: RuntimeClient + ?Sized + 'static,
        S: RollbackSink,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let workflow = Uuid::new_v4();
        let task = tokio::spawn(run_actor(client, sink, rx, workflow));

        debug!("Cleanup coordinator started for workflow {}", workflow);

        Self {
            handle: CleanupHandle { tx },
            task,
            workflow,
        }
    }

    /// Identifier used in log lines for this workflow.
    pub fn workflow_id(&self) -> Uuid {
        self.workflow
    }

    pub fn handle(&self) -> CleanupHandle {
        self.handle.clone()
    }

    pub fn register_container(&self, identifier: impl Into<String>) {
        self.handle.register_container(identifier);
    }

    pub fn register_volume(&self, identifier: impl Into<String>) {
        self.handle.register_volume(identifier);
    }

    /// Signal the end of the workflow and wait for any rollback to finish.
    ///
    /// `None` means the workflow succeeded and nothing is removed. With an
    /// error description every recorded resource is removed best-effort.
    pub async fn complete(self, failure: Option<String>) {
        if self
            .handle
            .tx
            .send(CleanupMessage::Complete(failure))
            .is_err()
        {
            warn!("Cleanup coordinator for workflow {} is gone", self.workflow);
        }

        if let Err(e) = self.task.await {
            warn!(
                "Cleanup coordinator for workflow {} stopped abnormally: {}",
                self.workflow, e
            );
        }
    }
}

async fn run_actor<R, S>(
    client: Arc<R>,
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<CleanupMessage>,
    workflow: Uuid,
) where
    R: RuntimeClient + ?Sized,
    S: RollbackSink,
{
    let mut created_containers: Vec<ResourceRecord> = Vec::new();
    let mut created_volumes: Vec<ResourceRecord> = Vec::new();

    while let Some(message) = rx.recv().await {
        match message {
            CleanupMessage::Register(record) => {
                debug!("Workflow {} created {}", workflow, record);
                match record.kind {
                    ResourceKind::Container => created_containers.push(record),
                    ResourceKind::Volume => created_volumes.push(record),
                }
            }
            CleanupMessage::Complete(None) => {
                debug!("Workflow {} succeeded, nothing to roll back", workflow);
                return;
            }
            CleanupMessage::Complete(Some(reason)) => {
                info!(
                    "Workflow {} failed ({}), rolling back {} containers and {} volumes",
                    workflow,
                    reason,
                    created_containers.len(),
                    created_volumes.len()
                );
                rollback(client.as_ref(), &created_containers, &created_volumes, &mut sink)
                    .await;
                return;
            }
        }
    }

    debug!("All handles for workflow {} dropped before completion", workflow);
}

/// Force-remove `containers` then `volumes`, in order, reporting each step to
/// `sink`. Never stops early.
pub async fn rollback<R, S>(
    client: &R,
    containers: &[ResourceRecord],
    volumes: &[ResourceRecord],
    sink: &mut S,
) where
    R: RuntimeClient + ?Sized,
    S: RollbackSink + ?Sized,
{
    for record in containers.iter().chain(volumes) {
        sink.attempted(record);

        let result = match record.kind {
            ResourceKind::Container => client.remove_container(&record.identifier).await,
            ResourceKind::Volume => client.remove_volume(&record.identifier).await,
        };

        if let Err(e) = result {
            warn!("Failed to remove {}: {}", record, e);
            sink.failed(record, &e);
        }
    }
}

/// Run `workflow` with a fresh coordinator and roll back if it fails.
///
/// The workflow's own result is returned as-is; rollback outcomes only go to
/// `sink`.
///
/// # Errors
///
/// Returns the workflow's error after rollback has finished.
pub async fn provision<R, S, F, Fut, T>(client: Arc<R>, sink: S, workflow: F) -> Result<T>
where
    R: RuntimeClient + ?Sized + 'static,
    S: RollbackSink,
    F: FnOnce(CleanupHandle) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let coordinator = CleanupCoordinator::start(client, sink);
    let result = workflow(coordinator.handle()).await;

    let failure = result.as_ref().err().map(|e| e.to_string());
    coordinator.complete(failure).await;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testing::{Call, MockRuntime};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink {
        attempted: Arc<Mutex<Vec<ResourceRecord>>>,
        failed: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RollbackSink for RecordingSink {
        fn attempted(&mut self, record: &ResourceRecord) {
            self.attempted.lock().unwrap().push(record.clone());
        }

        fn failed(&mut self, record: &ResourceRecord, error: &ContainerError) {
            self.failed
                .lock()
                .unwrap()
                .push((record.identifier.clone(), error.to_string()));
        }
    }

    #[tokio::test]
    async fn test_failure_removes_containers_then_volumes_in_order() {
        let runtime = Arc::new(MockRuntime::new());
        let sink = RecordingSink::default();
        let coordinator = CleanupCoordinator::start(runtime.clone(), sink.clone());

        coordinator.register_container("c1");
        coordinator.register_volume("v1");
        coordinator.register_container("c2");
        coordinator.complete(Some("network create failed".to_string())).await;

        assert_eq!(
            runtime.calls(),
            vec![
                Call::RemoveContainer("c1".to_string()),
                Call::RemoveContainer("c2".to_string()),
                Call::RemoveVolume("v1".to_string()),
            ]
        );
        assert_eq!(sink.attempted.lock().unwrap().len(), 3);
        assert!(sink.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_removes_nothing() {
        let runtime = Arc::new(MockRuntime::new());
        let coordinator = CleanupCoordinator::start(runtime.clone(), RecordingSink::default());

        coordinator.register_container("c1");
        coordinator.register_volume("v1");
        coordinator.complete(None).await;

        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_workflow_success() {
        let runtime = Arc::new(MockRuntime::new());
        let coordinator = CleanupCoordinator::start(runtime.clone(), RecordingSink::default());
        coordinator.complete(None).await;
        assert!(runtime.removals().is_empty());
    }

    #[tokio::test]
    async fn test_removal_failure_does_not_stop_rollback() {
        let runtime = Arc::new(MockRuntime {
            fail_removals: ["c1".to_string(), "v1".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let sink = RecordingSink::default();
        let coordinator = CleanupCoordinator::start(runtime.clone(), sink.clone());

        coordinator.register_container("c1");
        coordinator.register_container("c2");
        coordinator.register_volume("v1");
        coordinator.register_volume("v2");
        coordinator.complete(Some("boom".to_string())).await;

        assert_eq!(runtime.removals(), vec!["c1", "c2", "v1", "v2"]);

        let failed = sink.failed.lock().unwrap();
        let failed_ids: Vec<&str> = failed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(failed_ids, vec!["c1", "v1"]);
    }

    #[tokio::test]
    async fn test_registrations_from_concurrent_steps() {
        let runtime = Arc::new(MockRuntime::new());
        let coordinator = CleanupCoordinator::start(runtime.clone(), RecordingSink::default());

        let steps: Vec<_> = (0..4)
            .map(|i| {
                let handle = coordinator.handle();
                tokio::spawn(async move {
                    handle.register_volume(format!("v{}", i));
                })
            })
            .collect();
        for step in steps {
            step.await.unwrap();
        }

        coordinator.complete(Some("late failure".to_string())).await;

        let mut removed = runtime.removals();
        removed.sort();
        assert_eq!(removed, vec!["v0", "v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn test_registration_after_completion_is_ignored() {
        let runtime = Arc::new(MockRuntime::new());
        let coordinator = CleanupCoordinator::start(runtime.clone(), RecordingSink::default());
        let handle = coordinator.handle();

        coordinator.complete(None).await;
        handle.register_container("too-late");

        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_writer_sink_output() {
        let mut sink = WriterSink::new(Vec::new(), Vec::new());
        sink.attempted(&ResourceRecord::container("c1"));
        sink.failed(
            &ResourceRecord::container("c1"),
            &ContainerError::NotFound("c1".to_string()),
        );

        assert_eq!(String::from_utf8(sink.out).unwrap(), "container: c1\n");
        assert_eq!(String::from_utf8(sink.err).unwrap(), "Not found: c1\n");
    }

    #[tokio::test]
    async fn test_provision_returns_workflow_error_after_rollback() {
        let runtime = Arc::new(MockRuntime::new());
        let sink = RecordingSink::default();

        let result: Result<()> = provision(runtime.clone(), sink.clone(), |handle| async move {
            handle.register_volume("dev-data");
            handle.register_container("dev-web");
            Err(ContainerError::ConfigError("port already allocated".to_string()))
        })
        .await;

        match result {
            Err(ContainerError::ConfigError(msg)) => assert_eq!(msg, "port already allocated"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(runtime.removals(), vec!["dev-web", "dev-data"]);
    }

    #[tokio::test]
    async fn test_provision_success_keeps_resources() {
        let runtime = Arc::new(MockRuntime::new());

        let value = provision(runtime.clone(), RecordingSink::default(), |handle| async move {
            handle.register_container("dev-web");
            Ok(42)
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert!(runtime.removals().is_empty());
    }
}
