//! In-memory runtime and console used by the unit tests.

use crate::container::runtime::{
    ContainerInfo, ExecAttachment, ExecFlags, RuntimeClient, VolumeInfo,
};
use crate::container::terminal::Console;
use crate::container::{ContainerError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::sync::oneshot;

/// A runtime call observed by [`MockRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateExec {
        container: String,
        command: Vec<String>,
        flags: ExecFlags,
    },
    AttachExec {
        session: String,
        tty: bool,
    },
    InspectExec(String),
    RemoveContainer(String),
    RemoveVolume(String),
    ListContainers(String),
    ListVolumes(String),
}

/// Byte sink shared between a test and the code under test.
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Runtime double that records every call in order.
#[derive(Default)]
pub struct MockRuntime {
    pub calls: Mutex<Vec<Call>>,
    /// Chunks emitted by an attached session
    pub output: Vec<Vec<u8>>,
    /// Emit an error after the chunks
    pub output_error: bool,
    /// Never end the output stream
    pub hold_output_open: bool,
    pub exit_code: Option<i64>,
    pub fail_create: bool,
    pub fail_attach: bool,
    /// Identifiers whose removal fails
    pub fail_removals: HashSet<String>,
    pub containers: Vec<ContainerInfo>,
    pub volumes: Vec<VolumeInfo>,
    /// Bytes written into session stdin
    pub stdin: SharedBuffer,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Identifiers passed to removal calls, in call order.
    pub fn removals(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RemoveContainer(id) | Call::RemoveVolume(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn create_exec(
        &self,
        container: &str,
        command: &[String],
        flags: &ExecFlags,
    ) -> Result<String> {
        self.record(Call::CreateExec {
            container: container.to_string(),
            command: command.to_vec(),
            flags: flags.clone(),
        });
        if self.fail_create {
            return Err(ContainerError::NotFound(container.to_string()));
        }
        Ok(format!("exec-{}", container))
    }

    async fn attach_exec(&self, session_id: &str, tty: bool) -> Result<ExecAttachment> {
        self.record(Call::AttachExec {
            session: session_id.to_string(),
            tty,
        });
        if self.fail_attach {
            return Err(ContainerError::ExecutionError("attach refused".to_string()));
        }

        let mut items: Vec<io::Result<Vec<u8>>> = self.output.iter().cloned().map(Ok).collect();
        if self.output_error {
            items.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by runtime",
            )));
        }
        let output = if self.hold_output_open {
            stream::iter(items).chain(stream::pending()).boxed()
        } else {
            stream::iter(items).boxed()
        };

        Ok(ExecAttachment {
            output,
            input: Box::pin(self.stdin.clone()),
        })
    }

    async fn inspect_exec(&self, session_id: &str) -> Result<Option<i64>> {
        self.record(Call::InspectExec(session_id.to_string()));
        Ok(self.exit_code)
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        self.record(Call::RemoveContainer(container_id.to_string()));
        if self.fail_removals.contains(container_id) {
            return Err(ContainerError::NotFound(container_id.to_string()));
        }
        Ok(())
    }

    async fn remove_volume(&self, volume_id: &str) -> Result<()> {
        self.record(Call::RemoveVolume(volume_id.to_string()));
        if self.fail_removals.contains(volume_id) {
            return Err(ContainerError::Other(format!("volume {} is in use", volume_id)));
        }
        Ok(())
    }

    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerInfo>> {
        self.record(Call::ListContainers(name_filter.to_string()));
        Ok(self.containers.clone())
    }

    async fn list_volumes(&self, name_filter: &str) -> Result<Vec<VolumeInfo>> {
        self.record(Call::ListVolumes(name_filter.to_string()));
        Ok(self.volumes.clone())
    }
}

pub fn container_info(id: &str, name: &str) -> ContainerInfo {
    ContainerInfo {
        id: id.to_string(),
        names: vec![name.to_string()],
        image: "alpine:3.20".to_string(),
        state: "running".to_string(),
        created: 1_700_000_000,
    }
}

pub fn volume_info(name: &str) -> VolumeInfo {
    VolumeInfo {
        name: name.to_string(),
        driver: "local".to_string(),
        mountpoint: format!("/var/lib/docker/volumes/{}/_data", name),
    }
}

/// Console double with observable raw-mode transitions.
pub struct ScriptedConsole {
    pub interactive: bool,
    pub fail_raw: bool,
    pub width: Option<u16>,
    /// Bytes the operator types; `None` keeps stdin open and silent
    pub input: Option<Vec<u8>>,
    pub output: SharedBuffer,
    pub raw_entries: Arc<AtomicUsize>,
    pub restores: Arc<AtomicUsize>,
    pub restored_states: Arc<Mutex<Vec<u32>>>,
    interrupt: Option<oneshot::Receiver<()>>,
    held_stdin: Option<DuplexStream>,
    next_state: u32,
}

impl ScriptedConsole {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            fail_raw: false,
            width: Some(80),
            input: None,
            output: SharedBuffer::default(),
            raw_entries: Arc::new(AtomicUsize::new(0)),
            restores: Arc::new(AtomicUsize::new(0)),
            restored_states: Arc::new(Mutex::new(Vec::new())),
            interrupt: None,
            held_stdin: None,
            next_state: 7,
        }
    }

    /// Returns a sender that delivers the operator interrupt.
    pub fn interrupt_on(&mut self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.interrupt = Some(rx);
        tx
    }

    pub fn raw_entries(&self) -> usize {
        self.raw_entries.load(Ordering::SeqCst)
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl Console for ScriptedConsole {
    type State = u32;

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn enter_raw_mode(&mut self) -> Result<u32> {
        if self.fail_raw {
            return Err(ContainerError::Terminal("not a terminal".to_string()));
        }
        self.raw_entries.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_state)
    }

    fn restore_mode(&mut self, state: u32) {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.restored_states.lock().unwrap().push(state);
    }

    fn width(&self) -> Option<u16> {
        self.width
    }

    fn streams(
        &mut self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        Box<dyn AsyncWrite + Send + Unpin>,
    ) {
        let reader: Box<dyn AsyncRead + Send + Unpin> = match self.input.take() {
            Some(bytes) => Box::new(io::Cursor::new(bytes)),
            None => {
                let (ours, theirs) = tokio::io::duplex(64);
                self.held_stdin = Some(ours);
                Box::new(theirs)
            }
        };
        (reader, Box::new(self.output.clone()))
    }

    fn interrupted(&mut self) -> BoxFuture<'static, ()> {
        match self.interrupt.take() {
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            None => Box::pin(futures::future::pending()),
        }
    }
}
