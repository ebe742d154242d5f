//! Interactive container execution support.
//!
//! Runs a command inside a container and, when the controlling console is a
//! terminal, bridges it to the session in raw mode until either copy direction
//! ends or the operator interrupts.

use crate::container::runtime::{AttachedStreams, ExecFlags, ExecSession, RuntimeClient};
use crate::container::terminal::{Console, RawModeGuard};
use crate::container::{ContainerError, Result};
use futures::stream::{BoxStream, StreamExt};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Exit code reported when the runtime has none for the session.
pub const UNKNOWN_EXIT_CODE: i64 = -1;

/// Bridges a console to an exec session inside a container.
pub struct TerminalBridge<'a, R: RuntimeClient + ?Sized, C: Console> {
    client: &'a R,
    console: &'a mut C,
    privileged: bool,
}

impl<'a, R: RuntimeClient + ?Sized, C: Console> TerminalBridge<'a, R, C> {
    /// Create a bridge that runs privileged sessions.
    pub fn new(client: &'a R, console: &'a mut C) -> Self {
        Self {
            client,
            console,
            privileged: true,
        }
    }

    /// Run sessions with or without elevated privileges.
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Run `command` inside `container_id` and wait for the bridge to finish.
    ///
    /// The returned session carries the inspected exit code.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be created or attached, if raw mode
    /// cannot be entered, if a stream copy fails, or if inspection fails.
    pub async fn run(&mut self, container_id: &str, command: Vec<String>) -> Result<ExecSession> {
        let interactive = self.console.is_interactive();
        let streams = AttachedStreams::for_mode(interactive);

        let flags = ExecFlags {
            privileged: self.privileged,
            tty: interactive,
            attach_stdin: streams.stdin,
            attach_stdout: streams.stdout,
            attach_stderr: streams.stderr,
            ..Default::default()
        };

        debug!(
            "Creating exec session in {} (tty: {}): {:?}",
            container_id, interactive, command
        );
        let id = self
            .client
            .create_exec(container_id, &command, &flags)
            .await?;

        let mut session = ExecSession {
            id,
            command,
            tty_requested: interactive,
            streams,
            exit_code: None,
        };

        let attachment = self.client.attach_exec(&session.id, interactive).await?;

        if interactive {
            self.bridge(attachment.output, attachment.input).await?;
        } else {
            let (_, mut writer) = self.console.streams();
            copy_output(attachment.output, &mut writer).await?;
        }

        let exit_code = self
            .client
            .inspect_exec(&session.id)
            .await?
            .unwrap_or(UNKNOWN_EXIT_CODE);
        info!("Exec session {} exited with code {}", session.id, exit_code);
        session.exit_code = Some(exit_code);

        Ok(session)
    }

    /// Race both copy directions and the interrupt with the console in raw mode.
    ///
    /// Only the first outcome is observed. The remaining tasks are aborted but
    /// not joined: a pending read on the process stdin may outlive the call.
    async fn bridge(
        &mut self,
        output: BoxStream<'static, io::Result<Vec<u8>>>,
        mut input: std::pin::Pin<Box<dyn AsyncWrite + Send>>,
    ) -> Result<()> {
        let (mut reader, mut writer) = self.console.streams();
        let interrupted = self.console.interrupted();

        let guard = RawModeGuard::enter(&mut *self.console)?;

        let (done_tx, mut done_rx) = mpsc::channel::<Option<io::Error>>(3);

        let tx = done_tx.clone();
        let session_to_console = tokio::spawn(async move {
            let result = copy_output(output, &mut writer).await;
            debug!("Session output closed: {:?}", result);
            let _ = tx.send(result.err()).await;
        });

        let tx = done_tx.clone();
        let console_to_session = tokio::spawn(async move {
            let result = copy_input(&mut reader, &mut input).await;
            debug!("Console input closed: {:?}", result);
            let _ = tx.send(result.err()).await;
        });

        let tx = done_tx;
        let interrupt = tokio::spawn(async move {
            interrupted.await;
            let _ = tx.send(None).await;
        });

        let first = done_rx.recv().await.flatten();

        for task in [&session_to_console, &console_to_session, &interrupt] {
            task.abort();
        }

        guard.restore();

        match first {
            Some(e) => Err(ContainerError::Io(e)),
            None => Ok(()),
        }
    }
}

/// Run `args` inside `container_id`, bridging `console` when it is a terminal,
/// and return the remote exit code.
///
/// # Errors
///
/// See [`TerminalBridge::run`].
pub async fn run_interactive<R, C>(
    client: &R,
    container_id: &str,
    args: Vec<String>,
    console: &mut C,
) -> Result<i64>
where
    R: RuntimeClient + ?Sized,
    C: Console,
{
    let session = TerminalBridge::new(client, console)
        .run(container_id, args)
        .await?;
    Ok(session.exit_code.unwrap_or(UNKNOWN_EXIT_CODE))
}

/// Process exit status for a session's exit code.
///
/// Missing codes and codes that do not fit an `i32` become [`UNKNOWN_EXIT_CODE`].
pub fn exit_status(exit_code: Option<i64>) -> i32 {
    exit_code
        .and_then(|code| i32::try_from(code).ok())
        .unwrap_or(UNKNOWN_EXIT_CODE as i32)
}

/// Copy every chunk of session output into `writer` until the stream ends.
pub(crate) async fn copy_output<W>(
    mut output: BoxStream<'static, io::Result<Vec<u8>>>,
    writer: &mut W,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut copied = 0u64;
    while let Some(chunk) = output.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        writer.flush().await?;
        copied += chunk.len() as u64;
    }
    Ok(copied)
}

async fn copy_input<R, W>(reader: &mut R, input: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let copied = tokio::io::copy(reader, input).await?;
    input.flush().await?;
    Ok(copied)
}
