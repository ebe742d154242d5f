//! Controlling-terminal handling for interactive container sessions.
//!
//! The bridge never touches the process stdio directly. It goes through a
//! [`Console`], which exposes the terminal capabilities it needs: interactivity
//! detection, raw mode, width, byte streams and the operator interrupt.
//! [`HostConsole`] is the implementation backed by the process stdin/stdout.

use crate::container::Result;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Terminal capabilities consumed by the terminal bridge.
pub trait Console: Send {
    /// Terminal attributes captured before entering raw mode.
    type State: Send;

    /// Whether the controlling file is an interactive terminal device.
    fn is_interactive(&self) -> bool;

    /// Capture the current attributes and switch to raw mode.
    fn enter_raw_mode(&mut self) -> Result<Self::State>;

    /// Restore attributes captured by [`Console::enter_raw_mode`].
    fn restore_mode(&mut self, state: Self::State);

    /// Width in columns, if known.
    fn width(&self) -> Option<u16>;

    /// Reader for operator input and writer for session output.
    fn streams(
        &mut self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        Box<dyn AsyncWrite + Send + Unpin>,
    );

    /// Resolves when the operator requests cancellation.
    fn interrupted(&mut self) -> BoxFuture<'static, ()>;
}

/// Holds a console in raw mode and restores it exactly once when dropped.
///
/// Dropping covers every exit path, including early returns and unwinding.
pub struct RawModeGuard<'a, C: Console> {
    console: &'a mut C,
    state: Option<C::State>,
}

impl<'a, C: Console> RawModeGuard<'a, C> {
    /// Enter raw mode on `console`.
    ///
    /// # Errors
    ///
    /// Returns error if the terminal attributes cannot be read or changed.
    pub fn enter(console: &'a mut C) -> Result<Self> {
        let state = console.enter_raw_mode()?;
        debug!("Terminal switched to raw mode");
        Ok(Self {
            console,
            state: Some(state),
        })
    }

    /// Restore the terminal now instead of at end of scope.
    pub fn restore(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(state) = self.state.take() {
            self.console.restore_mode(state);
            debug!("Terminal mode restored");
        }
    }
}

impl<C: Console> Drop for RawModeGuard<'_, C> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Console backed by the process stdin (controlling terminal) and stdout.
#[derive(Debug, Default)]
pub struct HostConsole;

impl HostConsole {
    pub fn new() -> Self {
        Self
    }

    /// Width of the terminal behind `fd`, if it is one.
    #[cfg(unix)]
    pub fn width_of(fd: &impl std::os::fd::AsRawFd) -> Option<u16> {
        let mut winsize = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: TIOCGWINSZ only writes into the provided winsize struct
        let ret = unsafe { libc::ioctl(fd.as_raw_fd(), libc::TIOCGWINSZ, &mut winsize) };
        if ret < 0 || winsize.ws_col == 0 {
            return None;
        }
        Some(winsize.ws_col)
    }
}

#[cfg(unix)]
impl Console for HostConsole {
    type State = nix::sys::termios::Termios;

    fn is_interactive(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }

    fn enter_raw_mode(&mut self) -> Result<Self::State> {
        use crate::container::ContainerError;
        use nix::sys::termios::{self, SetArg};

        let stdin = std::io::stdin();
        let original = termios::tcgetattr(&stdin).map_err(|e| {
            ContainerError::Terminal(format!("failed to get terminal attributes: {}", e))
        })?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)
            .map_err(|e| ContainerError::Terminal(format!("failed to set raw mode: {}", e)))?;

        Ok(original)
    }

    fn restore_mode(&mut self, state: Self::State) {
        use nix::sys::termios::{self, SetArg};

        if let Err(e) = termios::tcsetattr(std::io::stdin(), SetArg::TCSANOW, &state) {
            warn!("Failed to restore terminal settings: {}", e);
        }
    }

    fn width(&self) -> Option<u16> {
        Self::width_of(&std::io::stdout())
    }

    fn streams(
        &mut self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        Box<dyn AsyncWrite + Send + Unpin>,
    ) {
        (Box::new(tokio::io::stdin()), Box::new(tokio::io::stdout()))
    }

    fn interrupted(&mut self) -> BoxFuture<'static, ()> {
        Box::pin(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for interrupt signal: {}", e);
                futures::future::pending::<()>().await;
            }
            debug!("Interrupt received");
        })
    }
}

#[cfg(not(unix))]
impl Console for HostConsole {
    type State = ();

    fn is_interactive(&self) -> bool {
        false
    }

    fn enter_raw_mode(&mut self) -> Result<()> {
        Err(crate::container::ContainerError::Terminal(
            "raw mode is only supported on unix terminals".to_string(),
        ))
    }

    fn restore_mode(&mut self, _state: ()) {}

    fn width(&self) -> Option<u16> {
        None
    }

    fn streams(
        &mut self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        Box<dyn AsyncWrite + Send + Unpin>,
    ) {
        (Box::new(tokio::io::stdin()), Box::new(tokio::io::stdout()))
    }

    fn interrupted(&mut self) -> BoxFuture<'static, ()> {
        Box::pin(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for interrupt signal: {}", e);
                futures::future::pending::<()>().await;
            }
        })
    }
}
