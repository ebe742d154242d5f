//! Line-oriented progress rendering.
//!
//! On a terminal of known width every update overwrites the previous one. On
//! anything else the reporter prints a label followed by one marker per update,
//! which keeps logs linear and scriptable.

use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Label printed before markers when the output is not a terminal.
pub const DEFAULT_LABEL: &str = "Downloading ...";

/// How progress updates are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Redraw a single line padded to `width` columns.
    Overwrite { width: u16 },
    /// Print one `.` per update.
    Markers,
}

impl ProgressMode {
    /// Overwrite only when the sink is a terminal whose width is known.
    pub fn for_terminal(is_terminal: bool, width: Option<u16>) -> Self {
        match (is_terminal, width) {
            (true, Some(width)) => ProgressMode::Overwrite { width },
            _ => ProgressMode::Markers,
        }
    }
}

/// Renders progress lines into a writer.
pub struct ProgressReporter<W: Write> {
    out: W,
    mode: ProgressMode,
    label: String,
    lines: usize,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, mode: ProgressMode) -> Self {
        Self {
            out,
            mode,
            label: DEFAULT_LABEL.to_string(),
            lines: 0,
        }
    }

    /// Replace the label printed in marker mode.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Render one update.
    pub fn line(&mut self, line: &str) -> io::Result<()> {
        match self.mode {
            ProgressMode::Overwrite { width } => {
                let padding = usize::from(width).saturating_sub(line.chars().count());
                write!(self.out, "\r{}{}", line, " ".repeat(padding))?;
            }
            ProgressMode::Markers => {
                if self.lines == 0 {
                    write!(self.out, "{}", self.label)?;
                }
                write!(self.out, ".")?;
            }
        }
        self.lines += 1;
        self.out.flush()
    }

    /// Terminate the progress output and hand back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        match self.mode {
            ProgressMode::Overwrite { .. } if self.lines == 0 => {}
            ProgressMode::Overwrite { .. } => writeln!(self.out)?,
            ProgressMode::Markers => {
                if self.lines == 0 {
                    write!(self.out, "{}", self.label)?;
                }
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }

    /// Render every line of `reader` until it closes.
    ///
    /// Lines need not be UTF-8; invalid bytes are drawn as U+FFFD.
    pub async fn consume<R>(mut self, reader: R) -> io::Result<W>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = strip_line_ending(&buf);
            self.line(&String::from_utf8_lossy(line))?;
        }
        self.finish()
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
