//! Destinations for the server's game log.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use peril_protocol::GameLog;

/// Somewhere to record game-log lines.
///
/// A failed write makes the server requeue the message, so implementations
/// should only fail when retrying later could help.
pub trait GameLogSink: Send + 'static {
    fn write(&mut self, log: &GameLog) -> io::Result<()>;
}

/// Keeps every line in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<GameLog>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, oldest first.
    pub fn lines(&self) -> Vec<GameLog> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl GameLogSink for MemorySink {
    fn write(&mut self, log: &GameLog) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(log.clone());
        Ok(())
    }
}

/// Reports each line through `tracing` under the `game_log` target.
///
/// Holds nothing, so a long-running server does not grow with its log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl GameLogSink for TracingSink {
    fn write(&mut self, log: &GameLog) -> io::Result<()> {
        tracing::info!(target: "game_log", "{}", format_line(log));
        Ok(())
    }
}

/// Appends one line per log to a file.
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl GameLogSink for FileSink {
    fn write(&mut self, log: &GameLog) -> io::Result<()> {
        writeln!(self.writer, "{}", format_line(log))?;
        self.writer.flush()
    }
}

/// `<timestamp_ms> <username>: <message>`
pub fn format_line(log: &GameLog) -> String {
    format!("{} {}: {}", log.timestamp_ms, log.username, log.message)
}
