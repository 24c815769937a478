// src/exec/sink.rs

//! Local destinations for remote command output.

use tokio::io::AsyncWrite;

/// A writer handed to one copy task.
pub type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where remote stdout/stderr end up.
///
/// Each call returns a fresh writer; one is handed to each copy task per
/// command.
pub trait OutputSink: Send + Sync {
    fn stdout(&self) -> SinkWriter;
    fn stderr(&self) -> SinkWriter;
}

/// Relays output to this process's stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout(&self) -> SinkWriter {
        Box::new(tokio::io::stdout())
    }

    fn stderr(&self) -> SinkWriter {
        Box::new(tokio::io::stderr())
    }
}
