// src/exec/copy.rs

//! Copy tasks draining a session stream into a local writer.

use std::fmt;
use std::io;

use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::exec::sink::SinkWriter;
use crate::transport::OutputStream;

/// Which of a session's streams a copy task is draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// A running copy task.
pub struct CopyTask {
    kind: StreamKind,
    handle: JoinHandle<io::Result<u64>>,
}

/// Spawn a task that copies `reader` into `writer` until EOF, then flushes.
pub fn spawn_copy(kind: StreamKind, mut reader: OutputStream, mut writer: SinkWriter) -> CopyTask {
    let handle = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        Ok(copied)
    });
    CopyTask { kind, handle }
}

impl CopyTask {
    /// Wait for the task to drain its stream.
    ///
    /// Returns the number of bytes copied; failures are logged, not
    /// propagated, since losing local output does not fail the command.
    pub async fn join(self) -> u64 {
        match self.handle.await {
            Ok(Ok(bytes)) => {
                debug!(stream = %self.kind, bytes, "output stream drained");
                bytes
            }
            Ok(Err(e)) => {
                warn!(stream = %self.kind, error = %e, "copying remote output failed");
                0
            }
            Err(e) => {
                warn!(stream = %self.kind, error = %e, "output copy task did not complete");
                0
            }
        }
    }
}
