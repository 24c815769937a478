use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use sshscript::exec::copy::StreamKind;
use sshscript::exec::{OutputSink, SinkWriter};
use tokio::io::AsyncWrite;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{EnvFilter, fmt};

use crate::fake_transport::{EventLog, TransportEvent};

/// An `OutputSink` that keeps everything written to it in memory.
///
/// When built with [`CaptureSink::recording_into`], every write is also
/// appended to a transport event log, so tests can check where output landed
/// relative to session boundaries.
#[derive(Clone, Default)]
pub struct CaptureSink {
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
    events: Option<EventLog>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording_into(events: EventLog) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn stdout_bytes(&self) -> Vec<u8> {
        self.stdout.lock().unwrap().clone()
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout_bytes()).into_owned()
    }

    pub fn stderr_bytes(&self) -> Vec<u8> {
        self.stderr.lock().unwrap().clone()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr_bytes()).into_owned()
    }

    fn writer(&self, kind: StreamKind) -> SinkWriter {
        let buf = match kind {
            StreamKind::Stdout => Arc::clone(&self.stdout),
            StreamKind::Stderr => Arc::clone(&self.stderr),
        };
        Box::new(CaptureWriter {
            kind,
            buf,
            events: self.events.clone(),
        })
    }
}

impl OutputSink for CaptureSink {
    fn stdout(&self) -> SinkWriter {
        self.writer(StreamKind::Stdout)
    }

    fn stderr(&self) -> SinkWriter {
        self.writer(StreamKind::Stderr)
    }
}

struct CaptureWriter {
    kind: StreamKind,
    buf: Arc<Mutex<Vec<u8>>>,
    events: Option<EventLog>,
}

impl AsyncWrite for CaptureWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.lock().unwrap().extend_from_slice(data);
        if let Some(events) = &self.events {
            events
                .lock()
                .unwrap()
                .push(TransportEvent::LocalOutput(self.kind, data.to_vec()));
        }
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Collects formatted log lines from the current thread.
///
/// Install it with [`LogCapture::install`]; events are recorded until the
/// returned guard is dropped. Use with a current-thread runtime so every
/// task logs on the thread that holds the guard.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
