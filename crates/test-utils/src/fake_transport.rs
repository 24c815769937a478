use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sshscript::errors::{Result, SshScriptError};
use sshscript::exec::copy::StreamKind;
use sshscript::transport::{
    BoxFuture, CommandStatus, ConnectTarget, Connection, Connector, OutputStream, RemoteSession,
};
use tokio::io::{AsyncWriteExt, DuplexStream};

/// Pipe size used by fake sessions. Deliberately tiny so that output larger
/// than a few bytes only gets through if it is drained concurrently.
const FAKE_PIPE_CAPACITY: usize = 8;

/// Everything observable that happened on the fake transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected { host: String, user: String },
    SessionOpened(usize),
    CommandStarted(String),
    CommandFinished(String),
    SessionClosed(usize),
    Disconnected,
    /// Bytes that reached a [`crate::capture::CaptureSink`] tied to this log.
    LocalOutput(StreamKind, Vec<u8>),
}

pub type EventLog = Arc<Mutex<Vec<TransportEvent>>>;

/// Canned behaviour for one command string.
#[derive(Debug, Clone)]
pub struct ScriptedCommand {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: CommandStatus,
}

impl ScriptedCommand {
    /// Exit 0, no output.
    pub fn ok() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            status: CommandStatus::Exited(0),
        }
    }

    /// Exit 0, printing `out` on stdout.
    pub fn stdout(out: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: out.into(),
            ..Self::ok()
        }
    }

    /// Exit with `code`, no output.
    pub fn exit(code: u32) -> Self {
        Self {
            status: CommandStatus::Exited(code),
            ..Self::ok()
        }
    }

    pub fn with_stderr(mut self, err: impl Into<Vec<u8>>) -> Self {
        self.stderr = err.into();
        self
    }

    pub fn with_status(mut self, status: CommandStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Default)]
struct State {
    responses: HashMap<String, ScriptedCommand>,
    connect_error: Option<String>,
    /// 1-based index of the session open that fails.
    fail_session_open_at: Option<usize>,
    disconnect_error: Option<String>,
    connect_attempts: usize,
    sessions_opened: usize,
}

/// A scripted, in-memory stand-in for the SSH transport.
///
/// Unscripted commands succeed silently.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
    events: EventLog,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(self, command: &str, scripted: ScriptedCommand) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(command.to_string(), scripted);
        self
    }

    pub fn failing_connect(self, message: &str) -> Self {
        self.state.lock().unwrap().connect_error = Some(message.to_string());
        self
    }

    /// Make the `n`-th session open (1-based) fail.
    pub fn failing_session_open(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_session_open_at = Some(n);
        self
    }

    pub fn failing_disconnect(self, message: &str) -> Self {
        self.state.lock().unwrap().disconnect_error = Some(message.to_string());
        self
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events without the `LocalOutput` noise.
    pub fn transport_events(&self) -> Vec<TransportEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, TransportEvent::LocalOutput(..)))
            .collect()
    }

    pub fn event_log(&self) -> EventLog {
        Arc::clone(&self.events)
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions_opened
    }

    /// Commands in the order they were started.
    pub fn commands_started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::CommandStarted(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: TransportEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Connector for FakeTransport {
    type Connection = FakeConnection;

    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Self::Connection>> {
        Box::pin(async move {
            let error = {
                let mut state = self.state.lock().unwrap();
                state.connect_attempts += 1;
                state.connect_error.clone()
            };
            if let Some(message) = error {
                return Err(SshScriptError::Connection(message));
            }

            self.record(TransportEvent::Connected {
                host: target.host.clone(),
                user: target.user.clone(),
            });
            Ok(FakeConnection {
                transport: self.clone(),
            })
        })
    }
}

pub struct FakeConnection {
    transport: FakeTransport,
}

impl Connection for FakeConnection {
    type Session = FakeSession;

    fn open_session(&self) -> BoxFuture<'_, Result<Self::Session>> {
        Box::pin(async move {
            let (id, fail) = {
                let mut state = self.transport.state.lock().unwrap();
                state.sessions_opened += 1;
                let id = state.sessions_opened;
                (id, state.fail_session_open_at == Some(id))
            };
            if fail {
                return Err(SshScriptError::Session(format!(
                    "fake transport refused session {id}"
                )));
            }

            self.transport.record(TransportEvent::SessionOpened(id));
            Ok(FakeSession::new(id, self.transport.clone()))
        })
    }

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let error = self.transport.state.lock().unwrap().disconnect_error.clone();
            if let Some(message) = error {
                return Err(SshScriptError::Connection(message));
            }
            self.transport.record(TransportEvent::Disconnected);
            Ok(())
        })
    }
}

pub struct FakeSession {
    id: usize,
    transport: FakeTransport,
    stdout_pipe: Option<DuplexStream>,
    stderr_pipe: Option<DuplexStream>,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
}

impl FakeSession {
    fn new(id: usize, transport: FakeTransport) -> Self {
        let (stdout_pipe, stdout) = tokio::io::duplex(FAKE_PIPE_CAPACITY);
        let (stderr_pipe, stderr) = tokio::io::duplex(FAKE_PIPE_CAPACITY);
        Self {
            id,
            transport,
            stdout_pipe: Some(stdout_pipe),
            stderr_pipe: Some(stderr_pipe),
            stdout: Some(stdout),
            stderr: Some(stderr),
        }
    }
}

async fn emit(pipe: Option<DuplexStream>, data: &[u8]) {
    if let Some(mut pipe) = pipe {
        // A dropped reader just discards output, like the real transport.
        let _ = pipe.write_all(data).await;
    }
}

impl RemoteSession for FakeSession {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take().map(|s| Box::new(s) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take().map(|s| Box::new(s) as OutputStream)
    }

    fn run<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<CommandStatus>> {
        Box::pin(async move {
            let stdout = self.stdout_pipe.take();
            let stderr = self.stderr_pipe.take();

            self.transport
                .record(TransportEvent::CommandStarted(command.to_string()));

            let scripted = self
                .transport
                .state
                .lock()
                .unwrap()
                .responses
                .get(command)
                .cloned()
                .unwrap_or_else(ScriptedCommand::ok);

            tokio::join!(
                emit(stdout, &scripted.stdout),
                emit(stderr, &scripted.stderr)
            );

            self.transport
                .record(TransportEvent::CommandFinished(command.to_string()));
            Ok(scripted.status)
        })
    }

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.transport.record(TransportEvent::SessionClosed(self.id));
            Ok(())
        })
    }
}
