// src/transport/mod.rs

//! Remote-shell transport abstraction.
//!
//! The runner and orchestrator talk to these traits instead of `russh`
//! directly, so tests can swap in a scripted transport:
//!
//! - [`Connector`] dials and authenticates, yielding a [`Connection`].
//! - [`Connection`] hands out one [`RemoteSession`] per command.
//! - [`RemoteSession`] exposes the command's stdout/stderr as byte streams
//!   and runs the command to completion.
//!
//! [`ssh`] holds the production implementation.

pub mod ssh;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::AsyncRead;

use crate::config::ScriptDescriptor;
use crate::errors::Result;

pub use ssh::{HostAddr, HostKeyPolicy, RusshConnection, RusshConnector, RusshSession};

/// Boxed `Send` future, as returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One of a session's output streams. Reaches EOF once the command is done.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Everything needed to open a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// `host:port`.
    pub host: String,
    pub user: String,
    pub private_key_path: PathBuf,
    pub host_key_policy: HostKeyPolicy,
}

impl From<&ScriptDescriptor> for ConnectTarget {
    fn from(d: &ScriptDescriptor) -> Self {
        Self {
            host: d.host.clone(),
            user: d.user_id.clone(),
            private_key_path: d.private_key_path.clone(),
            host_key_policy: HostKeyPolicy::from_verify_flag(d.verify_host_identity),
        }
    }
}

/// How a remote command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Exited(u32),
    Signaled(String),
    /// The channel closed without reporting an exit status.
    Unknown,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        matches!(self, CommandStatus::Exited(0))
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Exited(code) => write!(f, "exit status {code}"),
            CommandStatus::Signaled(sig) => write!(f, "killed by signal {sig}"),
            CommandStatus::Unknown => write!(f, "exited without an exit status"),
        }
    }
}

/// Dials and authenticates a connection.
pub trait Connector: Send + Sync {
    type Connection: Connection;

    fn connect<'a>(&'a self, target: &'a ConnectTarget)
    -> BoxFuture<'a, Result<Self::Connection>>;
}

/// An open, authenticated connection shared by all commands of a run.
pub trait Connection: Send + Sync {
    type Session: RemoteSession;

    /// Open a fresh session for a single command.
    fn open_session(&self) -> BoxFuture<'_, Result<Self::Session>>;

    /// Tear the connection down.
    fn close(self) -> BoxFuture<'static, Result<()>>;
}

/// A single-command execution context.
///
/// Callers take the output streams *before* [`RemoteSession::run`] and must
/// drain them concurrently with it; `run` may block while a stream's buffer
/// is full.
pub trait RemoteSession: Send {
    /// Take the stdout stream. Returns `None` after the first call.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take the stderr stream. Returns `None` after the first call.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Run `command` to completion. Both output streams reach EOF by the time
    /// this returns, or at the latest when the session is closed.
    fn run<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<CommandStatus>>;

    /// Release the session.
    fn close(self) -> BoxFuture<'static, Result<()>>;
}
