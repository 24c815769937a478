// src/transport/ssh.rs

//! `russh`-backed transport.
//!
//! One `client::Handle` per run; each session is a fresh `"session"` channel.
//! Channel messages are pumped into in-memory pipes so the runner can treat
//! stdout and stderr as independent byte streams.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use russh::client::{self, Msg};
use russh::keys::{HashAlg, PrivateKey, PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tracing::{debug, info, warn};

use crate::errors::{Result, SshScriptError};
use crate::transport::{
    BoxFuture, CommandStatus, ConnectTarget, Connection, Connector, OutputStream, RemoteSession,
};

/// Buffer size of each in-memory output pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// SSH extended-data type code for stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

// ---------------------------------------------------------------------------
// Host key verification policy
// ---------------------------------------------------------------------------

/// How to handle the host key presented by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key (no verification).
    #[default]
    AcceptAny,
    /// Require the key to be listed in `~/.ssh/known_hosts`.
    KnownHosts,
}

impl HostKeyPolicy {
    pub fn from_verify_flag(verify_host_identity: bool) -> Self {
        if verify_host_identity {
            Self::KnownHosts
        } else {
            Self::AcceptAny
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptAny => write!(f, "accept-any"),
            Self::KnownHosts => write!(f, "known-hosts"),
        }
    }
}

// ---------------------------------------------------------------------------
// Host address
// ---------------------------------------------------------------------------

/// A `host:port` pair. IPv6 literals must be bracketed (`[::1]:22`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn parse(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| SshScriptError::Connection(format!("missing port in address `{s}`")))?;

        let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            Some(inner) => inner,
            None if host.contains(':') => {
                return Err(SshScriptError::Connection(format!(
                    "too many colons in address `{s}`"
                )));
            }
            None => host,
        };

        if host.is_empty() {
            return Err(SshScriptError::Connection(format!(
                "missing host in address `{s}`"
            )));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| SshScriptError::Connection(format!("invalid port in address `{s}`: {e}")))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ---------------------------------------------------------------------------
// Private key
// ---------------------------------------------------------------------------

/// Read and decode an unencrypted private key.
pub async fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let raw = tokio::fs::read(path).await.map_err(|source| {
        warn!(key = %path.display(), "Failed to read private key file");
        SshScriptError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    parse_private_key(path, &raw)
}

/// Decode raw key material (OpenSSH or PEM). Passphrase-protected keys are
/// rejected.
pub fn parse_private_key(path: &Path, raw: &[u8]) -> Result<PrivateKey> {
    let key_parse_error = |message: String| {
        warn!(key = %path.display(), "Failed to parse private key data");
        SshScriptError::KeyParse {
            path: path.to_path_buf(),
            message,
        }
    };

    let text = std::str::from_utf8(raw)
        .map_err(|e| key_parse_error(format!("key file is not valid UTF-8: {e}")))?;

    russh::keys::decode_secret_key(text, None).map_err(|e| key_parse_error(e.to_string()))
}

// ---------------------------------------------------------------------------
// russh callback handler
// ---------------------------------------------------------------------------

struct HostKeyVerifier {
    policy: HostKeyPolicy,
    addr: HostAddr,
}

impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256);
        match self.policy {
            HostKeyPolicy::AcceptAny => {
                debug!(host = %self.addr, %fingerprint, "accepting host key without verification");
                Ok(true)
            }
            HostKeyPolicy::KnownHosts => {
                match russh::keys::check_known_hosts(&self.addr.host, self.addr.port, server_public_key)
                {
                    Ok(true) => {
                        debug!(host = %self.addr, %fingerprint, "host key found in known_hosts");
                        Ok(true)
                    }
                    Ok(false) => {
                        warn!(host = %self.addr, %fingerprint, "host key not found in known_hosts");
                        Ok(false)
                    }
                    Err(e) => {
                        warn!(host = %self.addr, %fingerprint, error = %e, "host key verification failed");
                        Ok(false)
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Production connector: TCP + SSH handshake + public-key auth.
#[derive(Debug, Clone, Default)]
pub struct RusshConnector;

impl RusshConnector {
    pub fn new() -> Self {
        Self
    }

    async fn connect_inner(&self, target: &ConnectTarget) -> Result<RusshConnection> {
        // Key problems must surface before any network activity.
        let key = load_private_key(&target.private_key_path).await?;
        let addr = HostAddr::parse(&target.host)?;

        let config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let handler = HostKeyVerifier {
            policy: target.host_key_policy,
            addr: addr.clone(),
        };

        debug!(host = %addr, policy = %target.host_key_policy, "dialing");
        let mut handle = client::connect(config, (addr.host.as_str(), addr.port), handler)
            .await
            .map_err(|e| SshScriptError::Connection(format!("SSH connect to {addr} failed: {e}")))?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(|e| SshScriptError::Connection(format!("SSH negotiation failed: {e}")))?
            .flatten();

        let auth = handle
            .authenticate_publickey(
                target.user.clone(),
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(|e| SshScriptError::Connection(format!("SSH authentication failed: {e}")))?;

        if !auth.success() {
            return Err(SshScriptError::Connection(format!(
                "public key rejected for user `{}` on {addr}",
                target.user
            )));
        }

        info!(host = %addr, user = %target.user, "Connected...");
        Ok(RusshConnection { handle, addr })
    }
}

impl Connector for RusshConnector {
    type Connection = RusshConnection;

    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Self::Connection>> {
        Box::pin(self.connect_inner(target))
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// An authenticated SSH connection.
pub struct RusshConnection {
    handle: client::Handle<HostKeyVerifier>,
    addr: HostAddr,
}

impl Connection for RusshConnection {
    type Session = RusshSession;

    fn open_session(&self) -> BoxFuture<'_, Result<Self::Session>> {
        Box::pin(async move {
            let channel = self.handle.channel_open_session().await.map_err(|e| {
                SshScriptError::Session(format!("failed to open SSH channel on {}: {e}", self.addr))
            })?;
            Ok(RusshSession::new(channel))
        })
    }

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
                .map_err(|e| SshScriptError::Connection(format!("SSH disconnect failed: {e}")))
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One SSH channel, used for exactly one command.
pub struct RusshSession {
    channel: Channel<Msg>,
    stdout_pipe: Option<DuplexStream>,
    stderr_pipe: Option<DuplexStream>,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
}

impl RusshSession {
    fn new(channel: Channel<Msg>) -> Self {
        let (stdout_pipe, stdout) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_pipe, stderr) = tokio::io::duplex(PIPE_CAPACITY);
        Self {
            channel,
            stdout_pipe: Some(stdout_pipe),
            stderr_pipe: Some(stderr_pipe),
            stdout: Some(stdout),
            stderr: Some(stderr),
        }
    }

    async fn run_inner(&mut self, command: &str) -> Result<CommandStatus> {
        // Owned here so both pipes hit EOF however this returns.
        let mut stdout = self.stdout_pipe.take();
        let mut stderr = self.stderr_pipe.take();

        self.channel
            .exec(true, command)
            .await
            .map_err(|e| SshScriptError::Command {
                command: command.to_string(),
                reason: format!("exec request failed: {e}"),
            })?;

        let mut status = CommandStatus::Unknown;

        // ExitStatus may arrive after Eof, so keep reading until Close.
        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => forward(&mut stdout, &data).await,
                ChannelMsg::ExtendedData { data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    forward(&mut stderr, &data).await
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = CommandStatus::Exited(exit_status);
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    status = CommandStatus::Signaled(format!("{signal_name:?}"));
                }
                ChannelMsg::Eof => {
                    stdout = None;
                    stderr = None;
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        Ok(status)
    }
}

/// Write a chunk into a pipe. A pipe whose reader is gone is dropped.
async fn forward(pipe: &mut Option<DuplexStream>, data: &[u8]) {
    if let Some(writer) = pipe {
        if writer.write_all(data).await.is_err() {
            debug!("output reader dropped; discarding remaining output");
            *pipe = None;
        }
    }
}

impl RemoteSession for RusshSession {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take().map(|s| Box::new(s) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take().map(|s| Box::new(s) as OutputStream)
    }

    fn run<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<CommandStatus>> {
        Box::pin(self.run_inner(command))
    }

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.channel
                .close()
                .await
                .map_err(|e| SshScriptError::Session(format!("failed to close SSH channel: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/id_ed25519_test");
    const ENCRYPTED_KEY: &str = include_str!("../../tests/fixtures/id_ed25519_encrypted");

    #[test]
    fn parses_host_and_port() {
        let a = HostAddr::parse("example.com:2222").unwrap();
        assert_eq!(a.host, "example.com");
        assert_eq!(a.port, 2222);
        assert_eq!(a.to_string(), "example.com:2222");
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let a = HostAddr::parse("[::1]:22").unwrap();
        assert_eq!(a.host, "::1");
        assert_eq!(a.port, 22);
        assert_eq!(a.to_string(), "[::1]:22");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["example.com", ":22", "host:", "host:notaport", "host:70000", "::1:22", ""] {
            match HostAddr::parse(bad) {
                Err(SshScriptError::Connection(_)) => {}
                other => panic!("expected Connection error for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn verify_flag_selects_policy() {
        assert_eq!(HostKeyPolicy::from_verify_flag(false), HostKeyPolicy::AcceptAny);
        assert_eq!(HostKeyPolicy::from_verify_flag(true), HostKeyPolicy::KnownHosts);
        assert_eq!(HostKeyPolicy::default(), HostKeyPolicy::AcceptAny);
        assert_eq!(HostKeyPolicy::KnownHosts.to_string(), "known-hosts");
    }

    #[test]
    fn decodes_openssh_ed25519_key() {
        let key = parse_private_key(Path::new("fixture"), TEST_KEY.as_bytes());
        assert!(key.is_ok(), "fixture key should decode: {:?}", key.err());
    }

    #[test]
    fn rejects_garbage_key_material() {
        match parse_private_key(Path::new("junk"), b"definitely not a key") {
            Err(SshScriptError::KeyParse { path, .. }) => assert_eq!(path, Path::new("junk")),
            other => panic!("expected KeyParse, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_utf8_key_material() {
        assert!(matches!(
            parse_private_key(Path::new("bin"), &[0xff, 0xfe, 0x00, 0x01]),
            Err(SshScriptError::KeyParse { .. })
        ));
    }

    #[test]
    fn rejects_passphrase_protected_key() {
        assert!(matches!(
            parse_private_key(Path::new("enc"), ENCRYPTED_KEY.as_bytes()),
            Err(SshScriptError::KeyParse { .. })
        ));
    }

    #[tokio::test]
    async fn missing_key_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        assert!(matches!(
            load_private_key(&path).await,
            Err(SshScriptError::Io { .. })
        ));
    }
}
