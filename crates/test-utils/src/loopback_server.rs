//! An in-process SSH server for exercising the real `russh` client.
//!
//! Every `exec` request is answered from a table of [`ScriptedCommand`]s:
//! stdout as channel data, stderr as extended data, then `eof`, the exit
//! status and `close`. The exit status is deliberately sent after `eof`, as
//! OpenSSH does.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::{PrivateKey, PublicKey};
use russh::server::{self, Auth, Handle, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Sig};
use sshscript::transport::CommandStatus;
use tokio::net::TcpListener;

use crate::fake_transport::ScriptedCommand;

/// Largest chunk handed to the server session in one message.
const CHUNK: usize = 16 * 1024;

/// SSH extended-data type code for stderr.
const STDERR_EXT: u32 = 1;

pub struct LoopbackServer {
    host_key: PrivateKey,
    responses: HashMap<String, ScriptedCommand>,
}

impl LoopbackServer {
    pub fn new(host_key: PrivateKey) -> Self {
        Self {
            host_key,
            responses: HashMap::new(),
        }
    }

    pub fn with_command(mut self, command: &str, scripted: ScriptedCommand) -> Self {
        self.responses.insert(command.to_string(), scripted);
        self
    }

    /// Bind `127.0.0.1:0` and serve connections until the runtime shuts down.
    pub async fn start(self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(server::Config {
            keys: vec![self.host_key],
            auth_rejection_time: Duration::ZERO,
            auth_rejection_time_initial: Some(Duration::ZERO),
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let responses = Arc::new(self.responses);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let config = Arc::clone(&config);
                let handler = ScriptedHandler {
                    responses: Arc::clone(&responses),
                    channels: Vec::new(),
                };
                tokio::spawn(async move {
                    match server::run_stream(config, stream, handler).await {
                        Ok(session) => {
                            if let Err(e) = session.await {
                                tracing::debug!(error = %e, "loopback session ended with error");
                            }
                        }
                        Err(e) => tracing::debug!(error = %e, "loopback handshake failed"),
                    }
                });
            }
        });

        Ok(addr)
    }
}

struct ScriptedHandler {
    responses: Arc<HashMap<String, ScriptedCommand>>,
    /// Open channels are held so the session keeps routing to them.
    channels: Vec<Channel<Msg>>,
}

impl server::Handler for ScriptedHandler {
    type Error = russh::Error;

    async fn auth_publickey(&mut self, _user: &str, _key: &PublicKey) -> Result<Auth, Self::Error> {
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.channels.push(channel);
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)?;

        let command = String::from_utf8_lossy(data).into_owned();
        let scripted = self
            .responses
            .get(&command)
            .cloned()
            .unwrap_or_else(ScriptedCommand::ok);

        tokio::spawn(reply(session.handle(), channel, scripted));
        Ok(())
    }
}

async fn reply(handle: Handle, channel: ChannelId, scripted: ScriptedCommand) {
    for chunk in scripted.stdout.chunks(CHUNK) {
        if handle.data(channel, CryptoVec::from_slice(chunk)).await.is_err() {
            return;
        }
    }
    for chunk in scripted.stderr.chunks(CHUNK) {
        if handle
            .extended_data(channel, STDERR_EXT, CryptoVec::from_slice(chunk))
            .await
            .is_err()
        {
            return;
        }
    }

    let _ = handle.eof(channel).await;
    match scripted.status {
        CommandStatus::Exited(code) => {
            let _ = handle.exit_status_request(channel, code).await;
        }
        CommandStatus::Signaled(_) => {
            let _ = handle
                .exit_signal_request(channel, Sig::KILL, false, String::new(), String::new())
                .await;
        }
        CommandStatus::Unknown => {}
    }
    let _ = handle.close(channel).await;
}
