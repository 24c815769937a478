// src/exec/runner.rs

//! The command loop: one session per command, strictly in order.

use tracing::{debug, error, info};

use crate::config::ScriptDescriptor;
use crate::errors::{Result, SshScriptError};
use crate::exec::copy::{CopyTask, StreamKind, spawn_copy};
use crate::exec::sink::OutputSink;
use crate::transport::{Connection, RemoteSession};

/// A command that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Position in the script, starting at 0.
    pub index: usize,
    pub command: String,
    pub reason: String,
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<CommandFailure>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every command of `script` on `conn`, in order.
///
/// A failing command is logged and recorded; the loop moves on. Failing to
/// open a session aborts the loop and returns [`SshScriptError::Session`].
pub async fn run_commands<C: Connection>(
    conn: &C,
    script: &ScriptDescriptor,
    sink: &dyn OutputSink,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    for (index, command) in script.commands.iter().enumerate() {
        info!("============== OUTPUT BEGIN - [{}] ==================", script.name);
        info!("============== COMMAND - [{}] ==================", command);

        let session = conn.open_session().await.map_err(|e| {
            error!(command = %command, error = %e, "failed to open session; aborting run");
            e
        })?;

        report.attempted += 1;
        match run_in_session(session, command, sink).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                error!(command = %command, error = %e, "command failed");
                report.failures.push(CommandFailure {
                    index,
                    command: command.clone(),
                    reason: e.to_string(),
                });
            }
        }

        info!("============== OUTPUT END   - [{}] ==================", script.name);
    }

    info!(
        script = %script.name,
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        "script finished"
    );

    Ok(report)
}

/// Run one command, then release the session and wait for its output.
///
/// The session is closed before the copy tasks are joined, so their streams
/// are guaranteed to reach EOF.
async fn run_in_session<S: RemoteSession>(
    mut session: S,
    command: &str,
    sink: &dyn OutputSink,
) -> Result<()> {
    let copies: Vec<CopyTask> = [
        session
            .take_stdout()
            .map(|r| spawn_copy(StreamKind::Stdout, r, sink.stdout())),
        session
            .take_stderr()
            .map(|r| spawn_copy(StreamKind::Stderr, r, sink.stderr())),
    ]
    .into_iter()
    .flatten()
    .collect();

    let outcome = session.run(command).await;

    if let Err(e) = session.close().await {
        debug!(command, error = %e, "closing session failed");
    }

    for copy in copies {
        copy.join().await;
    }

    let status = outcome?;
    if status.success() {
        info!(command, %status, "command completed");
        Ok(())
    } else {
        Err(SshScriptError::Command {
            command: command.to_string(),
            reason: status.to_string(),
        })
    }
}
