// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod transport;

use std::path::Path;

use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::load_from_path;
use crate::errors::Result;
use crate::exec::{ConsoleSink, OutputSink, RunReport, run_commands};
use crate::transport::{ConnectTarget, Connection, Connector, RusshConnector};

/// High-level entry point used by `main.rs`.
///
/// Wires the production transport and console output into [`run_with`].
pub async fn run(args: CliArgs) -> Result<RunReport> {
    run_with(&args.scriptfile, &RusshConnector::new(), &ConsoleSink).await
}

/// Load the script, connect, run every command, disconnect.
///
/// Setup failures (script file, key, connection) return before any command
/// runs. Once connected, the connection is closed whether or not the command
/// loop completed.
pub async fn run_with<C: Connector>(
    script_path: &Path,
    connector: &C,
    sink: &dyn OutputSink,
) -> Result<RunReport> {
    let script = load_from_path(script_path)?;
    let target = ConnectTarget::from(&script);

    let connection = connector.connect(&target).await.map_err(|e| {
        error!(host = %target.host, error = %e, "Connection failed.");
        e
    })?;

    let outcome = run_commands(&connection, &script, sink).await;

    match connection.close().await {
        Ok(()) => info!("Disconnected."),
        Err(e) => warn!(error = %e, "disconnect did not complete cleanly"),
    }

    outcome
}
