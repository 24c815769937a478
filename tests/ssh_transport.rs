// tests/ssh_transport.rs
//
// The real russh client against an in-process SSH server on 127.0.0.1.

mod common;
use crate::common::{TestResult, fixture, init_tracing};

use std::net::SocketAddr;

use russh::keys::{PrivateKey, decode_secret_key};
use sshscript::run_with;
use sshscript::transport::{CommandStatus, RusshConnector};
use sshscript_test_utils::{CaptureSink, LoopbackServer, ScriptBuilder, ScriptedCommand, with_timeout};

fn test_key() -> Result<PrivateKey, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(fixture("id_ed25519_test"))?;
    Ok(decode_secret_key(&text, None)?)
}

fn script_for(addr: SocketAddr, commands: &[&str]) -> ScriptBuilder {
    ScriptBuilder::new("loopback")
        .host(&addr.to_string())
        .user("tester")
        .key(fixture("id_ed25519_test"))
        .commands(commands.iter().copied())
}

/// `len` bytes cycling through the lowercase alphabet from `first`.
fn pattern(len: usize, first: u8) -> Vec<u8> {
    let offset = (first - b'a') as usize;
    (0..len).map(|i| b'a' + ((offset + i) % 26) as u8).collect()
}

#[tokio::test]
async fn runs_each_command_and_continues_past_failure() -> TestResult {
    init_tracing();

    let addr = LoopbackServer::new(test_key()?)
        .with_command("echo a", ScriptedCommand::stdout("a\n"))
        .with_command("false", ScriptedCommand::exit(1).with_stderr("nope\n"))
        .with_command("echo b", ScriptedCommand::stdout("b\n"))
        .start()
        .await?;

    let dir = tempfile::tempdir()?;
    let path = script_for(addr, &["echo a", "false", "echo b"]).write_to(dir.path())?;
    let sink = CaptureSink::new();

    let report = with_timeout(run_with(&path, &RusshConnector::new(), &sink)).await?;

    assert_eq!(sink.stdout_string(), "a\nb\n");
    assert_eq!(sink.stderr_string(), "nope\n");
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[0].command, "false");
    assert!(report.failures[0].reason.contains("exit status 1"));

    Ok(())
}

#[tokio::test]
async fn output_larger_than_the_pipes_arrives_intact() -> TestResult {
    init_tracing();

    // Several times the client's pipe capacity on both streams at once.
    let out = pattern(300_000, b'a');
    let err = pattern(250_000, b'n');

    let addr = LoopbackServer::new(test_key()?)
        .with_command(
            "big",
            ScriptedCommand::stdout(out.clone()).with_stderr(err.clone()),
        )
        .with_command("echo after", ScriptedCommand::stdout("after\n"))
        .start()
        .await?;

    let dir = tempfile::tempdir()?;
    let path = script_for(addr, &["big", "echo after"]).write_to(dir.path())?;
    let sink = CaptureSink::new();

    let report = with_timeout(run_with(&path, &RusshConnector::new(), &sink)).await?;
    assert!(report.all_succeeded());

    let mut expected_out = out;
    expected_out.extend_from_slice(b"after\n");
    assert_eq!(sink.stdout_bytes().len(), expected_out.len());
    assert!(sink.stdout_bytes() == expected_out);
    assert!(sink.stderr_bytes() == err);

    Ok(())
}

#[tokio::test]
async fn missing_or_signalled_exit_counts_as_failure() -> TestResult {
    init_tracing();

    let addr = LoopbackServer::new(test_key()?)
        .with_command(
            "killed",
            ScriptedCommand::stdout("partial\n").with_status(CommandStatus::Signaled("KILL".into())),
        )
        .with_command(
            "silent",
            ScriptedCommand::ok().with_status(CommandStatus::Unknown),
        )
        .start()
        .await?;

    let dir = tempfile::tempdir()?;
    let path = script_for(addr, &["killed", "silent", "true"]).write_to(dir.path())?;
    let sink = CaptureSink::new();

    let report = with_timeout(run_with(&path, &RusshConnector::new(), &sink)).await?;

    assert_eq!(sink.stdout_string(), "partial\n");
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 1);

    let reasons: Vec<&str> = report.failures.iter().map(|f| f.reason.as_str()).collect();
    assert!(reasons[0].contains("killed by signal KILL"), "{reasons:?}");
    assert!(reasons[1].contains("without an exit status"), "{reasons:?}");

    Ok(())
}
