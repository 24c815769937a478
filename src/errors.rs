// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Setup errors (`Io`, `Parse`, `KeyParse`, `Connection`) and `Session` are
//! fatal to a run; `Command` is the only variant the runner recovers from.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshScriptError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Private key parsing error in {}: {message}", .path.display())]
    KeyParse { path: PathBuf, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SshScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_message_names_the_path() {
        let err = SshScriptError::Io {
            path: PathBuf::from("missing.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn only_command_errors_are_recoverable() {
        let errors = vec![
            SshScriptError::Io {
                path: PathBuf::from("s.json"),
                source: std::io::Error::other("boom"),
            },
            SshScriptError::Parse {
                path: PathBuf::from("s.json"),
                source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            },
            SshScriptError::KeyParse {
                path: PathBuf::from("id"),
                message: "bad key".into(),
            },
            SshScriptError::Connection("refused".into()),
            SshScriptError::Session("refused".into()),
            SshScriptError::Command {
                command: "false".into(),
                reason: "exit status 1".into(),
            },
        ];

        // No wildcard arm: every variant must be classified.
        let recoverable: Vec<bool> = errors
            .iter()
            .map(|e| match e {
                SshScriptError::Io { .. }
                | SshScriptError::Parse { .. }
                | SshScriptError::KeyParse { .. }
                | SshScriptError::Connection(_)
                | SshScriptError::Session(_) => false,
                SshScriptError::Command { .. } => true,
            })
            .collect();

        assert_eq!(recoverable, [false, false, false, false, false, true]);
    }
}
