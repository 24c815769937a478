// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for `sshscript`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sshscript",
    version,
    about = "Run a JSON-described list of commands on a remote host over SSH.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the script file (JSON).
    ///
    /// Default: `configTest01.json` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "configTest01.json")]
    pub scriptfile: PathBuf,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_script_path;

    #[test]
    fn scriptfile_defaults_to_example_name() {
        let args = CliArgs::try_parse_from(["sshscript"]).unwrap();
        assert_eq!(args.scriptfile, default_script_path());
    }

    #[test]
    fn scriptfile_flag_is_honoured() {
        let args = CliArgs::try_parse_from(["sshscript", "--scriptfile", "deploy.json"]).unwrap();
        assert_eq!(args.scriptfile, PathBuf::from("deploy.json"));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(CliArgs::try_parse_from(["sshscript", "--parallel"]).is_err());
    }
}
