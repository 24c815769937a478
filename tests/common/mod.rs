#![allow(dead_code)]

use std::error::Error;
use std::path::PathBuf;

pub use sshscript_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Path to a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
