// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`runner`] owns the sequential command loop.
//! - [`copy`] spawns the tasks that drain a session's stdout/stderr.
//! - [`sink`] provides the `OutputSink` trait and the console implementation
//!   used in production; tests substitute a capturing sink.

pub mod copy;
pub mod runner;
pub mod sink;

pub use runner::{CommandFailure, RunReport, run_commands};
pub use sink::{ConsoleSink, OutputSink, SinkWriter};
