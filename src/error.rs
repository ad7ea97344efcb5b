//! Crate-wide error type and process exit codes.
//!
//! Each component owns its own error enum ([`ConfigError`],
//! [`ArgumentError`], [`ValidationError`]); [`Error`] aggregates them so the
//! cleanup path in [`crate::app`] can turn any failure into one logged line,
//! one optional error notification, and one exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::{cli::ArgumentError, commands::flow::Step, config::ConfigError, validate::ValidationError};

/// Generic validation or execution failure.
pub const EXIT_FAILURE: u8 = 1;

/// The run was interrupted by the user (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

/// Anything that ends a run with a non-zero exit code.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// restic ran and exited unsuccessfully.
    #[error("restic {action} {}", describe_exit(.code))]
    ExternalTool { action: String, code: Option<i32> },

    /// restic could not be started at all.
    #[error("failed to launch {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A backup-flow step failed; no later step ran.
    #[error(
        "backup-flow aborted at step {} of {} ({}): {source}",
        .step.number(),
        Step::COUNT,
        .step.label()
    )]
    FlowAborted { step: Step, source: Box<Error> },

    #[error("interrupted by user")]
    Interrupted,

    /// Environment setup problems (log file, runtime) carried with context.
    #[error("{0:#}")]
    Setup(#[from] anyhow::Error),
}

impl Error {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Interrupted => EXIT_INTERRUPTED,
            Self::FlowAborted { source, .. } => source.exit_code(),
            _ => EXIT_FAILURE,
        }
    }

    /// Whether this failure was caused by a user interrupt.
    pub fn is_interrupt(&self) -> bool {
        self.exit_code() == EXIT_INTERRUPTED
    }
}

/// A required external collaborator is missing.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("restic binary '{binary}' not found: {source}")]
    BinaryNotFound {
        binary: String,
        #[source]
        source: which::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".into(),
    }
}
