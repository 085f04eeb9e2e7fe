//! Error taxonomy for gate execution.
//!
//! Three classes surface to callers:
//! - configuration errors (unknown gate, bad config file, empty command)
//! - tool-missing (the gate could not run)
//! - analysis failures (the gate ran and found problems)

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::GateName;

/// Exit status used for configuration errors.
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Exit status used when a gate's tool is not installed or not executable.
pub const EXIT_TOOL_MISSING: i32 = 127;

/// Exit status used when a configured timeout kills a tool.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Errors in static configuration, detected before any tool runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no such gate: {0} (expected one of type_check, lint, test)")]
    UnknownGate(String),

    #[error("unknown lint policy: {0} (expected two_pass or single_pass)")]
    UnknownLintPolicy(String),

    #[error("command for {role} has an empty program")]
    EmptyCommand { role: String },

    #[error("package path must not be empty")]
    EmptyPackage,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors raised by a [`CommandRunner`](crate::runner::CommandRunner).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("`{program}` could not be executed: {source}")]
    ToolMissing {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` timed out after {timeout_secs}s")]
    TimedOut { program: String, timeout_secs: u64 },

    #[error("empty command")]
    EmptyCommand,

    #[error("io error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    /// Classify a spawn error: missing or non-executable programs are
    /// tool-missing, everything else is a plain io failure.
    pub fn from_spawn(program: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => RunError::ToolMissing {
                program: program.to_string(),
                source,
            },
            _ => RunError::Io {
                program: program.to_string(),
                source,
            },
        }
    }

    /// Exit status this error maps to when surfaced to the shell.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::ToolMissing { .. } => EXIT_TOOL_MISSING,
            RunError::TimedOut { .. } => EXIT_TIMED_OUT,
            RunError::EmptyCommand => EXIT_CONFIG_ERROR,
            RunError::Io { .. } => 1,
        }
    }
}

/// Coarse classification of a gate failure, recorded in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolMissing,
    AnalysisFailure,
    TimedOut,
    ConfigurationError,
    Io,
}

/// A gate that did not pass.
#[derive(Debug, Error)]
pub enum GateFailure {
    /// The tool could not be launched: the gate never ran.
    #[error("{gate}: tool not found for {pass}: {source}")]
    ToolMissing {
        gate: GateName,
        pass: String,
        #[source]
        source: RunError,
    },

    /// The tool ran and reported problems.
    #[error("{gate}: {pass} reported problems (exit code {exit_code})")]
    Analysis {
        gate: GateName,
        pass: String,
        exit_code: i32,
    },

    #[error("{gate}: {pass} failed: {source}")]
    Run {
        gate: GateName,
        pass: String,
        #[source]
        source: RunError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GateFailure {
    /// Wrap a runner error with the gate and pass it occurred in.
    pub fn from_run_error(gate: GateName, pass: &str, source: RunError) -> Self {
        match source {
            RunError::ToolMissing { .. } => GateFailure::ToolMissing {
                gate,
                pass: pass.to_string(),
                source,
            },
            other => GateFailure::Run {
                gate,
                pass: pass.to_string(),
                source: other,
            },
        }
    }

    /// Exit status to propagate. Analysis failures carry the tool's own status.
    pub fn exit_code(&self) -> i32 {
        match self {
            GateFailure::ToolMissing { source, .. } | GateFailure::Run { source, .. } => {
                source.exit_code()
            }
            GateFailure::Analysis { exit_code, .. } => *exit_code,
            GateFailure::Config(_) => EXIT_CONFIG_ERROR,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GateFailure::ToolMissing { .. } => FailureKind::ToolMissing,
            GateFailure::Analysis { .. } => FailureKind::AnalysisFailure,
            GateFailure::Run { source, .. } => match source {
                RunError::TimedOut { .. } => FailureKind::TimedOut,
                RunError::EmptyCommand => FailureKind::ConfigurationError,
                _ => FailureKind::Io,
            },
            GateFailure::Config(_) => FailureKind::ConfigurationError,
        }
    }

    /// The gate this failure belongs to, if it got as far as a gate.
    pub fn gate(&self) -> Option<GateName> {
        match self {
            GateFailure::ToolMissing { gate, .. }
            | GateFailure::Analysis { gate, .. }
            | GateFailure::Run { gate, .. } => Some(*gate),
            GateFailure::Config(_) => None,
        }
    }
}
