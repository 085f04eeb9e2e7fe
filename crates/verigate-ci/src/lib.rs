//! verigate CI - fail-fast verification gates
//!
//! Provides a gate sequencer that:
//! - Runs type-check, lint and test tools in a fixed order
//! - Stops at the first failing gate and propagates its exit status
//! - Supports a two-pass (blocking + advisory) or single-pass lint policy

pub mod config;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod telemetry;

// Re-export key types
pub use config::{CommandOverrides, VerifyConfig, DEFAULT_CONFIG_FILE};
pub use error::{ConfigError, FailureKind, GateFailure, RunError};
pub use gate::{CommandGate, Gate, GateReport, GateResult, LintPolicy, PassRecord, TwoPassLintGate};
pub use pipeline::{run_entry_point, GatePipeline, GateRecord, GateStatus, PipelineReport};
pub use runner::{CommandRunner, OutputMode, ProcessRunner, RunOutput};
pub use stage::{CommandRole, CommandSpec, GateName, PassConfig, Strictness};
pub use telemetry::init_tracing;
