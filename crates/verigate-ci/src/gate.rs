//! Gate implementations and lint policy selection.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, GateFailure};
use crate::runner::CommandRunner;
use crate::stage::{GateName, PassConfig, Strictness};

/// Outcome of running one gate.
pub type GateResult = Result<GateReport, GateFailure>;

/// Record of a single tool invocation inside a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    pub pass: String,
    pub strictness: Strictness,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl PassRecord {
    /// An advisory pass that exited non-zero: reported, never failing.
    pub fn is_warning(&self) -> bool {
        self.strictness == Strictness::Advisory && self.exit_code != 0
    }
}

/// A gate that passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub gate: GateName,
    pub passes: Vec<PassRecord>,
}

impl GateReport {
    /// Advisory passes that exited non-zero.
    pub fn warning_count(&self) -> usize {
        self.passes.iter().filter(|p| p.is_warning()).count()
    }

    pub fn duration_ms(&self) -> u64 {
        self.passes.iter().map(|p| p.duration_ms).sum()
    }
}

/// A named verification step with a binary pass/fail outcome.
#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> GateName;

    /// Tool invocations in execution order.
    fn passes(&self) -> &[PassConfig];

    async fn run(&self, runner: &dyn CommandRunner) -> GateResult;
}

/// Which lint scheme the `lint` gate uses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LintPolicy {
    /// Blocking pass on severe classes, then an advisory style pass.
    #[default]
    TwoPass,

    /// One comprehensive analyser decides pass/fail on its own.
    SinglePass,
}

impl LintPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            LintPolicy::TwoPass => "two_pass",
            LintPolicy::SinglePass => "single_pass",
        }
    }
}

impl fmt::Display for LintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LintPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "two_pass" | "two-pass" => Ok(LintPolicy::TwoPass),
            "single_pass" | "single-pass" => Ok(LintPolicy::SinglePass),
            other => Err(ConfigError::UnknownLintPolicy(other.to_string())),
        }
    }
}

/// Run one pass and apply its strictness.
///
/// Blocking passes fail on non-zero exit. Advisory passes only fail when the
/// tool could not run at all.
async fn execute_pass(
    gate: GateName,
    pass: &PassConfig,
    runner: &dyn CommandRunner,
) -> Result<PassRecord, GateFailure> {
    info!(
        gate = %gate,
        pass = pass.name(),
        command = %pass.command.command_line(),
        "Running gate pass"
    );

    let output = runner
        .run(&pass.command)
        .await
        .map_err(|e| GateFailure::from_run_error(gate, pass.name(), e))?;

    let record = PassRecord {
        pass: pass.name().to_string(),
        strictness: pass.strictness,
        exit_code: output.exit_code,
        duration_ms: output.duration_ms,
    };

    match pass.strictness {
        Strictness::Blocking if !output.success() => {
            warn!(
                gate = %gate,
                pass = pass.name(),
                exit_code = output.exit_code,
                "Blocking pass failed"
            );
            Err(GateFailure::Analysis {
                gate,
                pass: pass.name().to_string(),
                exit_code: output.exit_code,
            })
        }
        Strictness::Advisory if !output.success() => {
            warn!(
                gate = %gate,
                pass = pass.name(),
                exit_code = output.exit_code,
                "Advisory pass exited non-zero; not failing the gate"
            );
            Ok(record)
        }
        _ => {
            info!(
                gate = %gate,
                pass = pass.name(),
                duration_ms = output.duration_ms,
                "Gate pass finished"
            );
            Ok(record)
        }
    }
}

/// Gate backed by a single blocking command.
///
/// Used for `type_check`, `test` and the single-pass `lint` variant.
#[derive(Debug, Clone)]
pub struct CommandGate {
    name: GateName,
    passes: [PassConfig; 1],
}

impl CommandGate {
    pub fn new(name: GateName, pass: PassConfig) -> Self {
        Self {
            name,
            passes: [PassConfig {
                strictness: Strictness::Blocking,
                ..pass
            }],
        }
    }
}

#[async_trait]
impl Gate for CommandGate {
    fn name(&self) -> GateName {
        self.name
    }

    fn passes(&self) -> &[PassConfig] {
        &self.passes
    }

    async fn run(&self, runner: &dyn CommandRunner) -> GateResult {
        let record = execute_pass(self.name, &self.passes[0], runner).await?;
        Ok(GateReport {
            gate: self.name,
            passes: vec![record],
        })
    }
}

/// Lint gate split into a blocking pass and an advisory pass.
///
/// The advisory pass runs only after the blocking pass succeeds.
#[derive(Debug, Clone)]
pub struct TwoPassLintGate {
    passes: [PassConfig; 2],
}

impl TwoPassLintGate {
    pub fn new(blocking: PassConfig, advisory: PassConfig) -> Self {
        Self {
            passes: [
                PassConfig {
                    strictness: Strictness::Blocking,
                    ..blocking
                },
                PassConfig {
                    strictness: Strictness::Advisory,
                    ..advisory
                },
            ],
        }
    }
}

#[async_trait]
impl Gate for TwoPassLintGate {
    fn name(&self) -> GateName {
        GateName::Lint
    }

    fn passes(&self) -> &[PassConfig] {
        &self.passes
    }

    async fn run(&self, runner: &dyn CommandRunner) -> GateResult {
        let mut records = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            records.push(execute_pass(GateName::Lint, pass, runner).await?);
        }
        Ok(GateReport {
            gate: GateName::Lint,
            passes: records,
        })
    }
}
