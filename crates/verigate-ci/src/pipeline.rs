//! Fail-fast gate sequencing.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::VerifyConfig;
use crate::error::{ConfigError, FailureKind, RunError};
use crate::gate::{CommandGate, Gate, GateResult, LintPolicy, PassRecord, TwoPassLintGate};
use crate::runner::CommandRunner;
use crate::stage::{CommandRole, GateName, PassConfig};

/// Final status of one gate within a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    /// Passed, but an advisory pass reported findings.
    Warning,
    Failed,
    /// Not started because an earlier gate failed.
    Skipped,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASS"),
            Self::Warning => write!(f, "WARN"),
            Self::Failed => write!(f, "FAIL"),
            Self::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Per-gate entry of a [`PipelineReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRecord {
    pub gate: GateName,
    pub status: GateStatus,

    /// `None` for skipped gates.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passes: Vec<PassRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GateRecord {
    fn from_result(gate: GateName, result: &GateResult, duration_ms: u64) -> Self {
        match result {
            Ok(report) => Self {
                gate,
                status: if report.warning_count() > 0 {
                    GateStatus::Warning
                } else {
                    GateStatus::Passed
                },
                exit_code: Some(0),
                duration_ms,
                passes: report.passes.clone(),
                failure_kind: None,
                error: None,
            },
            Err(failure) => Self {
                gate,
                status: GateStatus::Failed,
                exit_code: Some(failure.exit_code()),
                duration_ms,
                passes: Vec::new(),
                failure_kind: Some(failure.kind()),
                error: Some(failure.to_string()),
            },
        }
    }

    fn skipped(gate: GateName) -> Self {
        Self {
            gate,
            status: GateStatus::Skipped,
            exit_code: None,
            duration_ms: 0,
            passes: Vec::new(),
            failure_kind: None,
            error: None,
        }
    }

    pub fn ran(&self) -> bool {
        self.status != GateStatus::Skipped
    }
}

/// Result of a complete `verify` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,

    /// Digest of the ordered gate command lines.
    pub pipeline_digest: String,

    pub lint_policy: LintPolicy,

    pub gates: Vec<GateRecord>,

    /// Status of the first failing gate, or 0.
    pub exit_code: i32,

    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Number of gates that passed (including with warnings).
    pub fn passed_count(&self) -> usize {
        self.gates
            .iter()
            .filter(|g| matches!(g.status, GateStatus::Passed | GateStatus::Warning))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.gates
            .iter()
            .filter(|g| g.status == GateStatus::Failed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.gates
            .iter()
            .filter(|g| g.status == GateStatus::Skipped)
            .count()
    }

    pub fn failing_gate(&self) -> Option<GateName> {
        self.gates
            .iter()
            .find(|g| g.status == GateStatus::Failed)
            .map(|g| g.gate)
    }

    /// Gates that were actually started, in order.
    pub fn executed(&self) -> Vec<GateName> {
        self.gates.iter().filter(|g| g.ran()).map(|g| g.gate).collect()
    }

    /// One line per gate, for terminal summaries.
    pub fn summary_lines(&self) -> Vec<String> {
        self.gates
            .iter()
            .map(|g| match g.exit_code {
                Some(code) => format!(
                    "{} {} ({}ms, exit code: {})",
                    g.status, g.gate, g.duration_ms, code
                ),
                None => format!("{} {}", g.status, g.gate),
            })
            .collect()
    }
}

/// Immutable ordered list of gates: `type_check`, `lint`, `test`.
pub struct GatePipeline {
    gates: Vec<Box<dyn Gate>>,
    lint_policy: LintPolicy,
}

impl fmt::Debug for GatePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePipeline")
            .field("gates", &self.gate_names())
            .field("lint_policy", &self.lint_policy)
            .finish()
    }
}

impl GatePipeline {
    /// Build the fixed gate list from configuration.
    pub fn from_config(config: &VerifyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let type_check: Box<dyn Gate> = Box::new(CommandGate::new(
            GateName::TypeCheck,
            PassConfig::blocking(CommandRole::TypeCheck, config.command(CommandRole::TypeCheck)),
        ));

        let lint: Box<dyn Gate> = match config.lint_policy {
            LintPolicy::TwoPass => Box::new(TwoPassLintGate::new(
                PassConfig::blocking(
                    CommandRole::LintBlocking,
                    config.command(CommandRole::LintBlocking),
                ),
                PassConfig::advisory(
                    CommandRole::LintAdvisory,
                    config.command(CommandRole::LintAdvisory),
                ),
            )),
            LintPolicy::SinglePass => Box::new(CommandGate::new(
                GateName::Lint,
                PassConfig::blocking(
                    CommandRole::LintSingle,
                    config.command(CommandRole::LintSingle),
                ),
            )),
        };

        let test: Box<dyn Gate> = Box::new(CommandGate::new(
            GateName::Test,
            PassConfig::blocking(CommandRole::Test, config.command(CommandRole::Test)),
        ));

        Ok(Self {
            gates: vec![type_check, lint, test],
            lint_policy: config.lint_policy,
        })
    }

    pub fn gate_names(&self) -> Vec<GateName> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn lint_policy(&self) -> LintPolicy {
        self.lint_policy
    }

    /// Look up a gate by its typed name.
    pub fn gate(&self, name: GateName) -> Option<&dyn Gate> {
        self.gates
            .iter()
            .find(|g| g.name() == name)
            .map(|g| &**g)
    }

    /// SHA-256 over every pass's command line, in execution order.
    pub fn digest(&self) -> String {
        let lines: Vec<String> = self
            .gates
            .iter()
            .flat_map(|g| {
                g.passes()
                    .iter()
                    .map(move |p| format!("{}:{}:{}", g.name(), p.name(), p.command.command_line()))
            })
            .collect();
        compute_digest(&lines)
    }

    /// Run exactly one gate, named by string.
    ///
    /// Unknown names fail with [`ConfigError::UnknownGate`] before any tool runs.
    pub async fn run_gate(&self, runner: &dyn CommandRunner, name: &str) -> GateResult {
        let name: GateName = name.parse()?;
        self.run_named(runner, name).await
    }

    /// Run exactly one gate.
    pub async fn run_named(&self, runner: &dyn CommandRunner, name: GateName) -> GateResult {
        let gate = self
            .gate(name)
            .ok_or_else(|| ConfigError::UnknownGate(name.to_string()))?;

        info!(gate = %name, "Running gate");
        let result = gate.run(runner).await;
        log_gate_result(name, &result);
        result
    }

    /// Run every gate in order, stopping at the first failure.
    ///
    /// Gates after a failure are recorded as skipped and never started.
    pub async fn run_pipeline(&self, runner: &dyn CommandRunner) -> PipelineReport {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let pipeline_digest = self.digest();

        info!(
            run_id = %run_id,
            digest = %pipeline_digest,
            lint_policy = %self.lint_policy,
            "Starting verification pipeline"
        );

        let mut records = Vec::with_capacity(self.gates.len());
        let mut exit_code = 0;

        for gate in &self.gates {
            let name = gate.name();
            if exit_code != 0 {
                info!(gate = %name, "Skipping gate after earlier failure");
                records.push(GateRecord::skipped(name));
                continue;
            }

            info!(gate = %name, "Running gate");
            let gate_start = Instant::now();
            let result = gate.run(runner).await;
            let duration_ms = gate_start.elapsed().as_millis() as u64;
            log_gate_result(name, &result);

            if let Err(failure) = &result {
                exit_code = failure.exit_code();
            }
            records.push(GateRecord::from_result(name, &result, duration_ms));
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if exit_code == 0 {
            info!(run_id = %run_id, duration_ms, "Verification pipeline passed");
        } else {
            error!(run_id = %run_id, exit_code, "Verification pipeline failed");
        }

        PipelineReport {
            run_id,
            started_at,
            pipeline_digest,
            lint_policy: self.lint_policy,
            gates: records,
            exit_code,
            duration_ms,
        }
    }
}

/// Launch the package's own entry point and return its exit status.
///
/// Not a gate: it never participates in `verify`.
pub async fn run_entry_point(
    runner: &dyn CommandRunner,
    config: &VerifyConfig,
) -> Result<i32, RunError> {
    let command = config.command(CommandRole::EntryPoint);
    info!(command = %command.command_line(), "Launching entry point");
    let output = runner.run(&command).await?;
    Ok(output.exit_code)
}

fn log_gate_result(name: GateName, result: &GateResult) {
    match result {
        Ok(report) => info!(
            gate = %name,
            warnings = report.warning_count(),
            duration_ms = report.duration_ms(),
            "Gate passed"
        ),
        Err(failure) if failure.kind() == FailureKind::ToolMissing => error!(
            gate = %name,
            exit_code = failure.exit_code(),
            "Gate could not run: {}",
            failure
        ),
        Err(failure) => error!(
            gate = %name,
            exit_code = failure.exit_code(),
            "Gate failed: {}",
            failure
        ),
    }
}

/// Compute deterministic digest of ordered command lines.
fn compute_digest(lines: &[String]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
