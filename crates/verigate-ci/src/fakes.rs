//! Scripted command runner (testing only)
//!
//! Provides `ScriptedRunner`, which satisfies the `CommandRunner` contract
//! without spawning processes and records every command it was asked to run.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RunError;
use crate::runner::{CommandRunner, RunOutput};
use crate::stage::CommandSpec;

/// What a scripted command does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Exit with this status.
    Exit(i32),

    /// Behave as if the program is not installed.
    Missing,

    /// Behave as if the configured timeout fired.
    TimedOut,
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    arg: Option<String>,
    outcome: ScriptedOutcome,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        self.program == spec.program
            && self
                .arg
                .as_ref()
                .map_or(true, |arg| spec.args.iter().any(|a| a == arg))
    }
}

/// In-memory runner. Unscripted commands exit 0.
///
/// Rules are checked in insertion order; the first match wins.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script every invocation of `program`.
    pub fn on(mut self, program: &str, outcome: ScriptedOutcome) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            arg: None,
            outcome,
        });
        self
    }

    /// Script invocations of `program` whose arguments include `arg`.
    pub fn on_arg(mut self, program: &str, arg: &str, outcome: ScriptedOutcome) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            arg: Some(arg.to_string()),
            outcome,
        });
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Programs run so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    pub fn invoked(&self, program: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.program == program)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunError> {
        self.calls.lock().unwrap().push(spec.clone());

        let outcome = self
            .rules
            .iter()
            .find(|rule| rule.matches(spec))
            .map(|rule| rule.outcome)
            .unwrap_or(ScriptedOutcome::Exit(0));

        match outcome {
            ScriptedOutcome::Exit(exit_code) => Ok(RunOutput {
                exit_code,
                stdout: None,
                stderr: None,
                duration_ms: 0,
            }),
            ScriptedOutcome::Missing => Err(RunError::ToolMissing {
                program: spec.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            ScriptedOutcome::TimedOut => Err(RunError::TimedOut {
                program: spec.program.clone(),
                timeout_secs: spec.timeout_secs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_exits_zero() {
        let runner = ScriptedRunner::new();
        let out = runner
            .run(&CommandSpec::new("anything", Vec::<String>::new()))
            .await
            .unwrap();
        assert!(out.success());
        assert!(runner.invoked("anything"));
    }

    #[tokio::test]
    async fn test_arg_rule_takes_precedence_in_order() {
        let runner = ScriptedRunner::new()
            .on_arg("flake8", "--select=E9,F63,F7,F82", ScriptedOutcome::Exit(1))
            .on("flake8", ScriptedOutcome::Exit(0));

        let strict = CommandSpec::new("flake8", ["pkg", "--select=E9,F63,F7,F82"]);
        let loose = CommandSpec::new("flake8", ["pkg", "--exit-zero"]);
        assert_eq!(runner.run(&strict).await.unwrap().exit_code, 1);
        assert_eq!(runner.run(&loose).await.unwrap().exit_code, 0);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let runner = ScriptedRunner::new().on("mypy", ScriptedOutcome::Missing);
        let err = runner
            .run(&CommandSpec::new("mypy", ["pkg"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::ToolMissing { .. }));
    }
}
