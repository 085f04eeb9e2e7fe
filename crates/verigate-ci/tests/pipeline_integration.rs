//! Integration tests for the verification pipeline.

use std::path::Path;

use verigate_ci::fakes::{ScriptedOutcome, ScriptedRunner};
use verigate_ci::{
    CommandSpec, FailureKind, GateName, GatePipeline, GateStatus, LintPolicy, ProcessRunner,
    VerifyConfig,
};

const BLOCKING_SELECT: &str = "--select=E9,F63,F7,F82";

fn default_pipeline() -> GatePipeline {
    GatePipeline::from_config(&VerifyConfig::default()).expect("valid config")
}

/// Test: clean tree, every gate passes and verify exits 0
#[tokio::test]
async fn test_clean_tree_passes() {
    let runner = ScriptedRunner::new();
    let pipeline = default_pipeline();

    for name in ["type_check", "lint", "test"] {
        pipeline
            .run_gate(&runner, name)
            .await
            .unwrap_or_else(|e| panic!("{name} should pass: {e}"));
    }

    let report = pipeline.run_pipeline(&runner).await;
    assert!(report.success(), "Pipeline should succeed");
    assert_eq!(report.exit_code, 0);
    assert_eq!(report.passed_count(), 3);
    assert_eq!(report.failed_count(), 0);
    assert!(!report.run_id.is_empty(), "Run ID should be set");
}

/// Test: verify spawns tools strictly type_check -> lint (A, B) -> test
#[tokio::test]
async fn test_verify_runs_gates_in_order() {
    let runner = ScriptedRunner::new();
    let report = default_pipeline().run_pipeline(&runner).await;

    assert_eq!(report.executed(), GateName::ALL.to_vec());
    assert_eq!(
        runner.programs(),
        vec!["mypy", "flake8", "flake8", "pytest"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    let lint_calls: Vec<_> = runner
        .calls()
        .into_iter()
        .filter(|c| c.program == "flake8")
        .collect();
    assert!(lint_calls[0].args.contains(&BLOCKING_SELECT.to_string()));
    assert!(lint_calls[1].args.contains(&"--exit-zero".to_string()));
}

/// Test: missing annotation fails type_check, nothing else runs
#[tokio::test]
async fn test_type_check_failure_short_circuits() {
    let runner = ScriptedRunner::new().on("mypy", ScriptedOutcome::Exit(1));
    let report = default_pipeline().run_pipeline(&runner).await;

    assert!(!report.success());
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.failing_gate(), Some(GateName::TypeCheck));
    assert_eq!(report.skipped_count(), 2);
    assert!(!runner.invoked("flake8"), "lint must not run");
    assert!(!runner.invoked("pytest"), "test must not run");
}

/// Test: syntax error only, type_check passes, lint fails, test never runs
#[tokio::test]
async fn test_syntax_error_fails_lint() {
    let runner = ScriptedRunner::new().on_arg("flake8", BLOCKING_SELECT, ScriptedOutcome::Exit(1));
    let pipeline = default_pipeline();

    pipeline
        .run_gate(&runner, "type_check")
        .await
        .expect("type_check should pass");

    let report = pipeline.run_pipeline(&runner).await;
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.gates[0].status, GateStatus::Passed);
    assert_eq!(report.gates[1].status, GateStatus::Failed);
    assert_eq!(report.gates[1].failure_kind, Some(FailureKind::AnalysisFailure));
    assert_eq!(report.gates[2].status, GateStatus::Skipped);
    assert!(!runner.invoked("pytest"));
}

/// Test: failing tests after clean gates, verify exits with the test status
#[tokio::test]
async fn test_test_failure_status_propagated() {
    let runner = ScriptedRunner::new().on("pytest", ScriptedOutcome::Exit(2));
    let report = default_pipeline().run_pipeline(&runner).await;

    assert_eq!(report.exit_code, 2);
    assert_eq!(report.failing_gate(), Some(GateName::Test));
    assert_eq!(report.passed_count(), 2);
}

/// Test: advisory findings never fail lint or verify
#[tokio::test]
async fn test_advisory_findings_do_not_gate() {
    let runner = ScriptedRunner::new()
        .on_arg("flake8", "--exit-zero", ScriptedOutcome::Exit(1));
    let report = default_pipeline().run_pipeline(&runner).await;

    assert!(report.success());
    assert_eq!(report.gates[1].status, GateStatus::Warning);
    assert!(runner.invoked("pytest"));
}

/// Test: single-pass lint policy uses one comprehensive analyser
#[tokio::test]
async fn test_single_pass_lint_policy() {
    let config = VerifyConfig::default().with_lint_policy(LintPolicy::SinglePass);
    let pipeline = GatePipeline::from_config(&config).unwrap();

    let runner = ScriptedRunner::new().on("pylint", ScriptedOutcome::Exit(4));
    let report = pipeline.run_pipeline(&runner).await;

    assert_eq!(report.exit_code, 4);
    assert_eq!(report.failing_gate(), Some(GateName::Lint));
    assert!(!runner.invoked("flake8"));
    assert!(!runner.invoked("pytest"));
}

/// Test: a missing tool is reported distinctly from an analysis failure
#[tokio::test]
async fn test_missing_tool_reported_distinctly() {
    let runner = ScriptedRunner::new().on("mypy", ScriptedOutcome::Missing);
    let report = default_pipeline().run_pipeline(&runner).await;

    assert_eq!(report.exit_code, 127);
    assert_eq!(report.gates[0].failure_kind, Some(FailureKind::ToolMissing));
    let error = report.gates[0].error.clone().unwrap_or_default();
    assert!(error.contains("tool not found"), "got: {error}");
}

/// Test: a timed-out gate exits 124 and later gates never start
#[tokio::test]
async fn test_timed_out_gate_short_circuits() {
    let runner = ScriptedRunner::new().on("mypy", ScriptedOutcome::TimedOut);
    let report = default_pipeline().run_pipeline(&runner).await;

    assert_eq!(report.exit_code, 124);
    assert_eq!(report.failing_gate(), Some(GateName::TypeCheck));
    assert_eq!(report.gates[0].failure_kind, Some(FailureKind::TimedOut));
    assert_eq!(report.skipped_count(), 2);
    assert!(!runner.invoked("flake8"));
    assert!(!runner.invoked("pytest"));
}

/// Test: gate names are matched exactly, nothing runs on a near miss
#[tokio::test]
async fn test_run_gate_rejects_non_canonical_name() {
    let runner = ScriptedRunner::new();
    let pipeline = default_pipeline();

    for name in [" test ", "type-check"] {
        let failure = pipeline.run_gate(&runner, name).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ConfigurationError);
    }
    assert!(runner.calls().is_empty());
}

/// Test: real processes, with overrides standing in for the analysis tools
#[tokio::test]
async fn test_real_processes_short_circuit() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let step = |name: &str, code: i32| {
        CommandSpec::new(
            "sh",
            [
                "-c".to_string(),
                format!("echo {name} >> {}; exit {code}", log.display()),
            ],
        )
    };

    let mut config = VerifyConfig::default();
    config.commands.type_check = Some(step("type_check", 0));
    config.commands.lint_blocking = Some(step("lint_blocking", 3));
    config.commands.lint_advisory = Some(step("lint_advisory", 0));
    config.commands.test = Some(step("test", 0));

    let pipeline = GatePipeline::from_config(&config).unwrap();
    let report = pipeline.run_pipeline(&ProcessRunner::capturing()).await;

    assert_eq!(report.exit_code, 3);
    let calls = std::fs::read_to_string(&log).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(calls, vec!["type_check", "lint_blocking"]);
}

/// Test: real missing executable maps to 127
#[tokio::test]
async fn test_real_missing_tool() {
    let mut config = VerifyConfig::default();
    config.commands.type_check = Some(CommandSpec::new(
        "verigate-no-such-type-checker",
        ["pkg"],
    ));

    let pipeline = GatePipeline::from_config(&config).unwrap();
    let failure = pipeline
        .run_gate(&ProcessRunner::capturing(), "type_check")
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), FailureKind::ToolMissing);
    assert_eq!(failure.exit_code(), 127);
}

/// Test: config file drives the pipeline shape
#[tokio::test]
async fn test_pipeline_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verigate.toml");
    std::fs::write(
        &path,
        "package = \"svc\"\nlint_policy = \"single_pass\"\n",
    )
    .unwrap();

    let config = VerifyConfig::discover(Some(Path::new(&path))).unwrap();
    let pipeline = GatePipeline::from_config(&config).unwrap();
    assert_eq!(pipeline.lint_policy(), LintPolicy::SinglePass);

    let runner = ScriptedRunner::new();
    pipeline.run_pipeline(&runner).await;
    let pylint = runner
        .calls()
        .into_iter()
        .find(|c| c.program == "pylint")
        .expect("pylint should run");
    assert_eq!(pylint.args, vec!["svc".to_string()]);
}
