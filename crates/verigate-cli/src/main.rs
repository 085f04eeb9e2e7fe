//! verigate - fail-fast verification pipeline CLI
//!
//! ## Commands
//!
//! - `run`: launch the package entry point
//! - `type-check`, `lint`, `test`: run one gate
//! - `verify`: run type-check, lint and test in order, stopping at the first failure
//! - `gate <name>`: run one gate by name
//!
//! The process exit status is the gate's (or failing gate's) own status.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use verigate_ci::error::EXIT_CONFIG_ERROR;
use verigate_ci::{
    init_tracing, run_entry_point, CommandRunner, FailureKind, GateFailure, GateName,
    GatePipeline, GateResult, LintPolicy, PipelineReport, ProcessRunner, VerifyConfig,
};

#[derive(Parser, Debug)]
#[command(name = "verigate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fail-fast type-check, lint and test gates", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./verigate.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Lint policy override (two_pass or single_pass)
    #[arg(long, global = true, value_parser = parse_lint_policy)]
    lint_policy: Option<LintPolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the package as an executable module
    Run,

    /// Run the static type gate
    #[command(name = "type-check", alias = "type_check")]
    TypeCheck,

    /// Run the lint gate
    Lint,

    /// Run the test suite with coverage
    Test,

    /// Run type-check, lint and test in order, stopping at the first failure
    Verify {
        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run a single gate by name (type_check, lint, test)
    Gate {
        /// Gate name
        name: String,
    },
}

fn parse_lint_policy(s: &str) -> std::result::Result<LintPolicy, String> {
    s.parse::<LintPolicy>().map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let runner = ProcessRunner::new();
    match dispatch(cli, &runner).await {
        Ok(code) => to_exit_code(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            to_exit_code(EXIT_CONFIG_ERROR)
        }
    }
}

/// Execute a command and return the exit status to propagate.
///
/// `Err` is reserved for configuration problems.
async fn dispatch(cli: Cli, runner: &dyn CommandRunner) -> Result<i32> {
    let mut config = VerifyConfig::discover(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(policy) = cli.lint_policy {
        config = config.with_lint_policy(policy);
    }

    match cli.command {
        Commands::Run => Ok(cmd_run(runner, &config).await),
        Commands::TypeCheck => {
            let pipeline = load_pipeline(&config)?;
            Ok(cmd_gate(runner, &pipeline, GateName::TypeCheck).await)
        }
        Commands::Lint => {
            let pipeline = load_pipeline(&config)?;
            Ok(cmd_gate(runner, &pipeline, GateName::Lint).await)
        }
        Commands::Test => {
            let pipeline = load_pipeline(&config)?;
            Ok(cmd_gate(runner, &pipeline, GateName::Test).await)
        }
        Commands::Gate { name } => {
            let pipeline = load_pipeline(&config)?;
            let result = pipeline.run_gate(runner, &name).await;
            Ok(report_gate(&name, result))
        }
        Commands::Verify { report } => {
            let pipeline = load_pipeline(&config)?;
            cmd_verify(runner, &pipeline, report.as_deref()).await
        }
    }
}

fn load_pipeline(config: &VerifyConfig) -> Result<GatePipeline> {
    let pipeline = GatePipeline::from_config(config).context("Invalid gate configuration")?;
    info!(
        package = %config.package,
        lint_policy = %pipeline.lint_policy(),
        "Loaded gate pipeline"
    );
    Ok(pipeline)
}

/// Launch the entry point; its status is returned verbatim.
async fn cmd_run(runner: &dyn CommandRunner, config: &VerifyConfig) -> i32 {
    match run_entry_point(runner, config).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("✗ run could not start: {err}");
            err.exit_code()
        }
    }
}

/// Run one gate and return its status.
async fn cmd_gate(runner: &dyn CommandRunner, pipeline: &GatePipeline, name: GateName) -> i32 {
    let result = pipeline.run_named(runner, name).await;
    report_gate(name.name(), result)
}

fn report_gate(label: &str, result: GateResult) -> i32 {
    match result {
        Ok(report) => {
            if report.warning_count() > 0 {
                eprintln!("✓ {label} passed with advisory findings");
            } else {
                eprintln!("✓ {label} passed");
            }
            0
        }
        Err(failure) => {
            print_failure(label, &failure);
            failure.exit_code()
        }
    }
}

fn print_failure(label: &str, failure: &GateFailure) {
    match failure.kind() {
        FailureKind::ToolMissing => eprintln!("✗ {label} could not run: {failure}"),
        FailureKind::ConfigurationError => eprintln!("error: {failure}"),
        _ => eprintln!("✗ {label} failed: {failure}"),
    }
}

/// Run the full pipeline, print a summary, optionally write a JSON report.
async fn cmd_verify(
    runner: &dyn CommandRunner,
    pipeline: &GatePipeline,
    report_path: Option<&std::path::Path>,
) -> Result<i32> {
    let report = pipeline.run_pipeline(runner).await;

    eprintln!();
    eprintln!("Run ID: {}", report.run_id);
    for line in report.summary_lines() {
        eprintln!("  {line}");
    }
    eprintln!(
        "Summary: {}/{} gates passed",
        report.passed_count(),
        report.gates.len()
    );
    for error in report.gates.iter().filter_map(|g| g.error.as_ref()) {
        eprintln!("  - {error}");
    }

    // A report that cannot be written never changes the exit status.
    if let Some(path) = report_path {
        match write_report(&report, path) {
            Ok(()) => info!(path = %path.display(), "Wrote run report"),
            Err(err) => {
                error!(path = %path.display(), error = %err, "Failed to write run report");
                eprintln!("error: {err:#}");
            }
        }
    }

    if report.success() {
        eprintln!("\n✓ All gates passed!");
    } else {
        eprintln!("\n✗ Verification failed (exit code {})", report.exit_code);
    }
    Ok(report.exit_code)
}

fn write_report(report: &PipelineReport, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(exit_byte(code))
}

/// Statuses outside 0..=255 collapse to a generic failure.
fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
