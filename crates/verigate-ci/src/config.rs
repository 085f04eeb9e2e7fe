//! Pipeline configuration.
//!
//! Everything is literal: a package directory, a tests directory, the lint
//! policy, and optional per-command overrides. Loaded once at start-up from
//! `verigate.toml` (or an explicit path) and never mutated afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::gate::LintPolicy;
use crate::stage::{CommandRole, CommandSpec};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "verigate.toml";

const DEFAULT_PACKAGE: &str = "atticus";
const DEFAULT_TESTS_DIR: &str = "tests";

/// Blocking lint classes: syntax errors and undefined names.
const BLOCKING_LINT_SELECT: &str = "--select=E9,F63,F7,F82";

/// Replacement commands; unset roles use the builtin tool bindings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CommandOverrides {
    pub type_check: Option<CommandSpec>,
    pub lint_blocking: Option<CommandSpec>,
    pub lint_advisory: Option<CommandSpec>,
    pub lint_single: Option<CommandSpec>,
    pub test: Option<CommandSpec>,
    pub entry_point: Option<CommandSpec>,
}

impl CommandOverrides {
    fn get(&self, role: CommandRole) -> Option<&CommandSpec> {
        match role {
            CommandRole::TypeCheck => self.type_check.as_ref(),
            CommandRole::LintBlocking => self.lint_blocking.as_ref(),
            CommandRole::LintAdvisory => self.lint_advisory.as_ref(),
            CommandRole::LintSingle => self.lint_single.as_ref(),
            CommandRole::Test => self.test.as_ref(),
            CommandRole::EntryPoint => self.entry_point.as_ref(),
        }
    }
}

/// Static configuration for one verification run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Package directory under verification.
    pub package: String,

    /// Tests directory handed to the test runner.
    pub tests_dir: String,

    /// Lint scheme.
    pub lint_policy: LintPolicy,

    /// Per-role command overrides.
    pub commands: CommandOverrides,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            tests_dir: DEFAULT_TESTS_DIR.to_string(),
            lint_policy: LintPolicy::default(),
            commands: CommandOverrides::default(),
        }
    }
}

impl VerifyConfig {
    /// Parse TOML text. `origin` only labels errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: VerifyConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&text, path)
    }

    /// Use `explicit` if given, else `verigate.toml` in the working
    /// directory if it exists, else builtin defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            Self::load(&fallback)
        } else {
            debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn with_lint_policy(mut self, policy: LintPolicy) -> Self {
        self.lint_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.package.trim().is_empty() {
            return Err(ConfigError::EmptyPackage);
        }
        for role in [
            CommandRole::TypeCheck,
            CommandRole::LintBlocking,
            CommandRole::LintAdvisory,
            CommandRole::LintSingle,
            CommandRole::Test,
            CommandRole::EntryPoint,
        ] {
            if let Some(spec) = self.commands.get(role) {
                spec.validate(role)?;
            }
        }
        Ok(())
    }

    /// Effective command for `role`: the override if set, else the builtin.
    pub fn command(&self, role: CommandRole) -> CommandSpec {
        self.commands
            .get(role)
            .cloned()
            .unwrap_or_else(|| self.builtin_command(role))
    }

    /// Builtin tool binding for `role`.
    pub fn builtin_command(&self, role: CommandRole) -> CommandSpec {
        let pkg = self.package.as_str();
        match role {
            CommandRole::TypeCheck => CommandSpec::new(
                "mypy",
                ["--disallow-untyped-defs", "--ignore-missing-imports", pkg],
            ),
            CommandRole::LintBlocking => CommandSpec::new(
                "flake8",
                [
                    pkg,
                    "--count",
                    BLOCKING_LINT_SELECT,
                    "--show-source",
                    "--statistics",
                ],
            ),
            CommandRole::LintAdvisory => CommandSpec::new(
                "flake8",
                [
                    pkg,
                    "--count",
                    "--exit-zero",
                    "--max-complexity=10",
                    "--max-line-length=127",
                    "--statistics",
                ],
            ),
            CommandRole::LintSingle => CommandSpec::new("pylint", [pkg]),
            CommandRole::Test => CommandSpec::new(
                "pytest",
                [format!("--cov={pkg}"), self.tests_dir.clone()],
            ),
            CommandRole::EntryPoint => CommandSpec::new("python3", ["-m", pkg]),
        }
    }
}
