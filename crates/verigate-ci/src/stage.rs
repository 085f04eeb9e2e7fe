//! Gate names, command specs and per-pass configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Builtin verification gates, declared in pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    /// Static type analysis with fully annotated signatures required.
    TypeCheck,

    /// Lint analysis, one or two passes depending on the lint policy.
    Lint,

    /// Test suite with coverage scoped to the package.
    Test,
}

impl GateName {
    /// All gates in the order `verify` runs them.
    pub const ALL: [GateName; 3] = [GateName::TypeCheck, GateName::Lint, GateName::Test];

    /// Get the gate name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            GateName::TypeCheck => "type_check",
            GateName::Lint => "lint",
            GateName::Test => "test",
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GateName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type_check" => Ok(GateName::TypeCheck),
            "lint" => Ok(GateName::Lint),
            "test" => Ok(GateName::Test),
            other => Err(ConfigError::UnknownGate(other.to_string())),
        }
    }
}

/// Every tool invocation the configuration knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandRole {
    TypeCheck,
    LintBlocking,
    LintAdvisory,
    LintSingle,
    Test,
    EntryPoint,
}

impl CommandRole {
    pub fn name(&self) -> &'static str {
        match self {
            CommandRole::TypeCheck => "type_check",
            CommandRole::LintBlocking => "lint_blocking",
            CommandRole::LintAdvisory => "lint_advisory",
            CommandRole::LintSingle => "lint_single",
            CommandRole::Test => "test",
            CommandRole::EntryPoint => "entry_point",
        }
    }
}

impl fmt::Display for CommandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a pass's exit status decides the gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Non-zero exit fails the gate.
    Blocking,

    /// Findings are reported; the exit status never fails the gate.
    Advisory,
}

/// An external command: executable plus fixed arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    /// Arguments passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,

    /// Timeout in seconds. Zero waits indefinitely.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout_secs: 0,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Space-joined command line, for logs and digests.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn validate(&self, role: CommandRole) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::EmptyCommand {
                role: role.name().to_string(),
            });
        }
        Ok(())
    }
}

/// One tool invocation inside a gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassConfig {
    pub role: CommandRole,
    pub command: CommandSpec,
    pub strictness: Strictness,
}

impl PassConfig {
    pub fn blocking(role: CommandRole, command: CommandSpec) -> Self {
        Self {
            role,
            command,
            strictness: Strictness::Blocking,
        }
    }

    pub fn advisory(role: CommandRole, command: CommandSpec) -> Self {
        Self {
            role,
            command,
            strictness: Strictness::Advisory,
        }
    }

    pub fn name(&self) -> &'static str {
        self.role.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_names() {
        assert_eq!(GateName::TypeCheck.name(), "type_check");
        assert_eq!(GateName::Lint.name(), "lint");
        assert_eq!(GateName::Test.name(), "test");
    }

    #[test]
    fn test_gate_order() {
        assert_eq!(
            GateName::ALL,
            [GateName::TypeCheck, GateName::Lint, GateName::Test]
        );
    }

    #[test]
    fn test_parse_gate_names() {
        assert_eq!("type_check".parse::<GateName>().unwrap(), GateName::TypeCheck);
        assert_eq!("lint".parse::<GateName>().unwrap(), GateName::Lint);
        assert_eq!("test".parse::<GateName>().unwrap(), GateName::Test);
    }

    #[test]
    fn test_parse_only_canonical_names() {
        for name in ["type-check", " test ", "Lint", ""] {
            let err = name.parse::<GateName>().unwrap_err();
            assert!(matches!(err, ConfigError::UnknownGate(_)), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_unknown_gate() {
        let err = "format".parse::<GateName>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGate(ref name) if name == "format"));
    }

    #[test]
    fn test_command_line() {
        let cmd = CommandSpec::new("flake8", ["pkg", "--count"]);
        assert_eq!(cmd.command_line(), "flake8 pkg --count");
        assert_eq!(cmd.timeout_secs, 0);
    }

    #[test]
    fn test_command_with_timeout() {
        let cmd = CommandSpec::new("pytest", Vec::<String>::new()).with_timeout(60);
        assert_eq!(cmd.timeout_secs, 60);
        assert_eq!(cmd.command_line(), "pytest");
    }

    #[test]
    fn test_empty_program_rejected() {
        let cmd = CommandSpec::new("  ", ["x"]);
        let err = cmd.validate(CommandRole::Test).unwrap_err();
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn test_pass_config_strictness() {
        let cmd = CommandSpec::new("flake8", ["pkg"]);
        assert_eq!(
            PassConfig::blocking(CommandRole::LintBlocking, cmd.clone()).strictness,
            Strictness::Blocking
        );
        let advisory = PassConfig::advisory(CommandRole::LintAdvisory, cmd);
        assert_eq!(advisory.strictness, Strictness::Advisory);
        assert_eq!(advisory.name(), "lint_advisory");
    }
}
