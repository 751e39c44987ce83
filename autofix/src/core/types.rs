//! Shared deterministic types for the self-healing core.
//!
//! These types define stable contracts between the classifier, the remediation
//! table, the safety validator and the engine. They carry no I/O and are
//! immutable once constructed.

use serde::{Deserialize, Serialize};

/// Operating system family reported by environment detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Ubuntu,
    Debian,
    Fedora,
    Arch,
    Macos,
    Unknown,
}

impl OsFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::Fedora => "fedora",
            Self::Arch => "arch",
            Self::Macos => "macos",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
    Unknown,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::Unknown => "unknown",
        }
    }
}

/// System package manager used to build install remediations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    None,
    Apt,
    Dnf,
    Yum,
    Pacman,
    Brew,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        }
    }
}

/// Read-only description of the host a run executes on.
///
/// Supplied once per run; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub os: OsFamily,
    pub os_version: String,
    pub architecture: Architecture,
    pub package_manager: PackageManager,
    pub has_sudo: bool,
    pub in_container: bool,
}

/// Outcome of executing one command.
///
/// Fields are private so a result cannot be altered after the runner produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    command: String,
    exit_code: i32,
    stdout: String,
    stderr: String,
    success: bool,
    lines: Vec<String>,
}

impl ExecutionResult {
    pub fn new(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        let stdout = stdout.into();
        let lines = stdout.lines().map(str::to_string).collect();
        Self {
            command: command.into(),
            exit_code,
            stdout,
            stderr: stderr.into(),
            success: exit_code == 0,
            lines,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Stdout split on newlines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Structured failure category with at most one extracted parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureCategory {
    MissingCommand { command: Option<String> },
    MissingCompiler,
    MissingLibrary { library: Option<String> },
    PortInUse { port: Option<String> },
    PermissionDenied,
    MissingBuildTools,
    PackageManagerNotFound,
    ArchitectureMismatch,
    Unknown,
}

impl FailureCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MissingCommand { .. } => "missing_command",
            Self::MissingCompiler => "missing_compiler",
            Self::MissingLibrary { .. } => "missing_library",
            Self::PortInUse { .. } => "port_in_use",
            Self::PermissionDenied => "permission_denied",
            Self::MissingBuildTools => "missing_build_tools",
            Self::PackageManagerNotFound => "package_manager_not_found",
            Self::ArchitectureMismatch => "architecture_mismatch",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable summary for status output.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingCommand { .. } => "Command not found",
            Self::MissingCompiler => "Compiler not found",
            Self::MissingLibrary { .. } => "Missing shared library",
            Self::PortInUse { .. } => "Port already in use",
            Self::PermissionDenied => "Permission denied",
            Self::MissingBuildTools => "Missing build tools",
            Self::PackageManagerNotFound => "Package manager not found",
            Self::ArchitectureMismatch => "Architecture mismatch",
            Self::Unknown => "Unknown error",
        }
    }

    /// The extracted parameter (command, library or port), if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::MissingCommand { command } => command.as_deref(),
            Self::MissingLibrary { library } => library.as_deref(),
            Self::PortInUse { port } => port.as_deref(),
            _ => None,
        }
    }
}

/// How a successful remediation relates to the original command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixKind {
    /// The original command is retried unchanged afterwards.
    #[default]
    Preparation,
    /// The fix's own result supersedes the original command.
    Replacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Where a remediation candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Rule,
    Backend,
}

/// A proposed fix command awaiting safety gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationCandidate {
    pub command: String,
    pub kind: FixKind,
    /// Only set for backend suggestions.
    pub risk: Option<RiskLevel>,
    /// Only set for backend suggestions.
    pub explanation: Option<String>,
    pub source: CandidateSource,
}

impl RemediationCandidate {
    /// Deterministic table entry: always a low-risk preparation fix.
    pub fn rule(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            kind: FixKind::Preparation,
            risk: None,
            explanation: None,
            source: CandidateSource::Rule,
        }
    }

    pub fn effective_risk(&self) -> RiskLevel {
        match (self.source, self.risk) {
            (CandidateSource::Rule, _) => RiskLevel::Low,
            (CandidateSource::Backend, Some(risk)) => risk,
            (CandidateSource::Backend, None) => RiskLevel::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_result_derives_success_and_lines() {
        let ok = ExecutionResult::new("echo", 0, "a\nb\n", "");
        assert!(ok.success());
        assert_eq!(ok.lines(), ["a".to_string(), "b".to_string()]);

        let failed = ExecutionResult::new("false", 1, "", "boom");
        assert!(!failed.success());
        assert!(failed.lines().is_empty());
    }

    #[test]
    fn rule_candidates_are_low_risk_preparation() {
        let candidate = RemediationCandidate::rule("brew install jq");
        assert_eq!(candidate.kind, FixKind::Preparation);
        assert_eq!(candidate.effective_risk(), RiskLevel::Low);
        assert!(candidate.explanation.is_none());
    }

    #[test]
    fn failure_category_serializes_with_tag() {
        let category = FailureCategory::PortInUse {
            port: Some("8080".to_string()),
        };
        let json = serde_json::to_value(&category).expect("serialize");
        assert_eq!(json["type"], "port_in_use");
        assert_eq!(json["port"], "8080");
        assert_eq!(category.detail(), Some("8080"));
    }
}
