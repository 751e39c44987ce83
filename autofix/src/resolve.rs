//! Remediation resolution: the deterministic table first, the suggestion
//! backend second.

use tracing::{debug, info, instrument, warn};

use crate::core::remediation::rule_for;
use crate::core::types::{
    CandidateSource, EnvironmentSnapshot, ExecutionResult, FailureCategory, RemediationCandidate,
};
use crate::io::backend::{SuggestionBackend, SuggestionRequest};

/// Turns a classified failure into at most one candidate fix.
pub struct Resolver<'a> {
    environment: &'a EnvironmentSnapshot,
    backend: &'a dyn SuggestionBackend,
}

impl<'a> Resolver<'a> {
    pub fn new(environment: &'a EnvironmentSnapshot, backend: &'a dyn SuggestionBackend) -> Self {
        Self {
            environment,
            backend,
        }
    }

    /// Resolve a candidate for `failure` of `command` on `attempt`.
    ///
    /// The backend is consulted only when no rule matches and only on the first
    /// attempt. Backend errors and empty proposals yield `None`; they are not
    /// retried.
    #[instrument(skip_all, fields(category = category.name(), attempt = attempt))]
    pub fn resolve(
        &self,
        category: &FailureCategory,
        command: &str,
        failure: &ExecutionResult,
        attempt: u32,
    ) -> Option<RemediationCandidate> {
        if let Some(candidate) = rule_for(category, self.environment.package_manager) {
            debug!(fix = %candidate.command, "rule matched");
            return Some(candidate);
        }
        if attempt > 0 {
            debug!("no rule; backend is only consulted on the first attempt");
            return None;
        }

        let request = SuggestionRequest {
            environment: self.environment,
            command,
            stderr: failure.stderr(),
            exit_code: failure.exit_code(),
            attempt,
        };
        let suggestion = match self.backend.suggest(&request) {
            Ok(suggestion) => suggestion,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "suggestion backend failed");
                return None;
            }
        };

        let fix = suggestion.proposed_fix.trim();
        if fix.is_empty() {
            info!(explanation = %suggestion.explanation, "backend has no actionable fix");
            return None;
        }
        let explanation = suggestion.explanation.trim();
        Some(RemediationCandidate {
            command: fix.to_string(),
            kind: suggestion.fix_type,
            risk: Some(suggestion.risk_level),
            explanation: (!explanation.is_empty()).then(|| explanation.to_string()),
            source: CandidateSource::Backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::core::types::{FixKind, PackageManager, RiskLevel};
    use crate::test_support::{ScriptedBackend, apt_environment, environment_with, suggestion};

    fn failure(stderr: &str) -> ExecutionResult {
        ExecutionResult::new("cmd", 1, "", stderr)
    }

    #[test]
    fn rule_wins_and_backend_is_never_called() {
        let env = apt_environment();
        let backend = ScriptedBackend::new(vec![Ok(suggestion(
            "echo nope",
            RiskLevel::Low,
            FixKind::Preparation,
        ))]);
        let resolver = Resolver::new(&env, &backend);
        let category = FailureCategory::MissingCommand {
            command: Some("jq".to_string()),
        };

        let candidate = resolver
            .resolve(&category, "jq .", &failure("jq: command not found"), 0)
            .expect("candidate");
        assert_eq!(candidate.command, "sudo apt-get install -y jq");
        assert_eq!(candidate.source, CandidateSource::Rule);
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn backend_used_when_no_rule_on_first_attempt() {
        let env = apt_environment();
        let backend = ScriptedBackend::new(vec![Ok(suggestion(
            "npm ci",
            RiskLevel::Medium,
            FixKind::Replacement,
        ))]);
        let resolver = Resolver::new(&env, &backend);

        let candidate = resolver
            .resolve(&FailureCategory::Unknown, "npm install", &failure("boom"), 0)
            .expect("candidate");
        assert_eq!(candidate.command, "npm ci");
        assert_eq!(candidate.kind, FixKind::Replacement);
        assert_eq!(candidate.risk, Some(RiskLevel::Medium));
        assert_eq!(candidate.source, CandidateSource::Backend);
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.requests()[0].0, "npm install");
    }

    #[test]
    fn backend_not_consulted_after_first_attempt() {
        let env = apt_environment();
        let backend = ScriptedBackend::new(Vec::new());
        let resolver = Resolver::new(&env, &backend);

        let candidate = resolver.resolve(&FailureCategory::Unknown, "x", &failure("boom"), 1);
        assert!(candidate.is_none());
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn backend_failure_is_no_candidate() {
        let env = environment_with(PackageManager::None);
        let backend = ScriptedBackend::new(vec![Err(anyhow!("connection refused"))]);
        let resolver = Resolver::new(&env, &backend);
        let category = FailureCategory::MissingCommand {
            command: Some("jq".to_string()),
        };

        assert!(resolver.resolve(&category, "jq", &failure(""), 0).is_none());
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn empty_proposal_is_no_candidate() {
        let env = apt_environment();
        let backend = ScriptedBackend::new(vec![Ok(suggestion(
            "   ",
            RiskLevel::High,
            FixKind::Preparation,
        ))]);
        let resolver = Resolver::new(&env, &backend);

        assert!(
            resolver
                .resolve(&FailureCategory::Unknown, "x", &failure("boom"), 0)
                .is_none()
        );
    }
}
