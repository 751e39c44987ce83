//! The self-healing loop: run, classify, resolve, gate, fix, retry.
//!
//! Each run owns its attempt counter, an immutable environment snapshot and an
//! immutable copy of the safety policy. The loop is bounded by [`MAX_RETRIES`]
//! and ends on success, on a terminal decision, or on exhaustion.

use std::fmt;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::classify;
use crate::core::safety::{self, Verdict};
use crate::core::types::{
    EnvironmentSnapshot, ExecutionResult, FailureCategory, FixKind, RemediationCandidate,
    RiskLevel,
};
use crate::exit_codes;
use crate::io::backend::SuggestionBackend;
use crate::io::config::SafetyConfig;
use crate::io::confirm::Confirmer;
use crate::io::process::CommandRunner;
use crate::resolve::Resolver;

/// Highest attempt index. The original command runs at most `MAX_RETRIES + 1` times.
pub const MAX_RETRIES: u32 = 3;

pub const FIX_PROMPT: &str = "Execute this fix?";
pub const SUDO_FIX_PROMPT: &str = "This command requires sudo. Execute?";
pub const SUDO_COMMAND_PROMPT: &str = "This command uses sudo. Run it?";

/// Progress notifications, emitted in order:
/// detect, execute, classify, propose, confirm, apply, then retry or finish.
#[derive(Debug)]
pub enum HealEvent<'a> {
    Detected {
        environment: &'a EnvironmentSnapshot,
    },
    Executing {
        attempt: u32,
        command: &'a str,
    },
    Executed {
        attempt: u32,
        result: &'a ExecutionResult,
    },
    Classified {
        attempt: u32,
        category: &'a FailureCategory,
    },
    Proposed {
        attempt: u32,
        candidate: &'a RemediationCandidate,
    },
    Confirmed {
        prompt: &'a str,
        accepted: bool,
    },
    Applying {
        command: &'a str,
    },
    Applied {
        result: &'a ExecutionResult,
    },
    Retrying {
        next_attempt: u32,
        max_retries: u32,
    },
    Finished {
        stop: &'a HealStop,
    },
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealStop {
    /// The original command (or a replacement fix) succeeded.
    Succeeded,
    /// A command matched the block list and was never executed.
    Blocked {
        command: String,
        pattern: &'static str,
    },
    /// No rule matched and the backend had nothing actionable.
    NoFixAvailable,
    /// The operator declined the proposed fix.
    Declined,
    /// The operator declined a `sudo` command.
    SudoDeclined,
    /// The fix itself failed. Fixes are never retried.
    FixFailed { command: String, stderr: String },
    /// The original command still failed on the last allowed attempt.
    MaxRetriesExceeded,
}

impl fmt::Display for HealStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Blocked { pattern, .. } => write!(f, "destructive command blocked: {pattern}"),
            Self::NoFixAvailable => write!(f, "no fix available"),
            Self::Declined => write!(f, "fix declined by user"),
            Self::SudoDeclined => write!(f, "sudo command declined"),
            Self::FixFailed { stderr, .. } => write!(f, "fix command failed: {stderr}"),
            Self::MaxRetriesExceeded => write!(f, "max retries exceeded"),
        }
    }
}

/// Summary of one engine run.
#[derive(Debug, Clone)]
pub struct HealReport {
    pub stop: HealStop,
    /// Final result: the last original run, or the replacement fix's result.
    /// `None` when nothing was executed.
    pub result: Option<ExecutionResult>,
    /// Index of the last attempt that ran the original command.
    pub attempts: u32,
    /// Fix commands that ran successfully, in order.
    pub fixes_applied: Vec<String>,
}

impl HealReport {
    pub fn succeeded(&self) -> bool {
        self.stop == HealStop::Succeeded
    }

    /// Process exit status for this outcome.
    ///
    /// Zero on success, the final command's exit code on failure.
    pub fn exit_code(&self) -> i32 {
        match &self.stop {
            HealStop::Succeeded => exit_codes::OK,
            HealStop::Blocked { .. } => exit_codes::BLOCKED,
            _ => self
                .result
                .as_ref()
                .map(ExecutionResult::exit_code)
                .filter(|code| *code != 0)
                .unwrap_or(exit_codes::ERROR),
        }
    }
}

enum AttemptOutcome {
    Retry,
    Replaced(ExecutionResult),
    Stop(HealStop),
}

/// Bounded retry loop around one command.
pub struct HealEngine<'a, R: CommandRunner, C: Confirmer> {
    environment: &'a EnvironmentSnapshot,
    runner: &'a R,
    resolver: Resolver<'a>,
    confirmer: &'a C,
    policy: SafetyConfig,
}

impl<'a, R: CommandRunner, C: Confirmer> HealEngine<'a, R, C> {
    pub fn new(
        environment: &'a EnvironmentSnapshot,
        runner: &'a R,
        backend: &'a dyn SuggestionBackend,
        confirmer: &'a C,
        policy: SafetyConfig,
    ) -> Self {
        Self {
            environment,
            runner,
            resolver: Resolver::new(environment, backend),
            confirmer,
            policy,
        }
    }

    /// Run `command`, repairing failures until it succeeds or a stop condition
    /// is reached.
    ///
    /// Terminal outcomes are reported through [`HealReport::stop`]; `Err` is
    /// returned only when a process cannot be started or the operator cannot
    /// be asked.
    #[instrument(skip_all, fields(command = command))]
    pub fn run<F: FnMut(&HealEvent<'_>)>(&self, command: &str, mut on_event: F) -> Result<HealReport> {
        on_event(&HealEvent::Detected {
            environment: self.environment,
        });

        match safety::validate(command) {
            Verdict::Blocked { pattern } => {
                let stop = HealStop::Blocked {
                    command: command.to_string(),
                    pattern,
                };
                return Ok(finish(stop, None, 0, Vec::new(), &mut on_event));
            }
            Verdict::NeedsConfirmation if self.must_confirm_sudo() => {
                if !self.ask(SUDO_COMMAND_PROMPT, &mut on_event)? {
                    return Ok(finish(HealStop::SudoDeclined, None, 0, Vec::new(), &mut on_event));
                }
            }
            Verdict::NeedsConfirmation | Verdict::Allowed => {}
        }

        let mut fixes_applied = Vec::new();
        let mut last_result = None;
        for attempt in 0..=MAX_RETRIES {
            on_event(&HealEvent::Executing { attempt, command });
            let result = self.runner.run(command)?;
            on_event(&HealEvent::Executed {
                attempt,
                result: &result,
            });

            if result.success() {
                return Ok(finish(
                    HealStop::Succeeded,
                    Some(result),
                    attempt,
                    fixes_applied,
                    &mut on_event,
                ));
            }
            if attempt == MAX_RETRIES {
                last_result = Some(result);
                break;
            }

            match self.attempt_fix(command, &result, attempt, &mut fixes_applied, &mut on_event)? {
                AttemptOutcome::Retry => {
                    info!(next_attempt = attempt + 1, "fix applied, retrying");
                    on_event(&HealEvent::Retrying {
                        next_attempt: attempt + 1,
                        max_retries: MAX_RETRIES,
                    });
                }
                AttemptOutcome::Replaced(fix_result) => {
                    return Ok(finish(
                        HealStop::Succeeded,
                        Some(fix_result),
                        attempt,
                        fixes_applied,
                        &mut on_event,
                    ));
                }
                AttemptOutcome::Stop(stop) => {
                    return Ok(finish(
                        stop,
                        Some(result),
                        attempt,
                        fixes_applied,
                        &mut on_event,
                    ));
                }
            }
        }

        Ok(finish(
            HealStop::MaxRetriesExceeded,
            last_result,
            MAX_RETRIES,
            fixes_applied,
            &mut on_event,
        ))
    }

    /// Classify one failure, then resolve, gate and apply a fix for it.
    fn attempt_fix<F: FnMut(&HealEvent<'_>)>(
        &self,
        command: &str,
        failure: &ExecutionResult,
        attempt: u32,
        fixes_applied: &mut Vec<String>,
        on_event: &mut F,
    ) -> Result<AttemptOutcome> {
        let category = classify(failure.stderr(), failure.exit_code());
        debug!(category = category.name(), detail = ?category.detail(), "classified failure");
        on_event(&HealEvent::Classified {
            attempt,
            category: &category,
        });

        let Some(candidate) = self.resolver.resolve(&category, command, failure, attempt) else {
            return Ok(AttemptOutcome::Stop(HealStop::NoFixAvailable));
        };
        on_event(&HealEvent::Proposed {
            attempt,
            candidate: &candidate,
        });

        let verdict = safety::validate(&candidate.command);
        if let Verdict::Blocked { pattern } = verdict {
            warn!(fix = %candidate.command, pattern, "proposed fix blocked");
            return Ok(AttemptOutcome::Stop(HealStop::Blocked {
                command: candidate.command,
                pattern,
            }));
        }
        if let Some(stop) = self.gate(&candidate, verdict, on_event)? {
            return Ok(AttemptOutcome::Stop(stop));
        }

        on_event(&HealEvent::Applying {
            command: &candidate.command,
        });
        let fix_result = self.runner.run(&candidate.command)?;
        on_event(&HealEvent::Applied {
            result: &fix_result,
        });

        if !fix_result.success() {
            warn!(fix = %candidate.command, exit_code = fix_result.exit_code(), "fix failed");
            return Ok(AttemptOutcome::Stop(HealStop::FixFailed {
                command: candidate.command,
                stderr: fix_result.stderr().trim().to_string(),
            }));
        }
        fixes_applied.push(candidate.command);

        Ok(match candidate.kind {
            FixKind::Replacement => AttemptOutcome::Replaced(fix_result),
            FixKind::Preparation => AttemptOutcome::Retry,
        })
    }

    /// Confirmation gate for a validated candidate.
    ///
    /// `auto_execute` skips confirmation for low-risk candidates: rule fixes,
    /// backend fixes rated low, and fixes led by an allowlisted program.
    fn gate<F: FnMut(&HealEvent<'_>)>(
        &self,
        candidate: &RemediationCandidate,
        verdict: Verdict,
        on_event: &mut F,
    ) -> Result<Option<HealStop>> {
        let low_risk = candidate.effective_risk() == RiskLevel::Low
            || safety::is_low_risk(&candidate.command);
        if self.policy.auto_execute && low_risk {
            debug!(fix = %candidate.command, "auto-executing low-risk fix");
            return Ok(None);
        }

        if !self.ask(FIX_PROMPT, on_event)? {
            return Ok(Some(HealStop::Declined));
        }
        let uses_sudo =
            safety::is_sudo(&candidate.command) || verdict == Verdict::NeedsConfirmation;
        if uses_sudo && self.policy.require_sudo_confirm && !self.ask(SUDO_FIX_PROMPT, on_event)? {
            return Ok(Some(HealStop::SudoDeclined));
        }
        Ok(None)
    }

    fn must_confirm_sudo(&self) -> bool {
        !self.policy.auto_execute && self.policy.require_sudo_confirm
    }

    fn ask<F: FnMut(&HealEvent<'_>)>(&self, prompt: &str, on_event: &mut F) -> Result<bool> {
        let accepted = self.confirmer.confirm(prompt)?;
        on_event(&HealEvent::Confirmed { prompt, accepted });
        Ok(accepted)
    }
}

fn finish<F: FnMut(&HealEvent<'_>)>(
    stop: HealStop,
    result: Option<ExecutionResult>,
    attempts: u32,
    fixes_applied: Vec<String>,
    on_event: &mut F,
) -> HealReport {
    match &stop {
        HealStop::Succeeded => info!(attempts, "command succeeded"),
        other => warn!(attempts, reason = %other, "command not healed"),
    }
    on_event(&HealEvent::Finished { stop: &stop });
    HealReport {
        stop,
        result,
        attempts,
        fixes_applied,
    }
}
