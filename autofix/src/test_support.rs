//! Test-only helpers: canned environments and scripted collaborators.
//!
//! The scripted doubles replay queued outcomes in order and record what they
//! were asked, so tests can assert on call sequences without spawning
//! processes, opening sockets, or reading stdin.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::{
    Architecture, EnvironmentSnapshot, ExecutionResult, FixKind, OsFamily, PackageManager,
    RiskLevel,
};
use crate::io::backend::{Suggestion, SuggestionBackend, SuggestionRequest};
use crate::io::confirm::Confirmer;
use crate::io::process::CommandRunner;

/// Ubuntu 22.04 on amd64 with apt and sudo.
pub fn apt_environment() -> EnvironmentSnapshot {
    environment_with(PackageManager::Apt)
}

pub fn environment_with(package_manager: PackageManager) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        os: OsFamily::Ubuntu,
        os_version: "22.04".to_string(),
        architecture: Architecture::Amd64,
        package_manager,
        has_sudo: true,
        in_container: false,
    }
}

pub fn suggestion(fix: &str, risk_level: RiskLevel, fix_type: FixKind) -> Suggestion {
    Suggestion {
        explanation: format!("try `{fix}`"),
        proposed_fix: fix.to_string(),
        risk_level,
        fix_type,
    }
}

/// One scripted process outcome. The runner stamps it with the real command.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptedRun {
    pub fn ok() -> Self {
        Self::ok_with("")
    }

    pub fn ok_with(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Command runner that replays queued outcomes and records every command.
pub struct ScriptedRunner {
    runs: RefCell<VecDeque<ScriptedRun>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<ExecutionResult> {
        self.calls.borrow_mut().push(command.to_string());
        let run = self
            .runs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted runner exhausted at `{command}`"))?;
        Ok(ExecutionResult::new(
            command,
            run.exit_code,
            run.stdout,
            run.stderr,
        ))
    }
}

/// Suggestion backend that replays queued responses.
pub struct ScriptedBackend {
    responses: RefCell<VecDeque<Result<Suggestion>>>,
    requests: RefCell<Vec<(String, u32)>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<Suggestion>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    /// `(command, attempt)` for every request received.
    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests.borrow().clone()
    }
}

impl SuggestionBackend for ScriptedBackend {
    fn suggest(&self, request: &SuggestionRequest<'_>) -> Result<Suggestion> {
        self.requests
            .borrow_mut()
            .push((request.command.to_string(), request.attempt));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("scripted backend exhausted")))
    }
}

/// Confirmer that replays queued answers and records every prompt.
///
/// An unexpected prompt is an error so tests notice unwanted confirmations.
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirmation prompt: {prompt}"))
    }
}
