//! Prompt rendering for suggestion backends.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::io::backend::SuggestionRequest;

pub const SYSTEM_PROMPT: &str = include_str!("../prompts/system.md");
const SUGGESTION_TEMPLATE: &str = include_str!("../prompts/suggestion.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("suggestion", SUGGESTION_TEMPLATE)
            .expect("suggestion template should be valid");
        Self { env }
    }

    /// Render the user message describing one failed command.
    pub fn render_suggestion(&self, request: &SuggestionRequest<'_>) -> Result<String> {
        let template = self.env.get_template("suggestion")?;
        let stderr = match request.stderr.trim() {
            "" => "(empty)",
            trimmed => trimmed,
        };
        let rendered = template.render(context! {
            command => request.command,
            exit_code => request.exit_code,
            attempt => request.attempt,
            stderr => stderr,
            env => request.environment,
        })?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::apt_environment;

    #[test]
    fn renders_command_and_environment() {
        let env = apt_environment();
        let request = SuggestionRequest {
            environment: &env,
            command: "npm install",
            stderr: "npm ERR! code EACCES\n",
            exit_code: 243,
            attempt: 0,
        };
        let prompt = PromptEngine::new()
            .render_suggestion(&request)
            .expect("render");
        assert!(prompt.contains("Failed command: npm install"));
        assert!(prompt.contains("Exit code: 243"));
        assert!(prompt.contains("npm ERR! code EACCES"));
        assert!(prompt.contains("- OS: ubuntu 22.04"));
        assert!(prompt.contains("- Package manager: apt"));
        assert!(prompt.contains("- Sudo available: true"));
    }

    #[test]
    fn empty_stderr_is_marked() {
        let env = apt_environment();
        let request = SuggestionRequest {
            environment: &env,
            command: "false",
            stderr: "  \n",
            exit_code: 1,
            attempt: 0,
        };
        let prompt = PromptEngine::new()
            .render_suggestion(&request)
            .expect("render");
        assert!(prompt.contains("(empty)"));
    }
}
