//! Operator confirmation prompts.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use tracing::debug;

/// Asks the operator a yes/no question.
pub trait Confirmer {
    /// Returns `true` only on an explicit yes. Any other answer declines.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Interactive y/N prompt on the terminal, defaulting to no.
///
/// Without a TTY on stdin there is nobody to ask, so the prompt declines.
/// Escape or Ctrl-C at the prompt also declines.
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        if !std::io::stdin().is_terminal() {
            debug!(prompt, "stdin is not a terminal, declining");
            println!("{}", non_interactive_notice(prompt));
            return Ok(false);
        }
        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact_opt()
            .context("read confirmation answer")?;
        Ok(answer.unwrap_or(false))
    }
}

fn non_interactive_notice(prompt: &str) -> String {
    format!("{prompt} [no terminal, declined]")
}
