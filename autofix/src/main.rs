//! `autofix`: run a command and repair common failures before retrying.
//!
//! Reads `$HOME/.autofix/config.toml` (or `--config`), detects the host
//! environment once, then hands the command to the healing loop. Progress is
//! rendered as bracketed status lines on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use autofix::core::types::CandidateSource;
use autofix::exit_codes;
use autofix::heal::{HealEngine, HealEvent, HealStop};
use autofix::io::backend::backend_from_config;
use autofix::io::config::{AutofixConfig, default_config_path, load_config, write_config};
use autofix::io::confirm::TerminalConfirmer;
use autofix::io::environment;
use autofix::io::process::HostRunner;
use autofix::logging;

#[derive(Parser)]
#[command(
    name = "autofix",
    version,
    about = "Run a command and automatically repair common failures"
)]
struct Cli {
    /// Config file (default: $HOME/.autofix/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a command, applying fixes and retrying when it fails.
    Run {
        /// The command and its arguments, joined with spaces.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Set one config value, e.g. `safety.auto_execute true`.
    Config { key: String, value: String },
    /// Print the detected environment as JSON.
    Env,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    match cli.command {
        Command::Run { command } => cmd_run(&config_path, &command.join(" ")),
        Command::Config { key, value } => cmd_config(&config_path, &key, &value),
        Command::Env => cmd_env(),
    }
}

fn cmd_run(config_path: &Path, command: &str) -> Result<i32> {
    if command.trim().is_empty() {
        bail!("no command given");
    }
    let cfg = load_config(config_path)?;
    debug!(path = %config_path.display(), provider = %cfg.backend.provider, "config loaded");

    let environment = environment::detect();
    let runner = HostRunner {
        timeout: std::time::Duration::from_secs(cfg.execution.command_timeout_secs),
        output_limit_bytes: cfg.execution.output_limit_bytes,
    };
    let backend = backend_from_config(&cfg.backend)?;
    let engine = HealEngine::new(
        &environment,
        &runner,
        backend.as_ref(),
        &TerminalConfirmer,
        cfg.safety,
    );

    let report = engine.run(command, |event| {
        for line in status_lines(event) {
            println!("{line}");
        }
        if let HealEvent::Executed { result, .. } = event {
            print!("{}", result.stdout());
            eprint!("{}", result.stderr());
        }
    })?;
    Ok(report.exit_code())
}

fn cmd_config(config_path: &Path, key: &str, value: &str) -> Result<i32> {
    let mut cfg = load_config(config_path)?;
    cfg.set(key, value)?;
    write_config(config_path, &cfg)?;
    println!("{key} = {}", displayed_value(&cfg, key));
    Ok(exit_codes::OK)
}

fn cmd_env() -> Result<i32> {
    let environment = environment::detect();
    let json = serde_json::to_string_pretty(&environment).context("serialize environment")?;
    println!("{json}");
    Ok(exit_codes::OK)
}

/// Echo a just-written value, masking secrets.
fn displayed_value(cfg: &AutofixConfig, key: &str) -> String {
    match key {
        "backend.api_key" if !cfg.backend.api_key.is_empty() => "********".to_string(),
        "backend.api_key" => String::new(),
        "backend.provider" => cfg.backend.provider.clone(),
        "backend.endpoint" => cfg.backend.endpoint.clone(),
        "backend.model" => cfg.backend.model.clone(),
        "backend.timeout_secs" => cfg.backend.timeout_secs.to_string(),
        "safety.auto_execute" => cfg.safety.auto_execute.to_string(),
        "safety.require_sudo_confirm" => cfg.safety.require_sudo_confirm.to_string(),
        "execution.command_timeout_secs" => cfg.execution.command_timeout_secs.to_string(),
        "execution.output_limit_bytes" => cfg.execution.output_limit_bytes.to_string(),
        _ => String::new(),
    }
}

/// Operator-facing status lines for one engine event.
fn status_lines(event: &HealEvent<'_>) -> Vec<String> {
    match event {
        HealEvent::Detected { environment } => vec![
            "[Detecting Environment]".to_string(),
            format!(
                "  {} {} ({}), package manager: {}",
                environment.os.as_str(),
                environment.os_version,
                environment.architecture.as_str(),
                environment.package_manager.as_str()
            ),
        ],
        HealEvent::Executing { command, .. } => vec![format!("[Executing Command] {command}")],
        HealEvent::Executed { .. } | HealEvent::Confirmed { .. } => Vec::new(),
        HealEvent::Classified { category, .. } => match category.detail() {
            Some(detail) => vec![format!("[Error Detected] {}: {detail}", category.message())],
            None => vec![format!("[Error Detected] {}", category.message())],
        },
        HealEvent::Proposed { candidate, .. } => {
            let mut lines = vec![format!("[Suggested Fix] {}", candidate.command)];
            if candidate.source == CandidateSource::Backend {
                if let Some(explanation) = &candidate.explanation {
                    lines.push(format!("  {explanation}"));
                }
                lines.push(format!("  risk: {}", candidate.effective_risk().as_str()));
            }
            lines
        }
        HealEvent::Applying { command } => vec![format!("[Applying Fix] {command}")],
        HealEvent::Applied { result } => {
            if result.success() {
                vec!["[Fix Applied]".to_string()]
            } else {
                vec![format!("[Fix Failed] exit code {}", result.exit_code())]
            }
        }
        HealEvent::Retrying {
            next_attempt,
            max_retries,
        } => vec![format!("[Retry {next_attempt}/{max_retries}]")],
        HealEvent::Finished { stop } => match stop {
            HealStop::Succeeded => vec!["[Success]".to_string()],
            other => vec![format!("[Failed] {other}")],
        },
    }
}
