//! Autofix configuration stored at `~/.autofix/config.toml`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::io::process::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Autofix configuration (TOML).
///
/// Missing fields fall back to defaults, so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutofixConfig {
    pub backend: BackendConfig,
    pub safety: SafetyConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// `openai`, `mock`, or `local`.
    pub provider: String,
    /// Empty means read `OPENAI_API_KEY` at startup.
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// Upper bound for one suggestion request, in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured key, or the `OPENAI_API_KEY` environment variable.
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var(API_KEY_ENV).unwrap_or_default()
    }
}

/// Confirmation policy handed to the engine as an immutable copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SafetyConfig {
    /// Run low-risk fixes without asking.
    pub auto_execute: bool,
    /// Ask a second time before any `sudo` fix.
    pub require_sudo_confirm: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            auto_execute: false,
            require_sudo_confirm: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock limit per command (original or fix), in seconds.
    pub command_timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl AutofixConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend.provider.trim().is_empty() {
            return Err(anyhow!("backend.provider must be non-empty"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(anyhow!("backend.timeout_secs must be > 0"));
        }
        if self.execution.command_timeout_secs == 0 {
            return Err(anyhow!("execution.command_timeout_secs must be > 0"));
        }
        if self.execution.output_limit_bytes == 0 {
            return Err(anyhow!("execution.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Update one dotted key, e.g. `safety.auto_execute`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "backend.provider" => self.backend.provider = value.to_string(),
            "backend.api_key" => self.backend.api_key = value.to_string(),
            "backend.endpoint" => self.backend.endpoint = value.to_string(),
            "backend.model" => self.backend.model = value.to_string(),
            "backend.timeout_secs" => self.backend.timeout_secs = parse_value(key, value)?,
            "safety.auto_execute" => self.safety.auto_execute = parse_bool(key, value)?,
            "safety.require_sudo_confirm" => {
                self.safety.require_sudo_confirm = parse_bool(key, value)?;
            }
            "execution.command_timeout_secs" => {
                self.execution.command_timeout_secs = parse_value(key, value)?;
            }
            "execution.output_limit_bytes" => {
                self.execution.output_limit_bytes = parse_value(key, value)?;
            }
            _ => bail!("unknown config key `{key}`"),
        }
        self.validate()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "y" | "yes" | "1" => Ok(true),
        "false" | "n" | "no" | "0" => Ok(false),
        _ => bail!("{key} expects true/false, got `{value}`"),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} expects a number, got `{value}`"))
}

/// `$HOME/.autofix/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
    Ok(PathBuf::from(home).join(".autofix").join("config.toml"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutofixConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutofixConfig> {
    if !path.exists() {
        let cfg = AutofixConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AutofixConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutofixConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// The file holds the API key, so it is created owner-only (0600) inside an
/// owner-only (0700) directory.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    create_private_dir(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp config in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp config {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .with_context(|| format!("create directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AutofixConfig::default());
        assert!(cfg.safety.require_sudo_confirm);
        assert!(!cfg.safety.auto_execute);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let mut cfg = AutofixConfig::default();
        cfg.backend.provider = "mock".to_string();
        cfg.safety.auto_execute = true;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[cfg(unix)]
    #[test]
    fn written_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join(".autofix");
        let path = dir.join("config.toml");
        let mut cfg = AutofixConfig::default();
        cfg.set("backend.api_key", "sk-secret").expect("set key");
        write_config(&path, &cfg).expect("write");

        let file_mode = fs::metadata(&path).expect("file meta").permissions().mode();
        let dir_mode = fs::metadata(&dir).expect("dir meta").permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(load_config(&path).expect("load").backend.api_key, "sk-secret");
    }

    #[test]
    fn partial_file_uses_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[safety]\nauto_execute = true\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.safety.auto_execute);
        assert!(cfg.safety.require_sudo_confirm);
        assert_eq!(cfg.backend.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[execution]\ncommand_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn set_updates_dotted_keys() {
        let mut cfg = AutofixConfig::default();
        cfg.set("backend.model", "gpt-4o").expect("set model");
        cfg.set("safety.auto_execute", "true").expect("set auto");
        cfg.set("safety.require_sudo_confirm", "no").expect("set sudo");
        cfg.set("execution.command_timeout_secs", "60").expect("set timeout");
        assert_eq!(cfg.backend.model, "gpt-4o");
        assert!(cfg.safety.auto_execute);
        assert!(!cfg.safety.require_sudo_confirm);
        assert_eq!(cfg.execution.command_timeout_secs, 60);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = AutofixConfig::default();
        assert!(cfg.set("llm.color", "blue").is_err());
        assert!(cfg.set("safety.auto_execute", "maybe").is_err());
        assert!(cfg.set("backend.timeout_secs", "soon").is_err());
        assert!(cfg.set("backend.timeout_secs", "0").is_err());
    }
}
