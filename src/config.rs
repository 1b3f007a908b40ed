//! Evaluation config file helpers.
//!
//! The config is optional: every field has a default and CLI flags override
//! whatever the file sets.
use crate::coverage::KnownUniverse;
use crate::errors::EngineError;
use crate::report::ReportFormat;
use crate::scenarios::{ExecutorOptions, RunOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

fn default_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Evaluation defaults loaded from `--config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    pub schema_version: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub stop_on_failure: bool,
    #[serde(default)]
    pub format: ReportFormat,
    /// Command line of a process handler, split shell-style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_errors: Option<Vec<String>>,
}

/// Defaults used when no config file is given.
pub fn default_config() -> EvalConfig {
    EvalConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        concurrency: default_concurrency(),
        fail_fast: false,
        timeout_ms: None,
        stop_on_failure: true,
        format: ReportFormat::Terminal,
        handler: None,
        known_commands: None,
        known_errors: None,
    }
}

/// Pretty JSON for `seval init`.
pub fn config_stub() -> Result<String> {
    let mut text =
        serde_json::to_string_pretty(&default_config()).context("serialize config stub")?;
    text.push('\n');
    Ok(text)
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<EvalConfig> {
    if !path.is_file() {
        return Err(EngineError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: EvalConfig = serde_json::from_slice(&bytes)
        .map_err(|err| EngineError::InvalidConfig(format!("{}: {err}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &EvalConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(EngineError::InvalidConfig(format!(
            "unsupported schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
            config.schema_version
        ))
        .into());
    }
    if config.concurrency == 0 {
        return Err(EngineError::InvalidConfig("concurrency must be at least 1".to_string()).into());
    }
    if config.timeout_ms == Some(0) {
        return Err(
            EngineError::InvalidConfig("timeout_ms must be greater than 0".to_string()).into(),
        );
    }
    if let Some(handler) = config.handler.as_deref() {
        if handler.trim().is_empty() {
            return Err(EngineError::InvalidConfig("handler must not be empty".to_string()).into());
        }
    }
    Ok(())
}

/// Write a config, refusing to replace an existing file unless `force`.
pub fn write_config(path: &Path, config: &EvalConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(EngineError::FileExists {
            path: path.to_path_buf(),
        }
        .into());
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config).context("serialize config")?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("write config {}", path.display()))?;
    Ok(())
}

impl EvalConfig {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            concurrency: self.concurrency,
            timeout: self.timeout_ms.map(Duration::from_millis),
            fail_fast: self.fail_fast,
            executor: ExecutorOptions {
                stop_on_failure: self.stop_on_failure,
            },
        }
    }

    pub fn known_universe(&self) -> KnownUniverse {
        KnownUniverse {
            commands: self.known_commands.clone(),
            errors: self.known_errors.clone(),
        }
    }
}
