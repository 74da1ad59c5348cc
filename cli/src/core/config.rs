//! # Pipewright Configuration System
//!
//! File: cli/src/core/config.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Loads the settings the `pipewright` binary applies before running anything:
//! whether to print trace lines, and which environment overrides every
//! command should run under.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.pipewright.toml` in the current directory or an
//!    ancestor. The search stops at the first directory containing `.git`.
//! 2. User-specific `<config dir>/pipewright/config.toml`.
//! 3. Defaults (`trace = true`, no overrides).
//!
//! `[env]` tables are merged key by key with the project file winning;
//! `trace` is taken from the project file when it sets it. Values are then
//! expanded (`~`, `$VAR`, `${VAR}`) and validated.
//!
//! Loading flow:
//! 1. Resolve the user file through `directories::ProjectDirs`
//! 2. Walk up from the current directory looking for `.pipewright.toml`
//! 3. Parse both (unknown keys are errors) and merge them
//! 4. Expand values with `shellexpand`, then validate names and values
//!
//! ## Example
//!
//! ```toml
//! trace = false
//!
//! [env]
//! CARGO_TERM_COLOR = "always"
//! PATH = "~/.local/bin:$PATH"
//! ```
//!
//! ```rust
//! # fn example() -> anyhow::Result<()> {
//! let cfg = pipewright::core::config::load_config()?;
//! let ns = cfg.namespace();
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{ConfigError, Result};
use crate::namespace::Namespace;
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const PROJECT_CONFIG_FILENAME: &str = ".pipewright.toml";

/// Settings loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Print `+ ...` trace lines (defaults to true when unset).
    #[serde(default)]
    pub trace: Option<bool>,
    /// Environment overrides for every command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Config {
    pub fn trace_enabled(&self) -> bool {
        self.trace.unwrap_or(true)
    }

    /// A namespace carrying the configured overrides.
    pub fn namespace(&self) -> Namespace {
        Namespace::new().with_env(self.env.clone())
    }
}

/// Loads, merges, expands and validates configuration for the current directory.
pub fn load_config() -> Result<Config> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let user_path = ProjectDirs::from("", "", "pipewright")
        .map(|dirs| dirs.config_dir().join("config.toml"));
    if user_path.is_none() {
        warn!("Could not determine user config directory.");
    }
    load_config_in(&current_dir, user_path.as_deref())
}

/// Same as [`load_config`], with explicit start directory and user file.
pub fn load_config_in(start_dir: &Path, user_path: Option<&Path>) -> Result<Config> {
    let user_config = match user_path {
        Some(path) if path.is_file() => {
            info!("Loading user configuration from: {}", path.display());
            Some(load_config_from_path(path)?)
        }
        Some(path) => {
            debug!("User configuration file not found at {}", path.display());
            None
        }
        None => None,
    };
    let project_config = match find_project_config_path(start_dir) {
        Some(path) => {
            info!("Loading project configuration from: {}", path.display());
            Some(load_config_from_path(&path)?)
        }
        None => {
            debug!("No project configuration file ({PROJECT_CONFIG_FILENAME}) found.");
            None
        }
    };
    let mut merged = merge_configs(user_config.unwrap_or_default(), project_config);
    expand_config_values(&mut merged).context("Failed to expand values in configuration")?;
    validate_config(&merged).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged);
    Ok(merged)
}

fn find_project_config_path(start_dir: &Path) -> Option<PathBuf> {
    let mut path = start_dir;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let Some(project) = project else {
        return user;
    };
    let mut env = user.env;
    env.extend(project.env);
    Config {
        trace: project.trace.or(user.trace),
        env,
    }
}

fn expand_config_values(config: &mut Config) -> Result<()> {
    for (key, value) in config.env.iter_mut() {
        let expanded = shellexpand::full(value.as_str())
            .map_err(|err| anyhow!("Cannot expand env value for '{}': {}", key, err))?
            .into_owned();
        *value = expanded;
        debug!("Expanded env {}={}", key, value);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    for (key, value) in &config.env {
        if key.is_empty() {
            return Err(anyhow!(ConfigError::Invalid(
                "Environment variable names cannot be empty.".to_string()
            )));
        }
        if key.contains('=') || key.contains('\0') {
            return Err(anyhow!(ConfigError::Invalid(format!(
                "Invalid environment variable name: '{}'.",
                key
            ))));
        }
        if value.contains('\0') {
            return Err(anyhow!(ConfigError::Invalid(format!(
                "Value of '{}' contains a NUL byte.",
                key
            ))));
        }
    }
    Ok(())
}
