//! TOML configuration with environment overrides
//!
//! Lookup order: an explicit `--config` path, `configmerge.toml` in the
//! working directory, then `config.toml` in the user's project config dir.
//! A missing file means defaults. `CONFIGMERGE_*` variables are applied on
//! top, and the CLI applies its own flags last.

use crate::engine::EngineKind;
use crate::error::{Error, Result};
use crate::transform::{GroupOrder, MergeRule};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "configmerge.toml";

const ENV_ENGINE: &str = "CONFIGMERGE_ENGINE";
const ENV_GROUP_ORDER: &str = "CONFIGMERGE_GROUP_ORDER";
const ENV_LOG_LEVEL: &str = "CONFIGMERGE_LOG_LEVEL";

/// `config.toml` under the platform config directory
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "configmerge", "configmerge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineKind,
    pub group_order: GroupOrder,
    pub log_level: Option<String>,
    pub rule: MergeRule,
    pub selection: SelectionConfig,
    pub expression: ExpressionConfig,
    pub template: TemplateConfig,
    pub script: ScriptConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Records not matching are dropped before any engine runs
    pub filter: Option<String>,
}

/// Overrides for the `expression` engine rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExpressionConfig {
    pub group_key: Option<String>,
    pub member_name: Option<String>,
    pub member_value: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    /// Replaces the bundled template
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptConfig {
    /// Replaces the bundled script
    pub path: Option<PathBuf>,
    pub memory_limit_bytes: usize,
    pub max_stack_bytes: usize,
    pub timeout_ms: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: None,
            memory_limit_bytes: 16 * 1024 * 1024,
            max_stack_bytes: 1024 * 1024,
            timeout_ms: 2000,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve the config file and apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("No configuration file found; using defaults");
                Self::default()
            }
        };
        config.merge_env_vars()?;
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Ok(Some(local));
        }
        Ok(user_config_path().filter(|path| path.is_file()))
    }

    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(engine) = lookup(ENV_ENGINE) {
            self.engine = engine
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_ENGINE}: {e}")))?;
        }

        if let Some(order) = lookup(ENV_GROUP_ORDER) {
            self.group_order = order
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_GROUP_ORDER}: {e}")))?;
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = Some(level);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.rule.group_label.trim().is_empty() {
            return Err(Error::Config("rule.group_label must not be empty".into()));
        }
        if self.rule.merge_key.trim().is_empty() {
            return Err(Error::Config("rule.merge_key must not be empty".into()));
        }
        if self.script.timeout_ms == 0 {
            return Err(Error::Config("script.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
