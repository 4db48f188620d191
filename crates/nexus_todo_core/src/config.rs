//! Core configuration.
//!
//! # Responsibility
//! - Gather tunables (log level, default category, escalation keywords,
//!   planning thresholds, sync retry budget) in one serde model.
//! - Load it from a JSON file; missing fields fall back to defaults.

use crate::logging::default_log_level;
use crate::model::todo::DEFAULT_CATEGORY;
use crate::policy::escalation::EscalationConfig;
use crate::service::autonomous::PlanningConfig;
use crate::sync::outbox::SyncConfig;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub log_level: String,
    pub default_category: String,
    pub escalation: EscalationConfig,
    pub planning: PlanningConfig,
    pub sync: SyncConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
            escalation: EscalationConfig::default(),
            planning: PlanningConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl CoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_category.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "defaultCategory must not be blank".to_string(),
            ));
        }
        if self.planning.review_task_content.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "planning.reviewTaskContent must not be blank".to_string(),
            ));
        }
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sync.maxAttempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
