//! # Configuration
//!
//! `stepwise.toml` plus environment overrides.
//!
//! ```toml
//! store = "processes"
//! storage = "split-by-chapter"
//! default_mode = "Fast"
//! tick_ms = 100
//! max_ticks = 10000
//!
//! [[modes]]
//! name = "Fast"
//! rule = "blacklist"
//! types = ["delay", "timeout"]
//! ```
//!
//! Precedence, lowest first: built-in defaults, the file, `STEPWISE_*`
//! environment variables, command-line flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepwise_core::primitives::{DEFAULT_MAX_TICKS, DEFAULT_MODE_NAME, DEFAULT_TICK_MS};
use stepwise_core::{Mode, ModeCollection, StepwiseError, StorageStrategy, TypeRule};

/// File read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stepwise.toml";

/// Store directory used when nothing else is configured.
pub const DEFAULT_STORE_DIR: &str = "processes";

pub const ENV_STORE: &str = "STEPWISE_STORE";
pub const ENV_MODE: &str = "STEPWISE_MODE";
pub const ENV_MAX_TICKS: &str = "STEPWISE_MAX_TICKS";

// =============================================================================
// CONFIG
// =============================================================================

/// Rule keyword of a configured mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Whitelist,
    Blacklist,
}

/// One `[[modes]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeConfig {
    pub name: String,
    pub rule: RuleKind,
    #[serde(default)]
    pub types: Vec<String>,
}

impl ModeConfig {
    #[must_use]
    pub fn to_mode(&self) -> Mode {
        let rule = match self.rule {
            RuleKind::Whitelist => TypeRule::whitelist(self.types.iter().cloned()),
            RuleKind::Blacklist => TypeRule::blacklist(self.types.iter().cloned()),
        };
        Mode::new(self.name.clone(), rule)
    }
}

/// Effective application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: PathBuf,
    pub storage: StorageStrategy,
    pub default_mode: String,
    pub tick_ms: u64,
    pub max_ticks: u64,
    pub modes: Vec<ModeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: PathBuf::from(DEFAULT_STORE_DIR),
            storage: StorageStrategy::default(),
            default_mode: DEFAULT_MODE_NAME.to_string(),
            tick_ms: DEFAULT_TICK_MS,
            max_ticks: DEFAULT_MAX_TICKS,
            modes: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, StepwiseError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StepwiseError::DeserializationError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file and apply environment overrides.
    ///
    /// An explicit path must exist; the default `stepwise.toml` may be
    /// absent, in which case the defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, StepwiseError> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::read(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    fn read(path: &Path) -> Result<Self, StepwiseError> {
        tracing::debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(path).map_err(|e| {
            StepwiseError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `STEPWISE_*` overrides looked up through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StepwiseError> {
        if let Some(store) = lookup(ENV_STORE) {
            self.store = PathBuf::from(store);
        }
        if let Some(mode) = lookup(ENV_MODE) {
            self.default_mode = mode;
        }
        if let Some(max_ticks) = lookup(ENV_MAX_TICKS) {
            self.max_ticks = max_ticks.trim().parse().map_err(|_| {
                StepwiseError::DeserializationError(format!(
                    "{} must be a non-negative integer, got '{}'",
                    ENV_MAX_TICKS, max_ticks
                ))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Simulated time per tick.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Build the mode collection, with `default_mode` selected.
    pub fn mode_collection(&self) -> Result<ModeCollection, StepwiseError> {
        let mut modes = ModeCollection::new();
        for mode in &self.modes {
            modes.add(mode.to_mode())?;
        }
        modes.select(&self.default_mode)?;
        Ok(modes)
    }

    fn validate(&self) -> Result<(), StepwiseError> {
        if self.tick_ms == 0 {
            return Err(StepwiseError::DeserializationError(
                "tick_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(mode) = self.modes.iter().find(|m| m.name.trim().is_empty()) {
            return Err(StepwiseError::DeserializationError(format!(
                "mode names must not be empty (rule {:?})",
                mode.rule
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_toml_str("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.tick(), Duration::from_millis(DEFAULT_TICK_MS));
    }

    #[test]
    fn default_mode_collection_selects_default() {
        let modes = Config::default().mode_collection().expect("modes");
        assert_eq!(modes.current().name(), DEFAULT_MODE_NAME);
        assert_eq!(modes.modes().len(), 1);
    }

    #[test]
    fn zero_tick_is_rejected() {
        assert!(Config::from_toml_str("tick_ms = 0").is_err());
    }
}
