//! Engine configuration: presets, TOML loading and environment overrides.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

const ENV_MAX_NESTING_DEPTH: &str = "WEFT_MAX_NESTING_DEPTH";
const ENV_OBSERVED_STATE_LIMIT: &str = "WEFT_OBSERVED_STATE_LIMIT";
const ENV_MAX_STORED_BULK: &str = "WEFT_MAX_STORED_BULK";

/// Execution settings applied to a root traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum depth of nested child traversals.
    pub max_nesting_depth: usize,
    /// Maximum number of characters of traverser state quoted in errors.
    pub observed_state_limit: usize,
    /// Largest bulk a single traverser may expand into when stored.
    pub max_stored_bulk: u64,
    /// Emit per-traverser trace events during execution.
    pub profile: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            observed_state_limit: 256,
            max_stored_bulk: 1 << 20,
            profile: false,
        }
    }
}

impl EngineConfig {
    /// Shallow nesting and short diagnostics for untrusted traversals.
    pub fn strict() -> Self {
        Self {
            max_nesting_depth: 16,
            observed_state_limit: 128,
            max_stored_bulk: 1 << 16,
            profile: false,
        }
    }

    /// Long diagnostics and per-traverser trace events.
    pub fn diagnostic() -> Self {
        Self {
            max_nesting_depth: 64,
            observed_state_limit: 4096,
            max_stored_bulk: 1 << 20,
            profile: true,
        }
    }

    /// Parses a TOML document; missing keys fall back to [`EngineConfig::default`].
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|err| WeftError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WEFT_*` environment overrides on top of `self`.
    pub fn from_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_MAX_NESTING_DEPTH) {
            self.max_nesting_depth = parse_usize(ENV_MAX_NESTING_DEPTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OBSERVED_STATE_LIMIT) {
            self.observed_state_limit = parse_usize(ENV_OBSERVED_STATE_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_STORED_BULK) {
            self.max_stored_bulk = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| WeftError::Config(format!("{ENV_MAX_STORED_BULK}='{raw}': {err}")))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(WeftError::Config(
                "max_nesting_depth must be at least 1".into(),
            ));
        }
        if self.max_stored_bulk == 0 {
            return Err(WeftError::Config("max_stored_bulk must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|err| WeftError::Config(format!("{key}='{raw}': {err}")))
}
