//! Configuration types

use crate::{ConfigError, MemoError, MemoResult};
use serde::{Deserialize, Serialize};

/// Behavior switches for a memoizing wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    /// Label attached to log events and cache info.
    pub name: Option<String>,
    /// Surface store refusals as errors instead of absorbing them.
    pub strict_store: bool,
    /// Count hits and misses.
    pub record_stats: bool,
    /// Build (and discard) the key when no cache is configured, so key
    /// errors surface the same way with or without caching.
    pub validate_uncached: bool,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            name: None,
            strict_store: false,
            record_stats: true,
            validate_uncached: true,
        }
    }
}

impl MemoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wrapper name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable or disable strict stores.
    pub fn with_strict_store(mut self, strict: bool) -> Self {
        self.strict_store = strict;
        self
    }

    /// Enable or disable hit/miss counting.
    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.record_stats = enabled;
        self
    }

    /// Enable or disable key validation in pass-through mode.
    pub fn with_validate_uncached(mut self, enabled: bool) -> Self {
        self.validate_uncached = enabled;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `MEMORA_NAME`: wrapper name (default: unset)
    /// - `MEMORA_STRICT_STORE`: `true`/`false` (default: false)
    /// - `MEMORA_RECORD_STATS`: `true`/`false` (default: true)
    /// - `MEMORA_VALIDATE_UNCACHED`: `true`/`false` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            name: std::env::var("MEMORA_NAME").ok().or(defaults.name),
            strict_store: std::env::var("MEMORA_STRICT_STORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.strict_store),
            record_stats: std::env::var("MEMORA_RECORD_STATS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.record_stats),
            validate_uncached: std::env::var("MEMORA_VALIDATE_UNCACHED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.validate_uncached),
        }
    }

    /// Validate the configuration.
    ///
    /// A name, when set, must contain something other than whitespace.
    pub fn validate(&self) -> MemoResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(MemoError::Config(ConfigError::InvalidValue {
                    field: "name".to_string(),
                    value: format!("{:?}", name),
                    reason: "name must not be blank".to_string(),
                }));
            }
        }
        Ok(())
    }

    /// Name used in log events.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}
