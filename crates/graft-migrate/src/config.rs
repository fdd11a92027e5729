//! Pass configuration

use serde::{Deserialize, Serialize};

/// Errors loading a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a configuration
    #[error("invalid migration config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("cannot render migration config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid migration config: {0}")]
    Invalid(String),
}

/// Migration pass configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Bulk-copy sequences whose element type is blittable and unchanged
    pub blit_fast_path: bool,
    /// Compare container counts against the expected running count on refill
    pub check_thread_interference: bool,
    /// Depth limit when canonicalising structurally keyed records
    pub max_key_depth: usize,
    /// Log only the first key collision of each container
    pub log_collisions_once: bool,
    /// Mirror every diagnostic to `tracing`, in addition to the host sink
    pub forward_to_tracing: bool,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the block-copy fast path
    #[inline]
    #[must_use]
    pub fn with_blit_fast_path(mut self, enabled: bool) -> Self {
        self.blit_fast_path = enabled;
        self
    }

    /// Enable or disable the container count check
    #[inline]
    #[must_use]
    pub fn with_interference_check(mut self, enabled: bool) -> Self {
        self.check_thread_interference = enabled;
        self
    }

    /// Set key canonicalisation depth
    #[inline]
    #[must_use]
    pub fn with_max_key_depth(mut self, depth: usize) -> Self {
        self.max_key_depth = depth;
        self
    }

    /// Log every collision instead of the first per container
    #[inline]
    #[must_use]
    pub fn with_collisions_logged_once(mut self, once: bool) -> Self {
        self.log_collisions_once = once;
        self
    }

    /// Enable or disable mirroring diagnostics to `tracing`
    #[inline]
    #[must_use]
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.forward_to_tracing = enabled;
        self
    }

    /// Parse from TOML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or out-of-range values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Render`] if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when `max_key_depth` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_key_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_key_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            blit_fast_path: true,
            check_thread_interference: true,
            max_key_depth: graft_heap::DEFAULT_KEY_DEPTH,
            log_collisions_once: true,
            forward_to_tracing: true,
        }
    }
}
