//! Engine configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Environment Variables
//!
//! - `CO_MAX_ROUTINES` - Maximum concurrent routines (arena slot cap)
//! - `CO_DEBUG` - Enable debug logging (0/1)

use costack_core::env::{env_get, env_get_bool};
use costack_core::kprint;

/// Engine configuration with builder pattern.
///
/// Use `from_env()` to start with library defaults and apply any environment
/// variable overrides, then adjust programmatically:
///
/// ```rust
/// use costack_engine::EngineConfig;
///
/// let config = EngineConfig::from_env().max_routines(256);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent routines
    pub max_routines: usize,
    /// Enable debug logging
    pub debug_logging: bool,
}

/// Library defaults
pub mod defaults {
    pub const MAX_ROUTINES: usize = 1024;
    pub const DEBUG_LOGGING: bool = false;
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl EngineConfig {
    /// Create config from library defaults with environment overrides.
    pub fn from_env() -> Self {
        Self {
            max_routines: env_get("CO_MAX_ROUTINES", defaults::MAX_ROUTINES),
            debug_logging: env_get_bool("CO_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Set the maximum number of concurrent routines.
    pub fn max_routines(mut self, n: usize) -> Self {
        self.max_routines = n;
        self
    }

    /// Enable or disable debug logging.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_routines == 0 {
            return Err("max_routines must be at least 1".into());
        }
        // u32::MAX is the RoutineId::NONE sentinel and cannot be a slot index
        if self.max_routines >= u32::MAX as usize {
            return Err("max_routines must fit in a u32 slot index".into());
        }
        Ok(())
    }

    /// Apply logging side effects (called by `Engine::new`).
    pub(crate) fn apply_logging(&self) {
        if self.debug_logging {
            kprint::set_log_level(kprint::LogLevel::Debug);
        }
    }
}
