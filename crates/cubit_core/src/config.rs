//! # World Configuration
//!
//! Loaded once at startup, before any entity exists.
//!
//! ```toml
//! initial_capacity = 4096
//! auto_register_components = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Default number of entity slots reserved up front.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Construction parameters for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of entity slots reserved at creation. The world still grows past it.
    pub initial_capacity: usize,
    /// Whether `create` and `add` register unknown component types on first use.
    ///
    /// Off by default: registration is a startup step, and a type showing up
    /// unregistered mid-frame is usually a missing plugin.
    pub auto_register_components: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            auto_register_components: false,
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the text is not valid TOML for this
    /// struct or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the file can't be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks that the configuration can actually be honored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the initial capacity exceeds the
    /// entity index range.
    pub fn validate(&self) -> EcsResult<()> {
        if self.initial_capacity > u32::MAX as usize {
            return Err(EcsError::InvalidConfig(format!(
                "initial_capacity {} exceeds u32::MAX",
                self.initial_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.initial_capacity, 1024);
        assert!(!config.auto_register_components);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WorldConfig::from_toml_str("auto_register_components = true").unwrap();
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
        assert!(config.auto_register_components);
    }

    #[test]
    fn test_invalid_toml() {
        let err = WorldConfig::from_toml_str("initial_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = WorldConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }
}
