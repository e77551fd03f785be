//! # Engine Configuration
//!
//! Loaded once at startup, from code or from a TOML file:
//!
//! ```toml
//! visibility_radius = 48.0
//! scheduler_period_ms = 1000
//! scheduler_initial_delay_ms = 500
//! respawn_delay_ms = 100
//! protocol_version = 340
//! fragment_id_base = 1000000
//! ```
//!
//! Missing keys fall back to the defaults in `placard_shared::constants`.

use std::path::Path;
use std::time::Duration;

use placard_shared::constants::{
    DEFAULT_FRAGMENT_ID_BASE, DEFAULT_PROTOCOL_VERSION, RESPAWN_DELAY_MS,
    SCHEDULER_INITIAL_DELAY_MS, SCHEDULER_PERIOD_MS, VISIBILITY_RADIUS,
};
use placard_shared::ProtocolVersion;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum spawn distance between a client and a board anchor.
    pub visibility_radius: f32,
    /// Period of the visibility scheduler.
    pub scheduler_period_ms: u64,
    /// Delay before the first scheduler pass.
    pub scheduler_initial_delay_ms: u64,
    /// Delay between a respawn and the forced destroy.
    pub respawn_delay_ms: u64,
    /// Protocol version used to decode interact frames.
    pub protocol_version: u32,
    /// First fragment id handed out.
    pub fragment_id_base: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            visibility_radius: VISIBILITY_RADIUS,
            scheduler_period_ms: SCHEDULER_PERIOD_MS,
            scheduler_initial_delay_ms: SCHEDULER_INITIAL_DELAY_MS,
            respawn_delay_ms: RESPAWN_DELAY_MS,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            fragment_id_base: DEFAULT_FRAGMENT_ID_BASE,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.visibility_radius.is_finite() || self.visibility_radius <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "visibility_radius must be positive and finite, got {}",
                self.visibility_radius
            )));
        }
        if self.scheduler_period_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "scheduler_period_ms must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Scheduler period.
    #[must_use]
    pub const fn scheduler_period(&self) -> Duration {
        Duration::from_millis(self.scheduler_period_ms)
    }

    /// Delay before the first scheduler pass.
    #[must_use]
    pub const fn scheduler_initial_delay(&self) -> Duration {
        Duration::from_millis(self.scheduler_initial_delay_ms)
    }

    /// Delay before a respawned client is destroyed everywhere.
    #[must_use]
    pub const fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms)
    }

    /// Protocol version for the interact decoder.
    #[must_use]
    pub const fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion(self.protocol_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler_period(), Duration::from_secs(1));
        assert_eq!(config.protocol_version(), ProtocolVersion::V1_12_2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("visibility_radius = 32.0\nrespawn_delay_ms = 250\n")
            .unwrap();
        assert!((config.visibility_radius - 32.0).abs() < f32::EPSILON);
        assert_eq!(config.respawn_delay(), Duration::from_millis(250));
        assert_eq!(config.scheduler_period_ms, SCHEDULER_PERIOD_MS);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("visibility_radius = -1.0"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("scheduler_period_ms = 0"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("radius = 5.0"),
            Err(EngineError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("placard_missing_config_does_not_exist.toml");
        assert!(matches!(
            EngineConfig::load(&path),
            Err(EngineError::ConfigIo { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("placard_config_{id}.toml"));
        std::fs::write(&path, "scheduler_period_ms = 250\nprotocol_version = 338\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.scheduler_period(), Duration::from_millis(250));
        assert_eq!(config.protocol_version(), ProtocolVersion::V1_12_1);

        std::fs::remove_file(&path).ok();
    }
}
