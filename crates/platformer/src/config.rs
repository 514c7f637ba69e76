use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use engine::MovementParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::climbing::ClimbTuning;
use crate::level::{LevelError, LevelLayout};
use crate::session::NetSessionConfig;

pub const CONFIG_ENV_VAR: &str = "PLATFORMER_CONFIG";

/// Gameplay tuning loaded from a JSON file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformerConfig {
    pub movement: MovementParams,
    pub climb: ClimbTuning,
    pub level: LevelLayout,
    pub network: NetSessionConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config '{path}' at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },
    #[error("invalid level in config")]
    Level(#[from] LevelError),
}

impl PlatformerConfig {
    /// Loads the file named by `PLATFORMER_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(path, &raw)?;
        info!(path = %path.display(), "config_loaded");
        Ok(config)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: PlatformerConfig = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|error| ConfigError::Parse {
                path: path.to_path_buf(),
                field: error.path().to_string(),
                source: error.into_inner(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let climb = &self.climb;
        for (field, value) in [
            ("climb.max_climb_speed", climb.max_climb_speed),
            ("climb.climb_braking_deceleration", climb.climb_braking_deceleration),
            ("climb.climb_cooldown_seconds", climb.climb_cooldown_seconds),
            ("movement.max_walk_speed", self.movement.max_walk_speed),
            ("movement.max_acceleration", self.movement.max_acceleration),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        self.level.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::climbing::ClimbEntryVelocity;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let file = write_config(
            r#"{ "climb": { "max_climb_speed": 90.0, "entry_velocity": "preserve" } }"#,
        );
        let config = PlatformerConfig::load(file.path()).expect("config");
        assert_eq!(config.climb.max_climb_speed, 90.0);
        assert_eq!(config.climb.entry_velocity, ClimbEntryVelocity::Preserve);
        assert_eq!(config.climb.climb_cooldown_seconds, 0.5);
        assert_eq!(config.movement, MovementParams::default());
    }

    #[test]
    fn parse_error_reports_field_path() {
        let file = write_config(r#"{ "movement": { "max_walk_speed": "fast" } }"#);
        let error = PlatformerConfig::load(file.path()).expect_err("bad type");
        let message = error.to_string();
        assert!(message.contains("movement.max_walk_speed"), "{message}");
    }

    #[test]
    fn negative_cooldown_is_rejected() {
        let file = write_config(r#"{ "climb": { "climb_cooldown_seconds": -1.0 } }"#);
        let error = PlatformerConfig::load(file.path()).expect_err("negative");
        assert!(matches!(
            error,
            ConfigError::InvalidValue {
                field: "climb.climb_cooldown_seconds",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let error = PlatformerConfig::load(&dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/platformer.json");
        let config = PlatformerConfig::load(&path).expect("shipped config");
        assert_eq!(config, PlatformerConfig::default());
    }
}
