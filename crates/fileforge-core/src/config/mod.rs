//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! `config/default.toml`, an optional environment overlay, and
//! `FILEFORGE__*` environment variables. Every section has defaults, so an
//! empty configuration is valid.

pub mod image;
pub mod logging;
pub mod pool;
pub mod video;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::image::ImageConfig;
pub use self::logging::LoggingConfig;
pub use self::pool::PoolConfig;
pub use self::video::VideoConfig;

use crate::error::ConvertError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    /// Worker pool settings.
    #[validate(nested)]
    pub pool: PoolConfig,
    /// Image adapter settings.
    #[validate(nested)]
    pub image: ImageConfig,
    /// Video adapter / transcoding engine settings.
    pub video: VideoConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for the given environment name.
    ///
    /// Merges `config/default`, `config/{env}` and environment variables
    /// prefixed with `FILEFORGE`, then validates the result.
    pub fn load(env: &str) -> Result<Self, ConvertError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILEFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConvertError::configuration(format!("Failed to build config: {e}")))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| ConvertError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.validate()?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").expect("deserialize");
        assert!(config.pool.max_workers.is_none());
        assert_eq!(config.image.default_quality, 92);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_quality_rejected() {
        let config: AppConfig =
            serde_json::from_str(r#"{"image": {"default_quality": 0}}"#).expect("deserialize");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_workers_rejected() {
        let config: AppConfig =
            serde_json::from_str(r#"{"pool": {"max_workers": 500}}"#).expect("deserialize");
        let err = ConvertError::from(config.validate().expect_err("invalid"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
