//! Image adapter configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Image conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ImageConfig {
    /// Quality (1-100) used when a caller does not provide one.
    #[validate(range(min = 1, max = 100))]
    pub default_quality: u8,
    /// Largest width or height the transform surface will allocate.
    #[validate(range(min = 1))]
    pub max_dimension: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            default_quality: 92,
            max_dimension: 16_384,
        }
    }
}
