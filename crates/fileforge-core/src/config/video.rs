//! Video transcoding engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for the lazily loaded transcoding engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Path or command name of the `ffmpeg` executable.
    pub ffmpeg_path: PathBuf,
    /// Root directory for per-slot scratch filesystems.
    pub scratch_root: Option<PathBuf>,
    /// Forward engine log lines to `tracing` at debug level.
    pub log_engine_output: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            scratch_root: None,
            log_engine_output: true,
        }
    }
}

impl VideoConfig {
    /// Resolve the effective scratch root directory.
    pub fn effective_scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("fileforge"))
    }
}
