//! Per-slot execution context.
//!
//! Each execution slot owns one [`SlotContext`]. Resources that are
//! expensive to initialize (the transcoding engine) live here, are created
//! lazily on first use, reused by every job the slot runs, and released when
//! the slot is dropped.

use std::fmt;
use std::sync::Arc;

use fileforge_core::config::VideoConfig;

use crate::video::engine::{EngineHandle, FfmpegLoader};

/// Resources scoped to one execution slot.
pub struct SlotContext {
    engine: EngineHandle,
}

impl SlotContext {
    /// Create a context around an engine handle.
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    /// Context whose engine is an `ffmpeg` process driver.
    pub fn ffmpeg(config: &VideoConfig) -> Self {
        Self::new(EngineHandle::new(Arc::new(FfmpegLoader::new(config.clone()))))
    }

    /// The lazily loaded transcoding engine.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }
}

impl fmt::Debug for SlotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotContext")
            .field("engine_loaded", &self.engine.is_loaded())
            .finish()
    }
}

/// Builds a fresh context for a new (or replacement) slot.
pub type ContextFactory = Arc<dyn Fn() -> SlotContext + Send + Sync>;

/// Factory producing `ffmpeg`-backed contexts.
pub fn ffmpeg_context_factory(config: &VideoConfig) -> ContextFactory {
    let config = config.clone();
    Arc::new(move || SlotContext::ffmpeg(&config))
}
