//! # fileforge-codecs
//!
//! Per-category conversion adapters (image, audio, video, document,
//! archive) and the [`Dispatcher`] that routes a request to the right one.
//!
//! Adapters treat the underlying codec libraries as capability providers:
//! bytes and parameters in, bytes out. CPU-heavy work runs on the blocking
//! thread pool via [`blocking::run_blocking`]; the video adapter drives an
//! external transcoding engine owned by the slot's [`SlotContext`].

pub mod adapter;
pub mod archive;
pub mod audio;
pub mod blocking;
pub mod context;
pub mod dispatcher;
pub mod document;
pub mod image;
pub mod video;

pub use adapter::{ConversionRequest, FormatAdapter};
pub use context::{ContextFactory, SlotContext, ffmpeg_context_factory};
pub use dispatcher::Dispatcher;
