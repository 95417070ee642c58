//! Core type definitions used across the FileForge workspace.

pub mod category;
pub mod file;
pub mod format;
pub mod job;
pub mod options;
pub mod progress;

pub use category::Category;
pub use file::{Blob, SourceFile};
pub use format::{extension_for, mime_type_for, normalize_format};
pub use job::{Job, JobId, quality_from_percent};
pub use options::{
    CropRect, FilterOptions, FlipOptions, ImageOptions, ResizeOptions, Rotation,
};
pub use progress::{FileStatus, ProgressState};
