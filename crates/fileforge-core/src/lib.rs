//! # fileforge-core
//!
//! Core crate for FileForge. Contains configuration schemas, the job and
//! file data model, the output-format table, progress reporting, and the
//! unified error system shared by the codec and worker crates.
//!
//! This crate has **no** internal dependencies on other FileForge crates.

pub mod config;
pub mod error;
pub mod progress;
pub mod result;
pub mod types;

pub use error::{ConvertError, ErrorKind};
pub use progress::{ProgressFn, ProgressReporter};
pub use result::ConvertResult;
