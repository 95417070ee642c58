//! Conversion jobs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::category::Category;
use crate::types::file::SourceFile;
use crate::types::options::ImageOptions;

/// Unique identifier for one submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One unit of work: convert one file under one set of parameters.
///
/// A job is immutable once built. The scheduler owns it while queued and
/// moves it to exactly one slot for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique per submission.
    pub id: JobId,
    /// The file to convert.
    pub file: SourceFile,
    /// Requested output format (e.g. `"png"`, `"mp4"`, `"extract"`).
    pub output_format: String,
    /// Quality in `0.0..=1.0`.
    pub quality: f32,
    /// Category the job is routed by.
    pub category: Category,
    /// Optional image transform parameters.
    pub options: Option<ImageOptions>,
}

impl Job {
    /// Build a job with a fresh identifier.
    pub fn new(
        file: SourceFile,
        category: Category,
        output_format: impl Into<String>,
        quality: f32,
    ) -> Self {
        Self {
            id: JobId::new(),
            file,
            output_format: output_format.into(),
            quality: quality.clamp(0.0, 1.0),
            category,
            options: None,
        }
    }

    /// Attach image transform options.
    pub fn with_options(mut self, options: Option<ImageOptions>) -> Self {
        self.options = options;
        self
    }
}

/// Convert a caller-facing 1-100 quality into the `0.0..=1.0` job scale.
pub fn quality_from_percent(percent: u8) -> f32 {
    f32::from(percent.clamp(1, 100)) / 100.0
}
