//! The category → adapter contract.

use async_trait::async_trait;

use fileforge_core::types::{Blob, Category, ImageOptions, Job, SourceFile};
use fileforge_core::{ConvertResult, ProgressReporter};

use crate::context::SlotContext;

/// Everything an adapter needs to convert one file.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// The source file.
    pub file: SourceFile,
    /// Requested output format.
    pub output_format: String,
    /// Quality in `0.0..=1.0`.
    pub quality: f32,
    /// Image transform options, if any.
    pub options: Option<ImageOptions>,
}

impl ConversionRequest {
    /// Build a request for a file.
    pub fn new(file: SourceFile, output_format: impl Into<String>, quality: f32) -> Self {
        Self {
            file,
            output_format: output_format.into(),
            quality: quality.clamp(0.0, 1.0),
            options: None,
        }
    }

    /// Attach image transform options.
    pub fn with_options(mut self, options: Option<ImageOptions>) -> Self {
        self.options = options;
        self
    }

    /// Lowercased source extension, or `"unknown"`.
    pub fn input_format(&self) -> String {
        self.file.extension().unwrap_or_else(|| "unknown".to_string())
    }
}

impl From<&Job> for ConversionRequest {
    fn from(job: &Job) -> Self {
        Self {
            file: job.file.clone(),
            output_format: job.output_format.clone(),
            quality: job.quality,
            options: job.options.clone(),
        }
    }
}

/// A single-file conversion routine for one category.
///
/// Implementations report progress on a `0..=100` scale through `progress`
/// and fail with `UnsupportedConversion` for input/output pairs they do not
/// handle, before doing any work.
#[async_trait]
pub trait FormatAdapter: Send + Sync + std::fmt::Debug {
    /// The category this adapter serves.
    fn category(&self) -> Category;

    /// Convert `request.file` into `request.output_format`.
    async fn convert(
        &self,
        request: &ConversionRequest,
        context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob>;
}
