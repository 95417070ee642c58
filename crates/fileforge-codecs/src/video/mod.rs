//! Video adapter: stages the file in the slot's transcoding engine and runs
//! a single transcode with tier-derived codec arguments.

pub mod engine;
pub mod quality;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use fileforge_core::types::{Blob, Category, mime_type_for, normalize_format};
use fileforge_core::{ConvertError, ConvertResult, ProgressReporter};

use crate::adapter::{ConversionRequest, FormatAdapter};
use crate::context::SlotContext;

pub use engine::{EngineHandle, EngineLoader, FfmpegEngine, FfmpegLoader, TranscodeEngine};
pub use quality::{QualityTier, codec_args};

/// Converts between video containers through the slot's engine.
#[derive(Debug, Default)]
pub struct VideoAdapter;

impl VideoAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }

    async fn transcode(
        engine: &dyn TranscodeEngine,
        request: &ConversionRequest,
        input_name: &str,
        output_name: &str,
        codec: Vec<String>,
        progress: &ProgressReporter,
    ) -> ConvertResult<bytes::Bytes> {
        engine
            .write_file(input_name, request.file.bytes.clone())
            .await?;

        let mut args = vec!["-i".to_string(), input_name.to_string()];
        args.extend(codec);
        args.push(output_name.to_string());

        let code = engine.exec(&args, progress).await?;
        if code != 0 {
            return Err(ConvertError::encode(format!(
                "FFmpeg execution failed with exit code {code}"
            )));
        }

        engine.read_file(output_name).await
    }
}

#[async_trait]
impl FormatAdapter for VideoAdapter {
    fn category(&self) -> Category {
        Category::Video
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        let format = normalize_format(&request.output_format);
        let tier = QualityTier::from_quality(request.quality);
        let codec = codec_args(&format, tier)?;
        let mime = mime_type_for(&format).unwrap_or("video/mp4");

        let engine: Arc<dyn TranscodeEngine> = context.engine().get().await?;

        let input_name = staged_input_name(request);
        let output_name = format!("output.{format}");
        debug!(
            file = %request.file.name,
            %tier,
            input = %input_name,
            output = %output_name,
            "Transcoding video"
        );

        let result = Self::transcode(
            engine.as_ref(),
            request,
            &input_name,
            &output_name,
            codec,
            progress,
        )
        .await;

        release_staged(engine.as_ref(), &[&input_name, &output_name]).await;

        let data = result?;
        Ok(Blob::new(data, mime))
    }
}

/// `input.<ext>` with the extension reduced to ASCII alphanumerics.
fn staged_input_name(request: &ConversionRequest) -> String {
    let ext: String = request
        .file
        .extension()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if ext.is_empty() {
        "input".to_string()
    } else {
        format!("input.{ext}")
    }
}

/// Delete staged files, logging failures without masking the job's outcome.
async fn release_staged(engine: &dyn TranscodeEngine, names: &[&str]) {
    for name in names {
        if let Err(e) = engine.delete_file(name).await {
            warn!("Failed to delete staged file '{}': {}", name, e);
        }
    }
}
