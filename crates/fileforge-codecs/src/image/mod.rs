//! Image adapter: decode, optionally transform on a render surface, encode.

pub mod filters;
pub mod surface;
pub mod transform;

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use fileforge_core::config::ImageConfig;
use fileforge_core::types::{Blob, Category, ImageOptions, mime_type_for, normalize_format};
use fileforge_core::{ConvertError, ConvertResult, ErrorKind, ProgressReporter};

use crate::adapter::{ConversionRequest, FormatAdapter};
use crate::blocking::run_blocking;
use crate::context::SlotContext;

pub use filters::{ColorMatrix, FilterChain, FilterOp};
pub use surface::{RenderSurface, open_surface, render};
pub use transform::TransformPlan;

/// Converts raster images between formats, with optional transforms.
#[derive(Debug, Clone, Default)]
pub struct ImageAdapter {
    config: ImageConfig,
}

impl ImageAdapter {
    /// Create the adapter.
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FormatAdapter for ImageAdapter {
    fn category(&self) -> Category {
        Category::Image
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        let format = normalize_format(&request.output_format);
        let mime = mime_type_for(&format)
            .filter(|m| m.starts_with("image/"))
            .ok_or_else(|| {
                ConvertError::unsupported_pair(&request.input_format(), &request.output_format)
            })?;

        let bytes = request.file.bytes.clone();
        let options = request.options.clone().filter(|o| !o.is_identity());
        let quality = request.quality;
        let max_dimension = self.config.max_dimension;
        let name = request.file.name.clone();
        let progress = progress.clone();

        let encoded = run_blocking(move || {
            let image = image::load_from_memory(&bytes).map_err(|e| {
                ConvertError::with_source(
                    ErrorKind::DecodeFailure,
                    format!("Failed to load image: {e}"),
                    e,
                )
            })?;

            let drawn = match options {
                Some(options) => transform_image(image, &options, &format, max_dimension)?,
                None => image,
            };
            debug!(
                file = %name,
                width = drawn.width(),
                height = drawn.height(),
                format = %format,
                "Image drawn"
            );
            progress.report(50.0);

            let encoded = encode_image(&drawn, &format, quality)?;
            progress.report(100.0);
            Ok(encoded)
        })
        .await?;

        Ok(Blob::new(encoded, mime))
    }
}

/// Run the transform pipeline for `options` on a decoded image.
pub fn transform_image(
    image: DynamicImage,
    options: &ImageOptions,
    format: &str,
    max_dimension: u32,
) -> ConvertResult<DynamicImage> {
    let plan = TransformPlan::new(image.width(), image.height(), options)?;
    plan.check_limit(max_dimension)?;

    if !plan.filters.is_empty() {
        debug!(filter = %plan.filters.css(), "Applying image filters");
    }

    let mut surface = open_surface(image, format);
    render(surface.as_mut(), &plan);
    Ok(surface.into_image())
}

/// Encode to a normalized output format. `quality` applies to JPEG and WebP.
pub fn encode_image(image: &DynamicImage, format: &str, quality: f32) -> ConvertResult<Vec<u8>> {
    if format == "webp" {
        return encode_webp(image, quality);
    }

    let mut buf = Vec::new();

    let result = match format {
        "jpeg" => {
            let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, q))
        }
        "png" => image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        "gif" | "bmp" => {
            let target = if format == "gif" {
                ImageFormat::Gif
            } else {
                ImageFormat::Bmp
            };
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut Cursor::new(&mut buf), target)
        }
        other => {
            return Err(ConvertError::unsupported(format!(
                "Image output format '{other}' is not supported"
            )));
        }
    };

    result.map_err(|e| {
        ConvertError::with_source(
            ErrorKind::EncodeFailure,
            format!("Failed to convert image: {e}"),
            e,
        )
    })?;
    Ok(buf)
}

/// Lossy WebP through libwebp; `quality` maps onto its 0-100 scale.
fn encode_webp(image: &DynamicImage, quality: f32) -> ConvertResult<Vec<u8>> {
    let rgba = image.to_rgba8();
    let q = (quality * 100.0).clamp(0.0, 100.0);
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
        .encode_simple(false, q)
        .map_err(|e| ConvertError::encode(format!("Failed to convert image: {e:?}")))?;
    Ok(encoded.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileforge_core::types::{Rotation, SourceFile};
    use image::{ImageBuffer, Rgba};
    use std::sync::{Arc, Mutex};

    use crate::video::engine::EngineHandle;
    use crate::video::engine::testing::FakeLoader;

    fn context() -> SlotContext {
        SlotContext::new(EngineHandle::new(Arc::new(FakeLoader::default())))
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 5) as u8, 128, 255])
        }));
        encode_image(&image, "png", 1.0).expect("png")
    }

    #[tokio::test]
    async fn test_every_output_format() {
        let adapter = ImageAdapter::default();
        for (format, mime) in [
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("webp", "image/webp"),
            ("gif", "image/gif"),
            ("bmp", "image/bmp"),
        ] {
            let request = ConversionRequest::new(SourceFile::new("a.png", png(8, 6)), format, 0.8);
            let blob = adapter
                .convert(&request, &context(), &ProgressReporter::silent())
                .await
                .expect("converted");
            assert_eq!(blob.mime_type, mime, "{format}");
            assert!(!blob.is_empty());
            let decoded = image::load_from_memory(&blob.bytes).expect("decodes");
            assert_eq!((decoded.width(), decoded.height()), (8, 6));
        }
    }

    #[tokio::test]
    async fn test_progress_50_then_100() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = ProgressReporter::new(Arc::new(move |p| {
            sink.lock().expect("lock").push(p);
        }));
        let request = ConversionRequest::new(SourceFile::new("a.png", png(4, 4)), "bmp", 0.8);
        ImageAdapter::default()
            .convert(&request, &context(), &progress)
            .await
            .expect("converted");
        assert_eq!(*seen.lock().expect("lock"), vec![50.0, 100.0]);
    }

    #[tokio::test]
    async fn test_rotated_output_dimensions() {
        let request = ConversionRequest::new(SourceFile::new("a.png", png(10, 4)), "png", 0.8)
            .with_options(Some(ImageOptions {
                rotate: Rotation::Deg90,
                ..Default::default()
            }));
        let blob = ImageAdapter::default()
            .convert(&request, &context(), &ProgressReporter::silent())
            .await
            .expect("converted");
        let decoded = image::load_from_memory(&blob.bytes).expect("decodes");
        assert_eq!((decoded.width(), decoded.height()), (4, 10));
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let adapter = ImageAdapter::default();
        let request = ConversionRequest::new(SourceFile::new("a.png", png(9, 9)), "jpeg", 0.7);
        let a = adapter
            .convert(&request, &context(), &ProgressReporter::silent())
            .await
            .expect("a");
        let b = adapter
            .convert(&request, &context(), &ProgressReporter::silent())
            .await
            .expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn test_webp_quality_changes_output() {
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_fn(64, 48, |x, y| {
            Rgba([(x * 4) as u8, (y * 5) as u8, ((x ^ y) * 3) as u8, 255])
        }));
        let low = encode_image(&image, "webp", 0.2).expect("low");
        let high = encode_image(&image, "webp", 0.95).expect("high");
        assert_ne!(low, high);
        for bytes in [&low, &high] {
            let decoded = image::load_from_memory(bytes).expect("decodes");
            assert_eq!((decoded.width(), decoded.height()), (64, 48));
        }
    }

    #[tokio::test]
    async fn test_corrupt_input_is_decode_failure() {
        let request = ConversionRequest::new(SourceFile::new("a.png", &b"nope"[..]), "png", 0.8);
        let err = ImageAdapter::default()
            .convert(&request, &context(), &ProgressReporter::silent())
            .await
            .expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[tokio::test]
    async fn test_dimension_limit() {
        let adapter = ImageAdapter::new(ImageConfig {
            max_dimension: 16,
            ..Default::default()
        });
        let request = ConversionRequest::new(SourceFile::new("a.png", png(8, 8)), "png", 0.8)
            .with_options(Some(ImageOptions {
                resize: Some(fileforge_core::types::ResizeOptions {
                    percentage: Some(400.0),
                    ..Default::default()
                }),
                ..Default::default()
            }));
        let err = adapter
            .convert(&request, &context(), &ProgressReporter::silent())
            .await
            .expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::EncodeFailure);
    }
}
