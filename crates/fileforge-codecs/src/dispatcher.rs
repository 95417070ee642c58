//! Conversion dispatcher: routes requests to registered format adapters.

use std::collections::HashMap;
use std::sync::Arc;

use fileforge_core::config::AppConfig;
use fileforge_core::types::{Blob, Category};
use fileforge_core::{ConvertError, ConvertResult, ProgressReporter};

use crate::adapter::{ConversionRequest, FormatAdapter};
use crate::archive::ArchiveAdapter;
use crate::audio::AudioAdapter;
use crate::context::SlotContext;
use crate::document::DocumentAdapter;
use crate::image::ImageAdapter;
use crate::video::VideoAdapter;

/// Dispatches conversions to the adapter registered for their category.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    /// Registered adapters by category.
    adapters: HashMap<Category, Arc<dyn FormatAdapter>>,
}

impl Dispatcher {
    /// Create a dispatcher with no adapters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher with the built-in adapter for every category.
    pub fn with_defaults(config: &AppConfig) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Arc::new(ImageAdapter::new(config.image.clone())));
        dispatcher.register(Arc::new(AudioAdapter::new()));
        dispatcher.register(Arc::new(VideoAdapter::new()));
        dispatcher.register(Arc::new(DocumentAdapter::new()));
        dispatcher.register(Arc::new(ArchiveAdapter::new()));
        dispatcher
    }

    /// Register an adapter, replacing any previous one for its category.
    pub fn register(&mut self, adapter: Arc<dyn FormatAdapter>) {
        let category = adapter.category();
        tracing::debug!("Registered format adapter for category '{}'", category);
        self.adapters.insert(category, adapter);
    }

    /// Check if an adapter is registered for a category.
    pub fn has_adapter(&self, category: Category) -> bool {
        self.adapters.contains_key(&category)
    }

    /// Convert a file, reporting progress in `0..=100`.
    ///
    /// Fails with `UnsupportedConversion` before any adapter work when the
    /// category has no adapter or the output format is not offered for it.
    /// A successful conversion always reports 100 before returning.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        category: Category,
        context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        progress.report(0.0);

        let adapter = self.adapters.get(&category).ok_or_else(|| {
            ConvertError::unsupported(format!("Conversion not supported for {category}"))
        })?;

        if !category.supports_output(&request.output_format) {
            return Err(ConvertError::unsupported_pair(
                &request.input_format(),
                &request.output_format,
            ));
        }

        tracing::debug!(
            "Dispatching conversion: file='{}', category={}, output='{}', quality={:.2}",
            request.file.name,
            category,
            request.output_format,
            request.quality
        );

        let blob = adapter.convert(request, context, progress).await?;
        progress.finish();

        tracing::debug!(
            "Conversion produced {} bytes of {} for '{}'",
            blob.len(),
            blob.mime_type,
            request.file.name
        );

        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fileforge_core::ErrorKind;
    use fileforge_core::types::SourceFile;
    use std::sync::Mutex;

    use crate::video::engine::testing::FakeLoader;
    use crate::video::engine::EngineHandle;

    #[derive(Debug)]
    struct EchoAdapter;

    #[async_trait]
    impl FormatAdapter for EchoAdapter {
        fn category(&self) -> Category {
            Category::Document
        }

        async fn convert(
            &self,
            request: &ConversionRequest,
            _context: &SlotContext,
            progress: &ProgressReporter,
        ) -> ConvertResult<Blob> {
            progress.report(50.0);
            Ok(Blob::new(request.file.bytes.clone(), "text/plain"))
        }
    }

    fn context() -> SlotContext {
        SlotContext::new(EngineHandle::new(Arc::new(FakeLoader::default())))
    }

    #[tokio::test]
    async fn test_unregistered_category_is_unsupported() {
        let dispatcher = Dispatcher::new();
        let request = ConversionRequest::new(SourceFile::new("a.txt", "hi"), "txt", 0.9);
        let err = dispatcher
            .convert(&request, Category::Document, &context(), &ProgressReporter::silent())
            .await
            .expect_err("no adapter");
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
        assert_eq!(err.to_string(), "Conversion not supported for document");
    }

    #[tokio::test]
    async fn test_format_outside_table_is_unsupported() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(EchoAdapter));
        let request = ConversionRequest::new(SourceFile::new("a.txt", "hi"), "docx", 0.9);
        let err = dispatcher
            .convert(&request, Category::Document, &context(), &ProgressReporter::silent())
            .await
            .expect_err("bad format");
        assert_eq!(err.to_string(), "Conversion from txt to docx is not supported");
    }

    #[tokio::test]
    async fn test_progress_starts_at_zero_and_ends_at_100() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(EchoAdapter));
        assert!(dispatcher.has_adapter(Category::Document));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = ProgressReporter::new(Arc::new(move |p| {
            sink.lock().expect("lock").push(p);
        }));

        let request = ConversionRequest::new(SourceFile::new("a.txt", "hi"), "txt", 0.9);
        let blob = dispatcher
            .convert(&request, Category::Document, &context(), &progress)
            .await
            .expect("converted");

        assert_eq!(&blob.bytes[..], b"hi");
        assert_eq!(*seen.lock().expect("lock"), vec![0.0, 50.0, 100.0]);
    }
}
