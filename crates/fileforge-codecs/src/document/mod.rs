//! Document adapter: PDF, plain text and HTML.
//!
//! Supported pairs:
//!
//! | from | to |
//! |---|---|
//! | pdf | txt, html |
//! | txt | pdf, html |
//! | html, htm | pdf, txt |

pub mod html;
pub mod pdf;

use async_trait::async_trait;
use bytes::Bytes;

use fileforge_core::types::{Blob, Category, normalize_format};
use fileforge_core::{ConvertError, ConvertResult, ProgressReporter};

use crate::adapter::{ConversionRequest, FormatAdapter};
use crate::blocking::run_blocking;
use crate::context::SlotContext;

use self::html::{PagedHtml, body_text, text_page};
use self::pdf::{PageLayout, PdfText, write_pdf};

/// One supported document conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    PdfToText,
    PdfToHtml,
    TextToPdf,
    HtmlToPdf,
    TextToHtml,
    HtmlToText,
}

impl Route {
    fn resolve(input: &str, output: &str) -> Option<Self> {
        let route = match (normalize_format(input).as_str(), normalize_format(output).as_str()) {
            ("pdf", "txt") => Self::PdfToText,
            ("pdf", "html") => Self::PdfToHtml,
            ("txt", "pdf") => Self::TextToPdf,
            ("html", "pdf") => Self::HtmlToPdf,
            ("txt", "html") => Self::TextToHtml,
            ("html", "txt") => Self::HtmlToText,
            _ => return None,
        };
        Some(route)
    }

    fn mime_type(&self) -> &'static str {
        match self {
            Self::PdfToText | Self::HtmlToText => "text/plain",
            Self::PdfToHtml | Self::TextToHtml => "text/html",
            Self::TextToPdf | Self::HtmlToPdf => "application/pdf",
        }
    }
}

/// Converts between PDF, text and HTML documents.
#[derive(Debug, Default)]
pub struct DocumentAdapter;

impl DocumentAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormatAdapter for DocumentAdapter {
    fn category(&self) -> Category {
        Category::Document
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        let input = request.file.extension().unwrap_or_default();
        let route = Route::resolve(&input, &request.output_format).ok_or_else(|| {
            ConvertError::unsupported_pair(&input, &request.output_format)
        })?;

        progress.report(10.0);

        let bytes = request.file.bytes.clone();
        let progress = progress.clone();
        let output = run_blocking(move || run_route(route, &bytes, &progress)).await?;

        Ok(Blob::new(output, route.mime_type()))
    }
}

fn run_route(route: Route, bytes: &Bytes, progress: &ProgressReporter) -> ConvertResult<Vec<u8>> {
    let output = match route {
        Route::PdfToText => pdf_pages(bytes, progress)?.join("\n\n").into_bytes(),
        Route::PdfToHtml => {
            let mut doc = PagedHtml::new();
            for page in pdf_pages(bytes, progress)? {
                doc.push_page(&page);
            }
            doc.finish().into_bytes()
        }
        Route::TextToPdf => text_to_pdf(&String::from_utf8_lossy(bytes), progress)?,
        Route::HtmlToPdf => {
            let source = String::from_utf8_lossy(bytes);
            progress.report(30.0);
            let text = body_text(&source)?;
            progress.report(60.0);
            text_to_pdf(&text, &progress.scaled(60.0, 0.4))?
        }
        Route::TextToHtml => {
            let text = String::from_utf8_lossy(bytes);
            progress.report(50.0);
            text_page(&text).into_bytes()
        }
        Route::HtmlToText => {
            let source = String::from_utf8_lossy(bytes);
            progress.report(50.0);
            body_text(&source)?.into_bytes()
        }
    };
    progress.finish();
    Ok(output)
}

/// Text of every page, reporting `30 + 60 * i / n` after page `i`.
fn pdf_pages(bytes: &[u8], progress: &ProgressReporter) -> ConvertResult<Vec<String>> {
    let pdf = PdfText::load(bytes)?;
    progress.report(30.0);

    let total = pdf.page_count();
    let mut pages = Vec::with_capacity(total);
    for index in 0..total {
        pages.push(pdf.page_text(index)?);
        progress.report(30.0 + 60.0 * (index + 1) as f64 / total as f64);
    }
    Ok(pages)
}

/// Lay out text on A4 pages: 30 after read, 60 after wrap, 90 after layout.
fn text_to_pdf(text: &str, progress: &ProgressReporter) -> ConvertResult<Vec<u8>> {
    progress.report(30.0);
    let layout = PageLayout::default();
    let lines = layout.wrap(text);
    progress.report(60.0);
    let pages = layout.paginate(lines);
    let pdf = write_pdf(&layout, &pages)?;
    progress.report(90.0);
    progress.finish();
    Ok(pdf)
}
