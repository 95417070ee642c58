//! Archive adapter: read every entry of a zip and repack it with DEFLATE
//! level 6.
//!
//! Both `zip` and `extract` outputs produce a repacked zip; they differ only
//! in how progress is split between the two phases.

use std::io::{Cursor, Read, Write};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use fileforge_core::types::{Blob, Category, normalize_format};
use fileforge_core::{ConvertError, ConvertResult, ErrorKind, ProgressReporter};

use crate::adapter::{ConversionRequest, FormatAdapter};
use crate::blocking::run_blocking;
use crate::context::SlotContext;

/// Maximum entries accepted in one archive.
const MAX_ENTRIES: usize = 10_000;
/// Maximum total uncompressed size (2 GiB).
const MAX_EXTRACTED_SIZE: u64 = 2 * 1024 * 1024 * 1024;
/// Compression level used when repacking.
const DEFLATE_LEVEL: i64 = 6;

/// One decompressed file from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Path inside the archive.
    pub name: String,
    /// Decompressed contents.
    pub data: Bytes,
    /// Modification time recorded in the archive.
    pub last_modified: Option<DateTime>,
    /// Unix permission bits, if recorded.
    pub unix_mode: Option<u32>,
}

impl ExtractedEntry {
    /// Create an entry with no metadata.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            last_modified: None,
            unix_mode: None,
        }
    }

    /// Decompressed size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

fn zip_error(kind: ErrorKind, context: &str, err: zip::result::ZipError) -> ConvertError {
    ConvertError::with_source(kind, format!("{context}: {err}"), err)
}

fn too_large(limit: u64) -> ConvertError {
    ConvertError::decode(format!("Archive expands beyond the {limit} byte limit"))
}

/// Decompress every non-directory entry.
///
/// Progress: 10 on open, 30 after the central directory is read, then
/// `30 + 60 * processed / total` per file, 100 at the end.
pub fn extract_entries(
    bytes: Bytes,
    progress: &ProgressReporter,
) -> ConvertResult<Vec<ExtractedEntry>> {
    extract_within(bytes, MAX_EXTRACTED_SIZE, progress)
}

/// Decompress with `limit` bounding the bytes actually read, whatever sizes
/// the entry headers claim.
fn extract_within(
    bytes: Bytes,
    limit: u64,
    progress: &ProgressReporter,
) -> ConvertResult<Vec<ExtractedEntry>> {
    progress.report(10.0);

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| zip_error(ErrorKind::DecodeFailure, "Failed to open archive", e))?;

    let total = archive.len();
    if total > MAX_ENTRIES {
        return Err(ConvertError::decode(format!(
            "Archive contains {total} entries, the limit is {MAX_ENTRIES}"
        )));
    }
    progress.report(30.0);

    let mut entries = Vec::new();
    let mut extracted_size = 0u64;

    for index in 0..total {
        let mut file = archive
            .by_index(index)
            .map_err(|e| zip_error(ErrorKind::DecodeFailure, "Failed to read archive entry", e))?;

        if file.is_dir() {
            continue;
        }
        if file.enclosed_name().is_none() {
            warn!("Skipping archive entry with unsafe path '{}'", file.name());
            continue;
        }

        let remaining = limit.saturating_sub(extracted_size);
        if file.size() > remaining {
            return Err(too_large(limit));
        }

        let name = file.name().to_string();
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        let read = (&mut file)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| {
                ConvertError::with_source(
                    ErrorKind::DecodeFailure,
                    format!("Failed to decompress '{name}': {e}"),
                    e,
                )
            })?;
        if read as u64 > remaining {
            return Err(too_large(limit));
        }
        extracted_size += read as u64;

        entries.push(ExtractedEntry {
            name,
            data: Bytes::from(data),
            last_modified: file.last_modified(),
            unix_mode: file.unix_mode(),
        });
        progress.report(30.0 + 60.0 * (index + 1) as f64 / total as f64);
    }

    progress.finish();
    Ok(entries)
}

/// Pack entries into a new zip with DEFLATE level 6.
///
/// Progress: 10 on start, `10 + 70 * (i + 1) / n` per entry, 80 before the
/// archive is finalized, 100 after.
pub fn create_archive(
    entries: &[ExtractedEntry],
    progress: &ProgressReporter,
) -> ConvertResult<Vec<u8>> {
    progress.report(10.0);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let total = entries.len();

    for (index, entry) in entries.iter().enumerate() {
        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(DEFLATE_LEVEL))
            .last_modified_time(entry.last_modified.unwrap_or_default());
        if let Some(mode) = entry.unix_mode {
            options = options.unix_permissions(mode);
        }

        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| zip_error(ErrorKind::EncodeFailure, "Failed to add archive entry", e))?;
        writer.write_all(&entry.data)?;

        progress.report(10.0 + 70.0 * (index + 1) as f64 / total as f64);
    }

    progress.report(80.0);
    let cursor = writer
        .finish()
        .map_err(|e| zip_error(ErrorKind::EncodeFailure, "Failed to finalize archive", e))?;
    progress.finish();

    Ok(cursor.into_inner())
}

/// Repacks zip archives.
#[derive(Debug, Default)]
pub struct ArchiveAdapter;

impl ArchiveAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormatAdapter for ArchiveAdapter {
    fn category(&self) -> Category {
        Category::Archive
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        let input = request.file.extension().unwrap_or_default();
        let output = normalize_format(&request.output_format);

        // Shares of the total given to the extract and repack phases.
        let (extract_share, pack_share) = match (input.as_str(), output.as_str()) {
            ("zip", "extract") => (0.8, 0.2),
            ("zip", "zip") => (0.5, 0.5),
            _ => {
                return Err(ConvertError::unsupported_pair(
                    &input,
                    &request.output_format,
                ));
            }
        };

        let bytes = request.file.bytes.clone();
        let extract_progress = progress.scaled(0.0, extract_share);
        let pack_progress = progress.scaled(extract_share * 100.0, pack_share);
        let name = request.file.name.clone();

        let repacked = run_blocking(move || {
            let entries = extract_entries(bytes, &extract_progress)?;
            debug!(archive = %name, entries = entries.len(), "Archive extracted");
            create_archive(&entries, &pack_progress)
        })
        .await?;

        Ok(Blob::new(repacked, "application/zip"))
    }
}
