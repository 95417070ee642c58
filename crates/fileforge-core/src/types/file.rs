//! Binary payloads flowing into and out of the engine.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A file handed to the engine by its caller.
///
/// The bytes are reference-counted, so moving a `SourceFile` into a job and
/// across to a slot never copies the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Original file name, including extension.
    pub name: String,
    /// MIME type reported by the caller, if any.
    pub mime_type: Option<String>,
    /// File contents.
    #[serde(skip)]
    pub bytes: Bytes,
}

impl SourceFile {
    /// Create a source file from a name and its contents.
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes: bytes.into(),
        }
    }

    /// Attach the caller-reported MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// A converted output: bytes plus the MIME type they are encoded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Encoded output bytes.
    pub bytes: Bytes,
    /// MIME type of `bytes`.
    pub mime_type: String,
}

impl Blob {
    /// Create a blob.
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
