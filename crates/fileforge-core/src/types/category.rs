//! Conversion categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// The family of codecs a job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Raster images.
    Image,
    /// Compressed or uncompressed audio.
    Audio,
    /// Video containers.
    Video,
    /// Text, HTML and PDF documents.
    Document,
    /// Zip archives.
    Archive,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 5] = [
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::Document,
        Self::Archive,
    ];

    /// Lowercase name used in job payloads and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Archive => "archive",
        }
    }

    /// Output formats a caller may request for this category.
    pub fn output_formats(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["png", "jpeg", "jpg", "webp", "gif", "bmp"],
            Self::Video => &["mp4", "webm", "avi"],
            Self::Audio => &["wav"],
            Self::Document => &["txt", "pdf", "html"],
            Self::Archive => &["zip", "extract"],
        }
    }

    /// Whether `format` is in this category's output table.
    pub fn supports_output(&self, format: &str) -> bool {
        let format = format.to_ascii_lowercase();
        self.output_formats().iter().any(|f| *f == format)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "document" => Ok(Self::Document),
            "archive" => Ok(Self::Archive),
            other => Err(ConvertError::unsupported(format!(
                "Conversion not supported for {other}"
            ))),
        }
    }
}
