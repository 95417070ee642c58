//! Quality tiers and per-container codec arguments.

use std::fmt;

use fileforge_core::{ConvertError, ConvertResult};

/// Coarse encoder quality level derived from the job's `0..=1` quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// `q >= 0.8` is high, `q >= 0.5` is medium, anything else low.
    pub fn from_quality(quality: f32) -> Self {
        if quality >= 0.8 {
            Self::High
        } else if quality >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Constant rate factor for x264 / vp9.
    pub fn crf(&self) -> u8 {
        match self {
            Self::High => 18,
            Self::Medium => 23,
            Self::Low => 28,
        }
    }

    /// x264 speed preset.
    pub fn preset(&self) -> &'static str {
        match self {
            Self::High => "slow",
            Self::Medium => "medium",
            Self::Low => "fast",
        }
    }

    /// mpeg4 fixed quantizer.
    pub fn qscale(&self) -> u8 {
        match self {
            Self::High => 2,
            Self::Medium => 5,
            Self::Low => 8,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Encoder arguments for an output container.
pub fn codec_args(format: &str, tier: QualityTier) -> ConvertResult<Vec<String>> {
    let crf = tier.crf().to_string();
    let args: Vec<String> = match format {
        "mp4" => vec![
            "-c:v", "libx264", "-crf", crf.as_str(), "-preset", tier.preset(), "-c:a", "aac",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        "webm" => vec![
            "-c:v", "libvpx-vp9", "-crf", crf.as_str(), "-b:v", "0", "-c:a", "libopus",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        "avi" => vec![
            "-c:v".to_string(),
            "mpeg4".to_string(),
            "-q:v".to_string(),
            tier.qscale().to_string(),
        ],
        other => {
            return Err(ConvertError::unsupported(format!(
                "Video output format '{other}' is not supported"
            )));
        }
    };
    Ok(args)
}
