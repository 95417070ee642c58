//! Image transform options.

use serde::{Deserialize, Serialize};

/// Transform parameters applied by the image adapter before encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Output size.
    pub resize: Option<ResizeOptions>,
    /// Source rectangle to draw from.
    pub crop: Option<CropRect>,
    /// Clockwise rotation.
    pub rotate: Rotation,
    /// Mirror axes.
    pub flip: FlipOptions,
    /// Colour and blur filters.
    pub filters: Option<FilterOptions>,
}

impl ImageOptions {
    /// True when applying these options would leave the image untouched.
    pub fn is_identity(&self) -> bool {
        self.resize.is_none()
            && self.crop.is_none()
            && self.rotate == Rotation::None
            && !self.flip.any()
            && self.filters.as_ref().is_none_or(FilterOptions::is_empty)
    }
}

/// Target size, as a percentage or explicit dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeOptions {
    /// Target width in pixels.
    pub width: Option<u32>,
    /// Target height in pixels.
    pub height: Option<u32>,
    /// Uniform scale in percent; takes precedence over width/height.
    pub percentage: Option<f32>,
    /// Derive a missing axis from the source aspect ratio.
    pub maintain_ratio: bool,
}

/// A source rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width of the rectangle.
    pub width: u32,
    /// Height of the rectangle.
    pub height: u32,
}

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    /// No rotation.
    #[default]
    None,
    /// 90 degrees.
    Deg90,
    /// 180 degrees.
    Deg180,
    /// 270 degrees.
    Deg270,
}

impl Rotation {
    /// Whether the rotation exchanges width and height.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// The rotation in degrees.
    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> u16 {
        rotation.degrees()
    }
}

/// Mirror axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipOptions {
    /// Mirror left-to-right.
    pub horizontal: bool,
    /// Mirror top-to-bottom.
    pub vertical: bool,
}

impl FlipOptions {
    /// Whether any axis is mirrored.
    pub fn any(&self) -> bool {
        self.horizontal || self.vertical
    }
}

/// Filter stack. Brightness, contrast and saturation are offsets in percent
/// from 100% (so `-20` means 80%); blur is a radius in pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Full grayscale.
    pub grayscale: bool,
    /// Full sepia.
    pub sepia: bool,
    /// Brightness offset in percent.
    pub brightness: Option<f32>,
    /// Contrast offset in percent.
    pub contrast: Option<f32>,
    /// Saturation offset in percent.
    pub saturation: Option<f32>,
    /// Blur radius in pixels.
    pub blur: Option<f32>,
}

impl FilterOptions {
    /// True when no filter is requested.
    pub fn is_empty(&self) -> bool {
        !self.grayscale
            && !self.sepia
            && self.brightness.is_none()
            && self.contrast.is_none()
            && self.saturation.is_none()
            && self.blur.is_none_or(|b| b <= 0.0)
    }
}
