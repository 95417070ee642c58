//! Composable colour and blur filter chain.
//!
//! Filters follow the CSS filter-effects definitions: grayscale, sepia,
//! brightness, contrast and saturate are colour matrices applied in order
//! on normalized RGB with clamping after each step; blur is a gaussian whose
//! standard deviation is the requested pixel radius.

use std::fmt::Write as _;

use fileforge_core::types::FilterOptions;

/// One step of a filter chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// Amount in `0..=1`.
    Grayscale(f32),
    /// Amount in `0..=1`.
    Sepia(f32),
    /// Multiplier, `1.0` is unchanged.
    Brightness(f32),
    /// Multiplier around mid-grey, `1.0` is unchanged.
    Contrast(f32),
    /// Multiplier, `1.0` is unchanged.
    Saturate(f32),
    /// Gaussian standard deviation in pixels.
    Blur(f32),
}

impl FilterOp {
    /// Colour matrix for this step, or `None` for blur.
    pub fn matrix(&self) -> Option<ColorMatrix> {
        let m = match *self {
            Self::Grayscale(a) => {
                let k = 1.0 - a.clamp(0.0, 1.0);
                ColorMatrix::linear([
                    [0.2126 + 0.7874 * k, 0.7152 - 0.7152 * k, 0.0722 - 0.0722 * k],
                    [0.2126 - 0.2126 * k, 0.7152 + 0.2848 * k, 0.0722 - 0.0722 * k],
                    [0.2126 - 0.2126 * k, 0.7152 - 0.7152 * k, 0.0722 + 0.9278 * k],
                ])
            }
            Self::Sepia(a) => {
                let k = 1.0 - a.clamp(0.0, 1.0);
                ColorMatrix::linear([
                    [0.393 + 0.607 * k, 0.769 - 0.769 * k, 0.189 - 0.189 * k],
                    [0.349 - 0.349 * k, 0.686 + 0.314 * k, 0.168 - 0.168 * k],
                    [0.272 - 0.272 * k, 0.534 - 0.534 * k, 0.131 + 0.869 * k],
                ])
            }
            Self::Brightness(b) => ColorMatrix::scale(b, 0.0),
            Self::Contrast(c) => ColorMatrix::scale(c, 0.5 - 0.5 * c),
            Self::Saturate(s) => ColorMatrix::linear([
                [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
                [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
                [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
            ]),
            Self::Blur(_) => return None,
        };
        Some(m)
    }
}

/// Affine transform on normalized RGB: three rows of `[r, g, b, offset]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix([[f32; 4]; 3]);

impl ColorMatrix {
    fn linear(rows: [[f32; 3]; 3]) -> Self {
        Self(rows.map(|[r, g, b]| [r, g, b, 0.0]))
    }

    fn scale(factor: f32, offset: f32) -> Self {
        Self([
            [factor, 0.0, 0.0, offset],
            [0.0, factor, 0.0, offset],
            [0.0, 0.0, factor, offset],
        ])
    }

    /// Apply to one normalized pixel, clamping the result to `0..=1`.
    pub fn apply(&self, [r, g, b]: [f32; 3]) -> [f32; 3] {
        self.0
            .map(|[mr, mg, mb, off]| (mr * r + mg * g + mb * b + off).clamp(0.0, 1.0))
    }
}

/// Ordered filter steps built from caller options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    /// Build the chain in CSS order: grayscale, sepia, brightness, contrast,
    /// saturate, blur. Percent offsets are relative to 100%.
    pub fn from_options(options: &FilterOptions) -> Self {
        let percent = |offset: f32| ((100.0 + offset) / 100.0).max(0.0);
        let mut ops = Vec::new();

        if options.grayscale {
            ops.push(FilterOp::Grayscale(1.0));
        }
        if options.sepia {
            ops.push(FilterOp::Sepia(1.0));
        }
        if let Some(b) = options.brightness.filter(|v| v.is_finite()) {
            ops.push(FilterOp::Brightness(percent(b)));
        }
        if let Some(c) = options.contrast.filter(|v| v.is_finite()) {
            ops.push(FilterOp::Contrast(percent(c)));
        }
        if let Some(s) = options.saturation.filter(|v| v.is_finite()) {
            ops.push(FilterOp::Saturate(percent(s)));
        }
        if let Some(radius) = options.blur.filter(|v| v.is_finite() && *v > 0.0) {
            ops.push(FilterOp::Blur(radius));
        }

        Self { ops }
    }

    /// Steps in application order.
    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    /// Whether the chain does nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Colour matrices in application order.
    pub fn color_stages(&self) -> Vec<ColorMatrix> {
        self.ops.iter().filter_map(FilterOp::matrix).collect()
    }

    /// Gaussian sigma, if the chain blurs.
    pub fn blur_sigma(&self) -> Option<f32> {
        self.ops.iter().find_map(|op| match op {
            FilterOp::Blur(sigma) => Some(*sigma),
            _ => None,
        })
    }

    /// The chain as a CSS `filter` value, e.g. `grayscale(100%) blur(2px)`.
    pub fn css(&self) -> String {
        let mut out = String::new();
        for op in &self.ops {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = match op {
                FilterOp::Grayscale(a) => write!(out, "grayscale({}%)", a * 100.0),
                FilterOp::Sepia(a) => write!(out, "sepia({}%)", a * 100.0),
                FilterOp::Brightness(v) => write!(out, "brightness({}%)", (v * 100.0).round()),
                FilterOp::Contrast(v) => write!(out, "contrast({}%)", (v * 100.0).round()),
                FilterOp::Saturate(v) => write!(out, "saturate({}%)", (v * 100.0).round()),
                FilterOp::Blur(px) => write!(out, "blur({px}px)"),
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn test_css_order_and_values() {
        let chain = FilterChain::from_options(&FilterOptions {
            grayscale: true,
            sepia: true,
            brightness: Some(-20.0),
            contrast: Some(10.0),
            saturation: Some(0.0),
            blur: Some(2.0),
        });
        assert_eq!(
            chain.css(),
            "grayscale(100%) sepia(100%) brightness(80%) contrast(110%) saturate(100%) blur(2px)"
        );
        assert_eq!(chain.color_stages().len(), 5);
        assert_eq!(chain.blur_sigma(), Some(2.0));
    }

    #[test]
    fn test_empty_options() {
        let chain = FilterChain::from_options(&FilterOptions {
            blur: Some(0.0),
            ..Default::default()
        });
        assert!(chain.is_empty());
        assert_eq!(chain.css(), "");
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let m = FilterOp::Grayscale(1.0).matrix().expect("matrix");
        let [r, g, b] = m.apply([1.0, 0.0, 0.0]);
        assert!(approx([r, g, b], [0.2126, 0.2126, 0.2126]));
    }

    #[test]
    fn test_identity_amounts() {
        let px = [0.2, 0.5, 0.9];
        for op in [
            FilterOp::Grayscale(0.0),
            FilterOp::Sepia(0.0),
            FilterOp::Brightness(1.0),
            FilterOp::Contrast(1.0),
            FilterOp::Saturate(1.0),
        ] {
            let m = op.matrix().expect("matrix");
            assert!(approx(m.apply(px), px), "{op:?} should be identity");
        }
    }

    #[test]
    fn test_brightness_clamps() {
        let m = FilterOp::Brightness(2.0).matrix().expect("matrix");
        assert!(approx(m.apply([0.8, 0.25, 0.0]), [1.0, 0.5, 0.0]));
    }

    #[test]
    fn test_contrast_pivots_on_mid_grey() {
        let m = FilterOp::Contrast(0.0).matrix().expect("matrix");
        assert!(approx(m.apply([0.0, 1.0, 0.3]), [0.5, 0.5, 0.5]));
    }
}
