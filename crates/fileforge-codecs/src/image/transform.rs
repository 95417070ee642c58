//! Geometry planning for image transforms.

use fileforge_core::types::{CropRect, FlipOptions, ImageOptions, ResizeOptions, Rotation};
use fileforge_core::{ConvertError, ConvertResult};

use super::filters::FilterChain;

/// Everything the surface needs to run the transform, with every size
/// already resolved against the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    /// Source rectangle, clamped to the image.
    pub crop: Option<CropRect>,
    /// Size the (cropped) source is drawn at, before rotation.
    pub draw_width: u32,
    pub draw_height: u32,
    pub flip: FlipOptions,
    pub rotation: Rotation,
    pub filters: FilterChain,
}

impl TransformPlan {
    /// Resolve `options` against a `width` x `height` source.
    pub fn new(width: u32, height: u32, options: &ImageOptions) -> ConvertResult<Self> {
        let crop = options
            .crop
            .map(|rect| clamp_crop(rect, width, height))
            .transpose()?;

        let (base_w, base_h) = crop.map_or((width, height), |c| (c.width, c.height));
        let (draw_width, draw_height) = match &options.resize {
            Some(resize) => resolve_resize(base_w, base_h, resize),
            None => (base_w, base_h),
        };

        Ok(Self {
            crop,
            draw_width,
            draw_height,
            flip: options.flip,
            rotation: options.rotate,
            filters: options
                .filters
                .as_ref()
                .map(FilterChain::from_options)
                .unwrap_or_default(),
        })
    }

    /// Output size after rotation.
    pub fn target_dimensions(&self) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (self.draw_height, self.draw_width)
        } else {
            (self.draw_width, self.draw_height)
        }
    }

    /// Fail when either drawn axis is larger than `max`.
    pub fn check_limit(&self, max: u32) -> ConvertResult<()> {
        if self.draw_width > max || self.draw_height > max {
            return Err(ConvertError::encode(format!(
                "Image of {}x{} exceeds the maximum dimension of {max}",
                self.draw_width, self.draw_height
            )));
        }
        Ok(())
    }
}

fn clamp_crop(rect: CropRect, width: u32, height: u32) -> ConvertResult<CropRect> {
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    let clamped = CropRect {
        x,
        y,
        width: rect.width.min(width - x),
        height: rect.height.min(height - y),
    };
    if clamped.width == 0 || clamped.height == 0 {
        return Err(ConvertError::encode(format!(
            "Crop rectangle {}x{} at ({}, {}) lies outside the {width}x{height} image",
            rect.width, rect.height, rect.x, rect.y
        )));
    }
    Ok(clamped)
}

/// Percentage wins over explicit sizes; zero or non-finite values count as
/// absent. With `maintain_ratio` a single given axis drives the other.
fn resolve_resize(width: u32, height: u32, resize: &ResizeOptions) -> (u32, u32) {
    let round = |v: f64| (v.round() as u32).max(1);
    let (w, h) = (f64::from(width), f64::from(height));

    if let Some(pct) = resize.percentage.filter(|p| p.is_finite() && *p > 0.0) {
        let pct = f64::from(pct) / 100.0;
        return (round(w * pct), round(h * pct));
    }

    let req_w = resize.width.filter(|v| *v > 0);
    let req_h = resize.height.filter(|v| *v > 0);

    match (req_w, req_h, resize.maintain_ratio) {
        (None, None, _) => (width, height),
        (Some(rw), Some(rh), _) => (rw, rh),
        (Some(rw), None, true) => (rw, round(f64::from(rw) * h / w)),
        (None, Some(rh), true) => (round(f64::from(rh) * w / h), rh),
        (rw, rh, false) => (rw.unwrap_or(width), rh.unwrap_or(height)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resize(options: ResizeOptions) -> ImageOptions {
        ImageOptions {
            resize: Some(options),
            ..Default::default()
        }
    }

    #[test]
    fn test_percentage_resize() {
        let plan = TransformPlan::new(
            200,
            100,
            &resize(ResizeOptions {
                percentage: Some(50.0),
                width: Some(10),
                ..Default::default()
            }),
        )
        .expect("plan");
        assert_eq!(plan.target_dimensions(), (100, 50));
    }

    #[test]
    fn test_maintain_ratio_derives_missing_axis() {
        let plan = TransformPlan::new(
            400,
            300,
            &resize(ResizeOptions {
                width: Some(200),
                maintain_ratio: true,
                ..Default::default()
            }),
        )
        .expect("plan");
        assert_eq!(plan.target_dimensions(), (200, 150));

        let plan = TransformPlan::new(
            400,
            300,
            &resize(ResizeOptions {
                width: Some(200),
                ..Default::default()
            }),
        )
        .expect("plan");
        assert_eq!(plan.target_dimensions(), (200, 300));
    }

    #[test]
    fn test_rotation_swaps_target() {
        let options = ImageOptions {
            rotate: Rotation::Deg270,
            ..Default::default()
        };
        let plan = TransformPlan::new(640, 480, &options).expect("plan");
        assert_eq!(plan.target_dimensions(), (480, 640));
    }

    #[test]
    fn test_crop_is_clamped_and_sets_base() {
        let options = ImageOptions {
            crop: Some(CropRect {
                x: 50,
                y: 10,
                width: 500,
                height: 20,
            }),
            ..Default::default()
        };
        let plan = TransformPlan::new(100, 100, &options).expect("plan");
        assert_eq!(
            plan.crop,
            Some(CropRect {
                x: 50,
                y: 10,
                width: 50,
                height: 20
            })
        );
        assert_eq!(plan.target_dimensions(), (50, 20));
    }

    #[test]
    fn test_crop_outside_image_fails() {
        let options = ImageOptions {
            crop: Some(CropRect {
                x: 100,
                y: 0,
                width: 10,
                height: 10,
            }),
            ..Default::default()
        };
        assert!(TransformPlan::new(100, 100, &options).is_err());
    }

    #[test]
    fn test_limit() {
        let plan = TransformPlan::new(
            10,
            10,
            &resize(ResizeOptions {
                percentage: Some(1000.0),
                ..Default::default()
            }),
        )
        .expect("plan");
        assert!(plan.check_limit(64).is_err());
        assert!(plan.check_limit(100).is_ok());
    }
}
