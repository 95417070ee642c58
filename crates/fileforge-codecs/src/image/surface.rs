//! Pixel surfaces the transform pipeline draws on.
//!
//! Two surfaces exist: 8-bit RGBA for every output, and 16-bit RGBA kept
//! for deep-colour sources headed to PNG so the extra precision survives.
//! [`open_surface`] probes the source once and picks one.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Rgba};

use fileforge_core::types::{FlipOptions, Rotation};

use super::filters::FilterChain;
use super::transform::TransformPlan;

/// Operations the transform pipeline needs from a pixel surface.
pub trait RenderSurface: Send {
    /// Current width and height.
    fn dimensions(&self) -> (u32, u32);

    /// Keep only the given rectangle. The rectangle must lie inside.
    fn crop(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Resample to exactly `width` x `height`.
    fn resize(&mut self, width: u32, height: u32);

    /// Run colour stages then blur.
    fn apply_filters(&mut self, chain: &FilterChain);

    /// Mirror around the centre.
    fn flip(&mut self, flip: FlipOptions);

    /// Rotate clockwise around the centre.
    fn rotate(&mut self, rotation: Rotation);

    /// Hand the pixels to an encoder.
    fn into_image(self: Box<Self>) -> DynamicImage;
}

/// Run `plan` on `surface`: crop, resize, filters, flip, rotate.
pub fn render(surface: &mut dyn RenderSurface, plan: &TransformPlan) {
    if let Some(rect) = plan.crop {
        surface.crop(rect.x, rect.y, rect.width, rect.height);
    }
    if surface.dimensions() != (plan.draw_width, plan.draw_height) {
        surface.resize(plan.draw_width, plan.draw_height);
    }
    if !plan.filters.is_empty() {
        surface.apply_filters(&plan.filters);
    }
    if plan.flip.any() {
        surface.flip(plan.flip);
    }
    if plan.rotation != Rotation::None {
        surface.rotate(plan.rotation);
    }
}

/// Whether the source carries more than 8 bits per channel.
fn is_deep(image: &DynamicImage) -> bool {
    let color = image.color();
    color.bytes_per_pixel() > color.channel_count()
}

/// Pick the surface for `image` given the normalized output format.
pub fn open_surface(image: DynamicImage, output_format: &str) -> Box<dyn RenderSurface> {
    if output_format == "png" && is_deep(&image) {
        Box::new(Surface16(image.into_rgba16()))
    } else {
        Box::new(Surface8(image.into_rgba8()))
    }
}

/// 8-bit RGBA surface.
pub struct Surface8(pub ImageBuffer<Rgba<u8>, Vec<u8>>);

/// 16-bit RGBA surface.
pub struct Surface16(pub ImageBuffer<Rgba<u16>, Vec<u16>>);

macro_rules! impl_render_surface {
    ($surface:ident, $sub:ty, $variant:ident) => {
        impl RenderSurface for $surface {
            fn dimensions(&self) -> (u32, u32) {
                self.0.dimensions()
            }

            fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) {
                self.0 = imageops::crop_imm(&self.0, x, y, width, height).to_image();
            }

            fn resize(&mut self, width: u32, height: u32) {
                self.0 = imageops::resize(&self.0, width, height, FilterType::Triangle);
            }

            fn apply_filters(&mut self, chain: &FilterChain) {
                let stages = chain.color_stages();
                if !stages.is_empty() {
                    let max = f32::from(<$sub>::MAX);
                    for Rgba([r, g, b, _]) in self.0.pixels_mut() {
                        let mut px = [f32::from(*r) / max, f32::from(*g) / max, f32::from(*b) / max];
                        for stage in &stages {
                            px = stage.apply(px);
                        }
                        *r = (px[0] * max).round() as $sub;
                        *g = (px[1] * max).round() as $sub;
                        *b = (px[2] * max).round() as $sub;
                    }
                }
                if let Some(sigma) = chain.blur_sigma() {
                    self.0 = imageops::blur(&self.0, sigma);
                }
            }

            fn flip(&mut self, flip: FlipOptions) {
                if flip.horizontal {
                    imageops::flip_horizontal_in_place(&mut self.0);
                }
                if flip.vertical {
                    imageops::flip_vertical_in_place(&mut self.0);
                }
            }

            fn rotate(&mut self, rotation: Rotation) {
                match rotation {
                    Rotation::None => {}
                    Rotation::Deg90 => self.0 = imageops::rotate90(&self.0),
                    Rotation::Deg180 => imageops::rotate180_in_place(&mut self.0),
                    Rotation::Deg270 => self.0 = imageops::rotate270(&self.0),
                }
            }

            fn into_image(self: Box<Self>) -> DynamicImage {
                DynamicImage::$variant(self.0)
            }
        }
    };
}

impl_render_surface!(Surface8, u8, ImageRgba8);
impl_render_surface!(Surface16, u16, ImageRgba16);

#[cfg(test)]
mod tests {
    use super::*;
    use fileforge_core::types::ImageOptions;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x * 10) as u8, (y * 10) as u8, 0, 255])
        }))
    }

    fn run(image: DynamicImage, options: &ImageOptions) -> DynamicImage {
        let (w, h) = (image.width(), image.height());
        let plan = TransformPlan::new(w, h, options).expect("plan");
        let mut surface = open_surface(image, "png");
        render(surface.as_mut(), &plan);
        surface.into_image()
    }

    #[test]
    fn test_probe_keeps_sixteen_bit_for_png() {
        let deep = DynamicImage::ImageRgb16(ImageBuffer::new(2, 2));
        assert!(matches!(
            open_surface(deep.clone(), "png").into_image(),
            DynamicImage::ImageRgba16(_)
        ));
        assert!(matches!(
            open_surface(deep, "jpeg").into_image(),
            DynamicImage::ImageRgba8(_)
        ));
        assert!(matches!(
            open_surface(gradient(2, 2), "png").into_image(),
            DynamicImage::ImageRgba8(_)
        ));
    }

    #[test]
    fn test_rotate_90_swaps_dimensions() {
        let options = ImageOptions {
            rotate: Rotation::Deg90,
            ..Default::default()
        };
        let out = run(gradient(6, 3), &options);
        assert_eq!((out.width(), out.height()), (3, 6));
    }

    #[test]
    fn test_double_horizontal_flip_is_identity() {
        let source = gradient(5, 4);
        let options = ImageOptions {
            flip: FlipOptions {
                horizontal: true,
                vertical: false,
            },
            ..Default::default()
        };
        let once = run(source.clone(), &options);
        assert_ne!(once, source);
        let twice = run(once, &options);
        assert_eq!(twice, source);
    }

    #[test]
    fn test_crop_then_filters() {
        let options = ImageOptions {
            crop: Some(fileforge_core::types::CropRect {
                x: 1,
                y: 1,
                width: 2,
                height: 2,
            }),
            filters: Some(fileforge_core::types::FilterOptions {
                grayscale: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = run(gradient(4, 4), &options).into_rgba8();
        assert_eq!(out.dimensions(), (2, 2));
        for Rgba([r, g, b, a]) in out.pixels() {
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(*a, 255);
        }
    }
}
