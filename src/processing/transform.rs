use anyhow::{Context, Result, ensure};
use fast_image_resize as fir;
use image::{Rgba, RgbaImage, imageops};

use crate::config::{CropWindow, MaterializeConfig};

const CANVAS_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Crop-then-scale applied identically to every downloaded image.
///
/// The crop window is laid onto an opaque black canvas of the window's size;
/// parts of the window that fall outside the source stay black. The canvas is
/// then scaled to the target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropScale {
    pub crop: CropWindow,
    pub target_width: u32,
    pub target_height: u32,
}

impl From<&MaterializeConfig> for CropScale {
    fn from(cfg: &MaterializeConfig) -> Self {
        Self {
            crop: cfg.crop,
            target_width: cfg.target_width,
            target_height: cfg.target_height,
        }
    }
}

impl CropScale {
    pub fn decode_and_apply(&self, scaler: &mut Scaler, bytes: &[u8]) -> Result<RgbaImage> {
        let source = image::load_from_memory(bytes)
            .context("failed to decode downloaded image")?
            .to_rgba8();
        self.apply(scaler, &source)
    }

    pub fn apply(&self, scaler: &mut Scaler, source: &RgbaImage) -> Result<RgbaImage> {
        let mut canvas = RgbaImage::from_pixel(self.crop.width, self.crop.height, CANVAS_FILL);
        // crop_imm clamps the window to the source bounds
        let visible = imageops::crop_imm(
            source,
            self.crop.x,
            self.crop.y,
            self.crop.width,
            self.crop.height,
        )
        .to_image();
        imageops::replace(&mut canvas, &visible, 0, 0);
        scaler.scale(&canvas, (self.target_width, self.target_height))
    }
}

/// CatmullRom RGBA resampler whose scratch buffers survive between calls.
pub struct Scaler {
    resizer: fir::Resizer,
    options: fir::ResizeOptions,
}

impl Default for Scaler {
    fn default() -> Self {
        Self {
            resizer: fir::Resizer::new(),
            options: fir::ResizeOptions::new()
                .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom)),
        }
    }
}

impl Scaler {
    pub fn scale(&mut self, source: &RgbaImage, (width, height): (u32, u32)) -> Result<RgbaImage> {
        ensure!(width > 0 && height > 0, "cannot scale to {width}x{height}");
        if source.dimensions() == (width, height) {
            return Ok(source.clone());
        }
        let view = fir::images::ImageRef::new(
            source.width(),
            source.height(),
            source.as_raw(),
            fir::PixelType::U8x4,
        )
        .context("source is not a packed RGBA buffer")?;
        let mut scaled = fir::images::Image::new(width, height, fir::PixelType::U8x4);
        self.resizer
            .resize(&view, &mut scaled, Some(&self.options))
            .with_context(|| {
                format!(
                    "failed to scale {}x{} to {width}x{height}",
                    source.width(),
                    source.height()
                )
            })?;
        RgbaImage::from_raw(width, height, scaled.into_vec())
            .context("scaled buffer does not match its dimensions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(x: u32, y: u32, size: u32, target: u32) -> CropScale {
        CropScale {
            crop: CropWindow {
                x,
                y,
                width: size,
                height: size,
            },
            target_width: target,
            target_height: target,
        }
    }

    #[test]
    fn output_always_matches_target_resolution() {
        let t = CropScale::from(&MaterializeConfig::default());
        for (w, h) in [(2048, 2048), (640, 480), (100, 100)] {
            let src = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
            let out = t.apply(&mut Scaler::default(), &src).unwrap();
            assert_eq!(out.dimensions(), (480, 480));
        }
    }

    #[test]
    fn crop_window_selects_source_region() {
        // left half red, right half blue
        let src = RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let out = transform(120, 10, 50, 50)
            .apply(&mut Scaler::default(), &src)
            .unwrap();
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(*out.get_pixel(25, 25), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn area_outside_source_is_black() {
        let src = RgbaImage::from_pixel(60, 60, Rgba([200, 200, 200, 255]));
        let out = transform(40, 40, 40, 40)
            .apply(&mut Scaler::default(), &src)
            .unwrap();
        assert_eq!(*out.get_pixel(5, 5), Rgba([200, 200, 200, 255]));
        assert_eq!(*out.get_pixel(35, 35), CANVAS_FILL);
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let t = CropScale::from(&MaterializeConfig::default());
        assert!(t.decode_and_apply(&mut Scaler::default(), b"not an image").is_err());
    }

    #[test]
    fn one_scaler_serves_differently_sized_sources() {
        let mut scaler = Scaler::default();
        let wide = RgbaImage::from_pixel(90, 30, Rgba([40, 80, 120, 255]));
        let tall = RgbaImage::from_pixel(10, 70, Rgba([40, 80, 120, 255]));
        assert_eq!(scaler.scale(&wide, (45, 15)).unwrap().dimensions(), (45, 15));
        let out = scaler.scale(&tall, (20, 20)).unwrap();
        let centre = out.get_pixel(10, 10).0;
        for (got, want) in centre.iter().zip([40u8, 80, 120, 255]) {
            assert!(got.abs_diff(want) <= 1, "{centre:?}");
        }
        assert!(scaler.scale(&tall, (0, 20)).is_err());
    }
}
