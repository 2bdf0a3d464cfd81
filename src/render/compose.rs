use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage, imageops};
use tracing::warn;

use crate::config::OverlayConfig;
use crate::events::{Frame, OverlayText};
use crate::processing::layout::{Letterbox, OverlaySizes, stack_overlay};
use crate::processing::transform::Scaler;

const OUTLINE_OFFSETS: [(i32, i32); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

/// Flattens a [`Frame`] into the pixels shown on screen: the photo, the
/// weather icon and outlined temperature/date/clock text.
pub struct Compositor {
    font: FontArc,
    scale: PxScale,
    scaler: Scaler,
    cfg: OverlayConfig,
    width: u32,
    height: u32,
}

impl Compositor {
    pub fn new(font: FontArc, cfg: OverlayConfig, width: u32, height: u32) -> Self {
        Self {
            font,
            scale: PxScale::from(cfg.font_size),
            scaler: Scaler::default(),
            cfg,
            width,
            height,
        }
    }

    pub fn compose(&mut self, frame: &Frame) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, Rgba([0, 0, 0, 255]));
        self.draw_photo(&mut canvas, &frame.image);
        if let Some(overlay) = &frame.overlay {
            self.draw_overlay(&mut canvas, overlay);
        }
        canvas
    }

    fn draw_photo(&mut self, canvas: &mut RgbaImage, image: &RgbaImage) {
        let fit = Letterbox::fit(image.dimensions(), (self.width, self.height));
        match self.scaler.scale(image, (fit.width, fit.height)) {
            Ok(fitted) => imageops::replace(canvas, &fitted, i64::from(fit.x), i64::from(fit.y)),
            Err(err) => warn!(error = %err, "failed to fit image to canvas"),
        }
    }

    fn draw_overlay(&self, canvas: &mut RgbaImage, overlay: &OverlayText) {
        let sizes = OverlaySizes {
            icon: overlay.icon.as_ref().map(|icon| icon.dimensions()),
            temperature: overlay
                .temperature
                .as_deref()
                .map(|text| self.text_size(text)),
            date: self.text_size(&overlay.date),
            time: self.text_size(&overlay.time),
        };
        let placement = stack_overlay(self.width, self.height, sizes, &self.cfg);

        if let Some(icon) = &overlay.icon {
            let (x, y) = placement.icon;
            imageops::overlay(canvas, icon.as_ref(), i64::from(x), i64::from(y));
        }
        if let Some(temperature) = &overlay.temperature {
            self.draw_outlined(canvas, temperature, placement.temperature);
        }
        self.draw_outlined(canvas, &overlay.date, placement.date);
        self.draw_outlined(canvas, &overlay.time, placement.time);
    }

    /// Width and height of a text layer including its one-pixel outline.
    fn text_size(&self, text: &str) -> (u32, u32) {
        let scaled = self.font.as_scaled(self.scale);
        let width = measure_text(&self.font, self.scale, text);
        let height = scaled.ascent() + scaled.descent().abs();
        (width.ceil() as u32 + 2, height.ceil() as u32 + 2)
    }

    fn draw_outlined(&self, canvas: &mut RgbaImage, text: &str, (left, top): (i32, i32)) {
        let [r, g, b] = self.cfg.outline_color;
        let outline = Rgba([r, g, b, 255]);
        for (dx, dy) in OUTLINE_OFFSETS {
            self.draw_text(canvas, text, left + 1 + dx, top + 1 + dy, outline);
        }
        let [r, g, b] = self.cfg.text_color;
        self.draw_text(canvas, text, left + 1, top + 1, Rgba([r, g, b, 255]));
    }

    fn draw_text(&self, canvas: &mut RgbaImage, text: &str, left: i32, top: i32, color: Rgba<u8>) {
        let scaled = self.font.as_scaled(self.scale);
        let baseline = top as f32 + scaled.ascent();
        let mut cursor_x = left as f32;
        let mut previous = None;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let glyph_id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                cursor_x += scaled.kern(prev, glyph_id);
            }
            let advance = scaled.h_advance(glyph_id);
            let mut glyph = scaled.scaled_glyph(ch);
            glyph.position = point(cursor_x, baseline);
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|x, y, coverage| {
                    let px = bounds.min.x as i32 + x as i32;
                    let py = bounds.min.y as i32 + y as i32;
                    blend_pixel(canvas, px, py, color, coverage);
                });
            }
            cursor_x += advance;
            previous = Some(glyph_id);
        }
    }
}

fn measure_text(font: &FontArc, scale: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let glyph_id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            width += scaled.kern(prev, glyph_id);
        }
        width += scaled.h_advance(glyph_id);
        previous = Some(glyph_id);
    }
    width.max(0.0)
}

fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if coverage <= 0.0 || x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    let dst = canvas.get_pixel_mut(x, y);
    for channel in 0..3 {
        let src = f32::from(color.0[channel]);
        let base = f32::from(dst.0[channel]);
        dst.0[channel] = (src * alpha + base * (1.0 - alpha)).round() as u8;
    }
    dst.0[3] = 255;
}
