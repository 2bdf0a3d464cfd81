use crate::config::OverlayConfig;

/// Where a source of some aspect ratio lands when fitted whole and centred
/// inside a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    pub fn fit((src_w, src_h): (u32, u32), (canvas_w, canvas_h): (u32, u32)) -> Self {
        let (sw, sh) = (u64::from(src_w.max(1)), u64::from(src_h.max(1)));
        let (cw, ch) = (u64::from(canvas_w.max(1)), u64::from(canvas_h.max(1)));
        // compare aspect ratios by cross-multiplying; round half up
        let (width, height) = if sw * ch >= sh * cw {
            (cw, (2 * sh * cw + sw) / (2 * sw))
        } else {
            ((2 * sw * ch + sh) / (2 * sh), ch)
        };
        let width = width.clamp(1, cw) as u32;
        let height = height.clamp(1, ch) as u32;
        Self {
            x: (cw as u32 - width) / 2,
            y: (ch as u32 - height) / 2,
            width,
            height,
        }
    }

    pub fn is_full(&self, canvas: (u32, u32)) -> bool {
        (self.width, self.height) == canvas
    }
}

/// Top-left corners of the overlay layers, stacked down from the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPlacement {
    pub icon: (i32, i32),
    pub temperature: (i32, i32),
    pub date: (i32, i32),
    pub time: (i32, i32),
}

/// Sizes of the overlay layers; `None` falls back to the nominal size so the
/// date and clock keep their position whether or not weather is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlaySizes {
    pub icon: Option<(u32, u32)>,
    pub temperature: Option<(u32, u32)>,
    pub date: (u32, u32),
    pub time: (u32, u32),
}

/// Stacks icon, temperature, date and clock horizontally centred on the canvas.
pub fn stack_overlay(
    canvas_w: u32,
    canvas_h: u32,
    sizes: OverlaySizes,
    cfg: &OverlayConfig,
) -> OverlayPlacement {
    let center_x = (canvas_w / 2) as i32;
    let center_y = (canvas_h / 2) as i32;
    let centered = |w: u32| center_x - (w / 2) as i32;

    let (icon_w, icon_h) = sizes.icon.unwrap_or((cfg.icon_size, cfg.icon_size));
    let (temp_w, temp_h) = sizes.temperature.unwrap_or((0, sizes.date.1));

    let icon_y = center_y - icon_h as i32 - cfg.icon_offset;
    let temp_y = icon_y + icon_h as i32 - cfg.temperature_overlap;
    let date_y = temp_y + temp_h as i32 + cfg.date_gap;
    let time_y = date_y + sizes.date.1 as i32 + cfg.time_gap;

    OverlayPlacement {
        icon: (centered(icon_w), icon_y),
        temperature: (centered(temp_w), temp_y),
        date: (centered(sizes.date.0), date_y),
        time: (centered(sizes.time.0), time_y),
    }
}
