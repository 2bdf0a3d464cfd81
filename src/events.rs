use std::sync::Arc;

use image::RgbaImage;

/// Text layers drawn on top of a slideshow image.
#[derive(Debug, Clone)]
pub struct OverlayText {
    pub date: String,
    pub time: String,
    /// Formatted temperature, present once a weather reading exists.
    pub temperature: Option<String>,
    pub icon: Option<Arc<RgbaImage>>,
}

/// One presentation step handed from the slideshow to the display surface.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the current image set; `None` for the placeholder.
    pub index: Option<usize>,
    pub image: Arc<RgbaImage>,
    pub overlay: Option<OverlayText>,
}

impl Frame {
    pub fn placeholder(image: Arc<RgbaImage>) -> Self {
        Self {
            index: None,
            image,
            overlay: None,
        }
    }
}

/// Input reported by the display surface, drained once per slideshow tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    CloseRequested,
}

/// Messages delivered to the window thread's event loop.
#[derive(Debug, Clone)]
pub enum ViewerCommand {
    Show(Arc<RgbaImage>),
    Exit,
}
