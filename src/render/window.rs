use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use softbuffer::{Context as SoftContext, Surface};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::window::{Fullscreen, Window, WindowId};

use crate::config::WindowConfig;
use crate::events::{Frame, SurfaceEvent, ViewerCommand};
use crate::processing::layout::Letterbox;
use crate::render::compose::Compositor;
use crate::tasks::slideshow::FrameSink;

type WindowHandle = Arc<Window>;

/// Driver-side end of the window: composes frames and ships them to the
/// event loop thread.
pub struct WindowSink {
    proxy: EventLoopProxy<ViewerCommand>,
    events: Receiver<SurfaceEvent>,
    compositor: Compositor,
}

impl WindowSink {
    pub fn new(
        proxy: EventLoopProxy<ViewerCommand>,
        events: Receiver<SurfaceEvent>,
        compositor: Compositor,
    ) -> Self {
        Self {
            proxy,
            events,
            compositor,
        }
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, frame: Frame) -> Result<()> {
        let pixels = Arc::new(self.compositor.compose(&frame));
        self.proxy
            .send_event(ViewerCommand::Show(pixels))
            .map_err(|_| anyhow!("display window has closed"))
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        self.events.try_iter().collect()
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        // the event loop may already be gone
        let _ = self.proxy.send_event(ViewerCommand::Exit);
    }
}

/// Main-thread half of the display: owns the window and blits the latest
/// composed frame whenever winit asks for a redraw.
pub struct ViewerApp {
    cfg: WindowConfig,
    events: Sender<SurfaceEvent>,
    cancel: CancellationToken,
    window: Option<WindowHandle>,
    context: Option<SoftContext<WindowHandle>>,
    surface: Option<Surface<WindowHandle, WindowHandle>>,
    current: Option<Arc<RgbaImage>>,
    failure: Option<anyhow::Error>,
}

impl ViewerApp {
    pub fn new(cfg: WindowConfig, events: Sender<SurfaceEvent>, cancel: CancellationToken) -> Self {
        Self {
            cfg,
            events,
            cancel,
            window: None,
            context: None,
            surface: None,
            current: None,
            failure: None,
        }
    }

    /// Error that stopped the event loop, if it did not exit cleanly.
    pub fn take_failure(&mut self) -> Option<anyhow::Error> {
        self.failure.take()
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }
        let mut attrs = Window::default_attributes().with_title(self.cfg.title.clone());
        if self.cfg.fullscreen {
            attrs = attrs
                .with_decorations(false)
                .with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        if self.cfg.hide_cursor {
            window.set_cursor_visible(false);
        }
        let window: WindowHandle = Arc::new(window);

        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer context: {err}"))?;
        let surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer surface: {err}"))?;
        let size = window.inner_size();
        info!(width = size.width, height = size.height, "window ready");
        window.request_redraw();

        self.context = Some(context);
        self.surface = Some(surface);
        self.window = Some(window);
        Ok(())
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        let _ = self.events.send(SurfaceEvent::CloseRequested);
        self.cancel.cancel();
        event_loop.exit();
    }

    fn render(&mut self) {
        let (Some(window), Some(surface)) = (self.window.as_ref(), self.surface.as_mut()) else {
            return;
        };
        let size = window.inner_size();
        let (Some(width), Some(height)) = (
            NonZeroU32::new(size.width.max(1)),
            NonZeroU32::new(size.height.max(1)),
        ) else {
            return;
        };
        if let Err(err) = surface.resize(width, height) {
            warn!(error = %err, "failed to resize surface");
            return;
        }
        let Ok(mut buffer) = surface.buffer_mut() else {
            warn!("failed to map surface buffer");
            return;
        };
        match self.current.as_deref() {
            Some(image) => blit_letterboxed(image, &mut buffer, width.get(), height.get()),
            None => buffer.fill(0),
        }
        if let Err(err) = buffer.present() {
            warn!(error = %err, "failed to present frame");
        }
    }
}

impl ApplicationHandler<ViewerCommand> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.ensure_window(event_loop) {
            self.failure = Some(err);
            self.cancel.cancel();
            event_loop.exit();
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, command: ViewerCommand) {
        match command {
            ViewerCommand::Show(image) => {
                self.current = Some(image);
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            ViewerCommand::Exit => {
                debug!("viewer exit requested");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.close(event_loop),
            WindowEvent::Resized(_) => {
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }
}

/// Nearest-neighbour scale of `image` into a `width`×`height` 0RGB buffer,
/// preserving aspect ratio on a black background.
pub fn blit_letterboxed(image: &RgbaImage, buffer: &mut [u32], width: u32, height: u32) {
    buffer.fill(0);
    if image.width() == 0 || image.height() == 0 {
        return;
    }
    let Letterbox {
        x: off_x,
        y: off_y,
        width: fit_w,
        height: fit_h,
    } = Letterbox::fit(image.dimensions(), (width, height));
    for dy in 0..fit_h {
        let sy = (u64::from(dy) * u64::from(image.height()) / u64::from(fit_h)) as u32;
        let row = ((off_y + dy) * width) as usize;
        for dx in 0..fit_w {
            let sx = (u64::from(dx) * u64::from(image.width()) / u64::from(fit_w)) as u32;
            let [r, g, b, _] = image.get_pixel(sx, sy).0;
            let index = row + (off_x + dx) as usize;
            if let Some(slot) = buffer.get_mut(index) {
                *slot = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
            }
        }
    }
}
