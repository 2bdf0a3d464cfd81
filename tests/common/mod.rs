#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use epic_photo_frame::catalog::CatalogItem;
use epic_photo_frame::config::{CropWindow, MaterializeConfig, ScheduleConfig};
use epic_photo_frame::error::FetchError;
use epic_photo_frame::events::{Frame, SurfaceEvent};
use epic_photo_frame::processing::transform::CropScale;
use epic_photo_frame::sources::{CatalogSource, ImageSource, WeatherReport, WeatherSource};
use epic_photo_frame::tasks::materializer::{ImageCache, ImageMaterializer};
use epic_photo_frame::tasks::poller::{FeedPoller, RetryPolicy};
use epic_photo_frame::tasks::slideshow::{FrameSink, Slideshow};
use epic_photo_frame::weather::WeatherCache;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const ARCHIVE: &str = "https://archive.test/natural";

/// Counts calls to a fake network collaborator, and how many of them were
/// made after shutdown was requested.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<AtomicUsize>,
    after_cancel: Arc<AtomicUsize>,
    cancel: Option<CancellationToken>,
}

impl CallLog {
    pub fn watching(cancel: &CancellationToken) -> Self {
        Self {
            cancel: Some(cancel.clone()),
            ..Self::default()
        }
    }

    fn record(&self) -> usize {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            self.after_cancel.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn after_cancel(&self) -> usize {
        self.after_cancel.load(Ordering::SeqCst)
    }
}

pub fn item(timestamp: &str, image_id: &str) -> CatalogItem {
    CatalogItem::parse(timestamp, image_id).unwrap()
}

/// Items dated on the same day, newest first, with ids `<prefix>0..`.
pub fn catalog(newest: &str, prefix: &str, count: usize) -> Vec<CatalogItem> {
    (0..count)
        .map(|n| item(newest, &format!("{prefix}{n}")))
        .collect()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Items(Vec<CatalogItem>),
    Fail,
}

/// Catalog source answering from a script, then repeating the last reply.
#[derive(Debug, Clone)]
pub struct FakeFeed {
    script: Arc<Mutex<VecDeque<Reply>>>,
    last: Arc<Mutex<Reply>>,
    pub log: CallLog,
}

impl FakeFeed {
    pub fn scripted(replies: impl IntoIterator<Item = Reply>, log: CallLog) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            last: Arc::new(Mutex::new(Reply::Fail)),
            log,
        }
    }

    pub fn always(reply: Reply, log: CallLog) -> Self {
        Self::scripted([reply], log)
    }

    fn next(&self) -> Reply {
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            *last = reply;
        }
        last.clone()
    }
}

impl CatalogSource for FakeFeed {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, FetchError> {
        self.log.record();
        match self.next() {
            Reply::Items(items) => Ok(items),
            Reply::Fail => Err(FetchError::Timeout),
        }
    }
}

pub fn jpeg_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

/// Image source serving a solid JPEG for any URL; optionally fails every
/// request after the first `fail_after` calls.
#[derive(Debug, Clone)]
pub struct FakeImages {
    color: [u8; 3],
    fail_after: Option<usize>,
    urls: Arc<Mutex<Vec<String>>>,
    pub log: CallLog,
}

impl FakeImages {
    pub fn new(color: [u8; 3], log: CallLog) -> Self {
        Self {
            color,
            fail_after: None,
            urls: Arc::default(),
            log,
        }
    }

    pub fn failing_after(mut self, successes: usize) -> Self {
        self.fail_after = Some(successes);
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl ImageSource for FakeImages {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let seen = self.log.record();
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail_after.is_some_and(|limit| seen >= limit) {
            return Err(FetchError::Status(404));
        }
        Ok(jpeg_bytes(120, 120, self.color))
    }
}

#[derive(Debug, Clone)]
pub struct FakeWeather {
    temperature: Option<f64>,
    pub log: CallLog,
}

impl FakeWeather {
    pub fn reporting(temperature: f64, log: CallLog) -> Self {
        Self {
            temperature: Some(temperature),
            log,
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self {
            temperature: None,
            log,
        }
    }
}

impl WeatherSource for FakeWeather {
    async fn fetch_weather(&self) -> Result<WeatherReport, FetchError> {
        self.log.record();
        match self.temperature {
            Some(temperature_celsius) => Ok(WeatherReport {
                icon_code: "01d".into(),
                temperature_celsius,
                icon: Some(Arc::new(RgbaImage::new(8, 8))),
            }),
            None => Err(FetchError::Transport("unreachable".into())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Presented {
    pub at: Instant,
    pub index: Option<usize>,
    pub temperature: Option<String>,
    pub has_overlay: bool,
}

/// Records presented frames; cancels (or asks to close) after a fixed count
/// so a run under paused time terminates.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Presented>>>,
    pending: Arc<Mutex<Vec<SurfaceEvent>>>,
    stop_after: usize,
    close_instead: bool,
    cancel: CancellationToken,
}

impl RecordingSink {
    pub fn cancelling_after(frames: usize, cancel: &CancellationToken) -> Self {
        Self {
            frames: Arc::default(),
            pending: Arc::default(),
            stop_after: frames,
            close_instead: false,
            cancel: cancel.clone(),
        }
    }

    pub fn closing_after(frames: usize, cancel: &CancellationToken) -> Self {
        Self {
            close_instead: true,
            ..Self::cancelling_after(frames, cancel)
        }
    }

    pub fn frames(&self) -> Vec<Presented> {
        self.frames.lock().unwrap().clone()
    }

    pub fn indices(&self) -> Vec<Option<usize>> {
        self.frames().iter().map(|f| f.index).collect()
    }
}

impl FrameSink for RecordingSink {
    fn present(&mut self, frame: Frame) -> Result<()> {
        let mut frames = self.frames.lock().unwrap();
        frames.push(Presented {
            at: Instant::now(),
            index: frame.index,
            temperature: frame.overlay.as_ref().and_then(|o| o.temperature.clone()),
            has_overlay: frame.overlay.is_some(),
        });
        if frames.len() == self.stop_after {
            if self.close_instead {
                self.pending.lock().unwrap().push(SurfaceEvent::CloseRequested);
            } else {
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

pub fn small_transform() -> CropScale {
    CropScale::from(&MaterializeConfig {
        target_width: 48,
        target_height: 48,
        crop: CropWindow {
            x: 10,
            y: 10,
            width: 100,
            height: 100,
        },
    })
}

pub fn materializer(images: FakeImages, dir: &Path) -> ImageMaterializer<FakeImages> {
    ImageMaterializer::new(images, ImageCache::new(dir), small_transform(), ARCHIVE)
}

pub fn schedule(check_secs: u64) -> ScheduleConfig {
    ScheduleConfig {
        catalog_check_interval: Duration::from_secs(check_secs),
        frame_rotation_interval: Duration::from_secs(20),
        fresh_set_rotation_interval: Duration::from_secs(1),
    }
}

pub fn placeholder() -> Arc<RgbaImage> {
    Arc::new(RgbaImage::new(4, 4))
}

pub struct Rig {
    pub feed: FakeFeed,
    pub images: FakeImages,
    pub weather: FakeWeather,
    pub sink: RecordingSink,
    pub cancel: CancellationToken,
}

impl Rig {
    pub fn slideshow(
        &self,
        dir: &Path,
        schedule: &ScheduleConfig,
    ) -> Slideshow<FakeFeed, FakeImages, RecordingSink, FakeWeather> {
        Slideshow::new(
            FeedPoller::new(self.feed.clone(), RetryPolicy::default()),
            materializer(self.images.clone(), dir),
            self.sink.clone(),
            placeholder(),
            schedule,
            self.cancel.clone(),
        )
        .with_weather(
            WeatherCache::new(Duration::from_secs(15 * 60)),
            self.weather.clone(),
        )
    }
}

pub fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
    let gap = later.duration_since(earlier);
    assert!(
        gap >= expected && gap < expected + Duration::from_millis(50),
        "expected a gap of {expected:?}, got {gap:?}"
    );
}
