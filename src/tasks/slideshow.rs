use std::fmt::Display;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use humantime::format_duration;
use image::RgbaImage;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::ImageSet;
use crate::config::{OverlayConfig, ScheduleConfig};
use crate::error::{MaterializeError, PollError};
use crate::events::{Frame, OverlayText, SurfaceEvent};
use crate::schedule::IntervalTimer;
use crate::sources::{CatalogSource, ImageSource, WeatherSource};
use crate::tasks::materializer::ImageMaterializer;
use crate::tasks::poller::{FeedPoller, PollOutcome};
use crate::weather::WeatherCache;

/// Where the slideshow hands finished frames; the window in production.
pub trait FrameSink {
    fn present(&mut self, frame: Frame) -> Result<()>;

    /// Returns input gathered since the previous call.
    fn drain_events(&mut self) -> Vec<SurfaceEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Loading,
    Checking,
    Rotating,
    ShuttingDown,
}

/// Formats the wall-clock date and time shown under each image.
#[derive(Debug, Clone)]
pub struct OverlayClock {
    timezone: Option<Tz>,
    date_format: String,
    time_format: String,
}

impl OverlayClock {
    pub fn new(timezone: Option<Tz>, overlay: &OverlayConfig) -> Self {
        Self {
            timezone,
            date_format: overlay.date_format.clone(),
            time_format: overlay.time_format.clone(),
        }
    }

    pub fn labels_at(&self, now: DateTime<Utc>) -> (String, String) {
        match self.timezone {
            Some(tz) => self.format(now.with_timezone(&tz)),
            None => self.format(now.with_timezone(&Local)),
        }
    }

    fn format<Z>(&self, now: DateTime<Z>) -> (String, String)
    where
        Z: TimeZone,
        Z::Offset: Display,
    {
        (
            now.format(&self.date_format).to_string(),
            now.format(&self.time_format).to_string(),
        )
    }
}

impl Default for OverlayClock {
    fn default() -> Self {
        Self::new(None, &OverlayConfig::default())
    }
}

/// The single scheduling task: checks the catalog on a timer, rebuilds the
/// image set when it changes and rotates frames in between.
///
/// Owns every piece of mutable state (image set, weather cache, poller
/// fingerprint); nothing is shared with the display thread except the
/// frames handed to the [`FrameSink`].
pub struct Slideshow<C, I, S, W> {
    poller: FeedPoller<C>,
    materializer: ImageMaterializer<I>,
    sink: S,
    weather: Option<(WeatherCache, W)>,
    clock: OverlayClock,
    placeholder: Arc<RgbaImage>,
    check_timer: IntervalTimer,
    rotation_interval: Duration,
    fresh_rotation_interval: Duration,
    cancel: CancellationToken,
    state: DriverState,
    images: ImageSet,
    fresh: bool,
}

impl<C, I, S, W> Slideshow<C, I, S, W>
where
    C: CatalogSource,
    I: ImageSource,
    S: FrameSink,
    W: WeatherSource,
{
    pub fn new(
        poller: FeedPoller<C>,
        materializer: ImageMaterializer<I>,
        sink: S,
        placeholder: Arc<RgbaImage>,
        schedule: &ScheduleConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            poller,
            materializer,
            sink,
            weather: None,
            clock: OverlayClock::default(),
            placeholder,
            check_timer: IntervalTimer::new(schedule.catalog_check_interval),
            rotation_interval: schedule.frame_rotation_interval,
            fresh_rotation_interval: schedule.fresh_set_rotation_interval,
            cancel,
            state: DriverState::Loading,
            images: ImageSet::default(),
            fresh: false,
        }
    }

    pub fn with_weather(mut self, cache: WeatherCache, source: W) -> Self {
        self.weather = Some((cache, source));
        self
    }

    pub fn with_clock(mut self, clock: OverlayClock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs until the cancellation token fires or the surface asks to close.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Checking for new photos every {}",
            format_duration(self.check_timer.interval())
        );
        info!(
            "Rotating photos every {}",
            format_duration(self.rotation_interval)
        );

        let result = self.drive().await;
        self.transition(DriverState::ShuttingDown);
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let loading = Frame::placeholder(Arc::clone(&self.placeholder));
        if self.present(loading)?.is_break() {
            return Ok(());
        }
        loop {
            if self.stop_requested() {
                return Ok(());
            }
            if self.check_timer.due(Instant::now()) {
                self.transition(DriverState::Checking);
                self.check_timer.reset(Instant::now());
                self.check_catalog().await;
            }
            if self.stop_requested() {
                return Ok(());
            }
            self.transition(DriverState::Rotating);
            if self.rotate_pass().await?.is_break() {
                return Ok(());
            }
        }
    }

    async fn check_catalog(&mut self) {
        let snapshot = match self.poller.check(&self.cancel).await {
            PollOutcome::Changed(snapshot) => snapshot,
            PollOutcome::Unchanged => return,
            PollOutcome::Failed(PollError::Cancelled) => return,
            PollOutcome::Failed(err) => {
                warn!(error = %err, images = self.images.len(), "catalog check failed");
                return;
            }
        };
        match self.materializer.materialize(&snapshot, &self.cancel).await {
            Ok(images) => {
                self.poller.commit(&snapshot);
                self.images = images;
                self.fresh = true;
            }
            Err(MaterializeError::Cancelled) => debug!("materialization cancelled"),
            Err(err) => warn!(
                error = %err,
                images = self.images.len(),
                "failed to save new photos; keeping previous set"
            ),
        }
    }

    /// One pass over the current set. A freshly built set runs its first
    /// pass at the short interval.
    async fn rotate_pass(&mut self) -> Result<ControlFlow<()>> {
        let delay = if std::mem::take(&mut self.fresh) {
            self.fresh_rotation_interval
        } else {
            self.rotation_interval
        };

        if self.images.is_empty() {
            let frame = Frame::placeholder(Arc::clone(&self.placeholder));
            return self.tick(frame, delay).await;
        }

        for index in 0..self.images.len() {
            let Some(cached) = self.images.get(index) else {
                break;
            };
            let image = Arc::clone(&cached.image);
            let overlay = self.overlay().await;
            let frame = Frame {
                index: Some(index),
                image,
                overlay: Some(overlay),
            };
            if self.tick(frame, delay).await?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn tick(&mut self, frame: Frame, delay: Duration) -> Result<ControlFlow<()>> {
        if self.present(frame)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(ControlFlow::Break(())),
            _ = sleep(delay) => Ok(ControlFlow::Continue(())),
        }
    }

    fn present(&mut self, frame: Frame) -> Result<ControlFlow<()>> {
        if self.stop_requested() {
            return Ok(ControlFlow::Break(()));
        }
        debug!(index = ?frame.index, "presenting frame");
        match self.sink.present(frame) {
            Ok(()) => Ok(ControlFlow::Continue(())),
            // the surface closing races with cancellation
            Err(_) if self.cancel.is_cancelled() => Ok(ControlFlow::Break(())),
            Err(err) => Err(err.context("display surface unavailable")),
        }
    }

    /// Drains surface events and reports whether the loop should stop.
    fn stop_requested(&mut self) -> bool {
        for event in self.sink.drain_events() {
            match event {
                SurfaceEvent::CloseRequested => {
                    info!("close requested");
                    self.cancel.cancel();
                }
            }
        }
        self.cancel.is_cancelled()
    }

    async fn overlay(&mut self) -> OverlayText {
        let (date, time) = self.clock.labels_at(Utc::now());
        let mut overlay = OverlayText {
            date,
            time,
            temperature: None,
            icon: None,
        };
        if self.stop_requested() {
            return overlay;
        }
        if let Some((cache, source)) = self.weather.as_mut()
            && let Some(reading) = cache.current(Instant::now(), &*source).await
        {
            overlay.temperature = Some(reading.temperature_label());
            overlay.icon = reading.icon.clone();
        }
        overlay
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "slideshow state");
            self.state = next;
        }
    }
}
