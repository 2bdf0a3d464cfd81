use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::sources::{WeatherReport, WeatherSource};

#[derive(Debug, Clone)]
pub struct WeatherReading {
    pub icon_code: String,
    pub temperature_celsius: f64,
    pub icon: Option<Arc<RgbaImage>>,
    pub fetched_at: Instant,
}

impl WeatherReading {
    pub fn temperature_label(&self) -> String {
        // adding zero turns -0.0 into 0.0 so nothing renders as "-0"
        let whole = self.temperature_celsius.round() + 0.0;
        format!("{whole:.0}°C")
    }
}

/// Last good weather reading plus the staleness rule deciding when to refetch.
///
/// A failed refresh keeps whatever was cached before; stale data beats none.
#[derive(Debug)]
pub struct WeatherCache {
    refresh_interval: Duration,
    reading: Option<WeatherReading>,
}

impl WeatherCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            reading: None,
        }
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        match &self.reading {
            None => true,
            Some(reading) => {
                now.saturating_duration_since(reading.fetched_at) >= self.refresh_interval
            }
        }
    }

    /// Returns the cached reading, fetching once from `source` first if stale.
    pub async fn current<S>(&mut self, now: Instant, source: &S) -> Option<&WeatherReading>
    where
        S: WeatherSource,
    {
        if self.is_stale(now) {
            debug!("fetching updated weather data");
            match source.fetch_weather().await {
                Ok(report) => self.store(report, now),
                Err(err) => warn!(
                    error = %err,
                    cached = self.reading.is_some(),
                    "weather refresh failed"
                ),
            }
        }
        self.reading.as_ref()
    }

    fn store(&mut self, report: WeatherReport, now: Instant) {
        let fetched_at = match &self.reading {
            Some(previous) => previous.fetched_at.max(now),
            None => now,
        };
        debug!(
            icon = %report.icon_code,
            temperature = report.temperature_celsius,
            has_icon = report.icon.is_some(),
            "weather reading updated"
        );
        self.reading = Some(WeatherReading {
            icon_code: report.icon_code,
            temperature_celsius: report.temperature_celsius,
            icon: report.icon,
            fetched_at,
        });
    }
}
