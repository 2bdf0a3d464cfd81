use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::WeatherConfig;
use crate::error::FetchError;
use crate::sources::{WeatherReport, WeatherSource};

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    weather: Vec<Condition>,
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct Condition {
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

/// Current-conditions client; condition icons are downloaded once per code.
#[derive(Debug)]
pub struct OpenWeatherClient {
    http: Client,
    cfg: WeatherConfig,
    icons: Mutex<HashMap<String, Arc<RgbaImage>>>,
}

impl OpenWeatherClient {
    pub fn new(http: Client, cfg: WeatherConfig) -> Self {
        Self {
            http,
            cfg,
            icons: Mutex::new(HashMap::new()),
        }
    }

    async fn current(&self) -> Result<(String, f64), FetchError> {
        let body: CurrentWeather = self
            .http
            .get(&self.cfg.endpoint)
            .query(&[
                ("q", self.cfg.location.as_str()),
                ("appid", self.cfg.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let icon = body
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.icon)
            .ok_or_else(|| FetchError::Malformed("no weather conditions reported".into()))?;
        Ok((icon, body.main.temp))
    }

    async fn icon(&self, code: &str) -> Result<Arc<RgbaImage>, FetchError> {
        if let Some(hit) = self.cached_icon(code) {
            return Ok(hit);
        }
        let url = self.cfg.icon_url(code);
        debug!(%url, "downloading weather icon");
        let bytes = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let icon = image::load_from_memory(&bytes)
            .map_err(|err| FetchError::Malformed(format!("undecodable icon: {err}")))?
            .to_rgba8();
        let icon = Arc::new(icon);
        if let Ok(mut icons) = self.icons.lock() {
            icons.insert(code.to_string(), Arc::clone(&icon));
        }
        Ok(icon)
    }

    fn cached_icon(&self, code: &str) -> Option<Arc<RgbaImage>> {
        self.icons.lock().ok()?.get(code).cloned()
    }
}

impl WeatherSource for OpenWeatherClient {
    async fn fetch_weather(&self) -> Result<WeatherReport, FetchError> {
        let (icon_code, temperature_celsius) = self.current().await?;
        let icon = match self.icon(&icon_code).await {
            Ok(icon) => Some(icon),
            Err(err) => {
                warn!(icon = %icon_code, error = %err, "weather icon unavailable");
                None
            }
        };
        Ok(WeatherReport {
            icon_code,
            temperature_celsius,
            icon,
        })
    }
}
