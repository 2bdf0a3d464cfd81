use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono_tz::Tz;
use serde::Deserialize;

const DEFAULT_CATALOG_URL: &str = "https://epic.gsfc.nasa.gov/api/natural";
const DEFAULT_ARCHIVE_BASE_URL: &str = "https://epic.gsfc.nasa.gov/archive/natural";
const DEFAULT_WEATHER_ENDPOINT: &str = "http://api.openweathermap.org/data/2.5/weather";
const DEFAULT_ICON_URL_TEMPLATE: &str = "http://openweathermap.org/img/wn/{icon}@2x.png";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Directory holding the numbered, display-ready images.
    pub cache_dir: PathBuf,
    /// Image shown while the first catalog is being materialized.
    pub placeholder_path: PathBuf,
    /// Timezone for the clock overlay; the host's local zone when absent.
    pub timezone: Option<Tz>,
    /// Catalog-check and frame-rotation cadence.
    pub schedule: ScheduleConfig,
    /// Remote image feed.
    pub feed: FeedConfig,
    /// Optional weather overlay; omitted means no weather is fetched or drawn.
    pub weather: Option<WeatherConfig>,
    /// Crop window and output resolution for cached images.
    pub materialize: MaterializeConfig,
    /// Clock/date/weather overlay styling.
    pub overlay: OverlayConfig,
    /// Presentation window options.
    pub window: WindowConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.cache_dir.as_os_str().is_empty(),
            "cache-dir must not be empty"
        );
        ensure!(
            !self.placeholder_path.as_os_str().is_empty(),
            "placeholder-path must not be empty"
        );
        self.schedule
            .validate()
            .context("invalid schedule configuration")?;
        self.feed.validate().context("invalid feed configuration")?;
        if let Some(weather) = &self.weather {
            weather
                .validate()
                .context("invalid weather configuration")?;
        }
        self.materialize
            .validate()
            .context("invalid materialize configuration")?;
        self.overlay
            .validate()
            .context("invalid overlay configuration")?;
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("."),
            placeholder_path: PathBuf::from("./loading.jpg"),
            timezone: None,
            schedule: ScheduleConfig::default(),
            feed: FeedConfig::default(),
            weather: None,
            materialize: MaterializeConfig::default(),
            overlay: OverlayConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// How often the remote catalog is checked for a newer image set.
    #[serde(with = "humantime_serde")]
    pub catalog_check_interval: Duration,
    /// Dwell time of each frame during steady rotation.
    #[serde(with = "humantime_serde")]
    pub frame_rotation_interval: Duration,
    /// Dwell time used for the first pass over a freshly materialized set.
    #[serde(with = "humantime_serde")]
    pub fresh_set_rotation_interval: Duration,
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.catalog_check_interval.is_zero(),
            "catalog-check-interval must be positive"
        );
        ensure!(
            !self.frame_rotation_interval.is_zero(),
            "frame-rotation-interval must be positive"
        );
        ensure!(
            !self.fresh_set_rotation_interval.is_zero(),
            "fresh-set-rotation-interval must be positive"
        );
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            catalog_check_interval: Duration::from_secs(120 * 60),
            frame_rotation_interval: Duration::from_secs(20),
            fresh_set_rotation_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Endpoint returning the ordered catalog as JSON.
    pub catalog_url: String,
    /// Prefix for per-image archive URLs (`{base}/YYYY/MM/DD/jpg/{id}.jpg`).
    pub archive_base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Total catalog fetch attempts per check, including the first.
    pub max_attempts: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_factor: u32,
}

impl FeedConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.catalog_url.trim().is_empty(),
            "feed.catalog-url must not be empty"
        );
        ensure!(
            !self.archive_base_url.trim().is_empty(),
            "feed.archive-base-url must not be empty"
        );
        ensure!(self.max_attempts >= 1, "feed.max-attempts must be >= 1");
        ensure!(
            !self.request_timeout.is_zero(),
            "feed.request-timeout must be positive"
        );
        Ok(())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff_factor: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WeatherConfig {
    pub api_key: String,
    /// Location query understood by the weather service, e.g. `Boston,UK`.
    pub location: String,
    #[serde(default = "WeatherConfig::default_endpoint")]
    pub endpoint: String,
    /// Icon URL with an `{icon}` placeholder for the condition code.
    #[serde(default = "WeatherConfig::default_icon_url_template")]
    pub icon_url_template: String,
    #[serde(
        default = "WeatherConfig::default_refresh_interval",
        with = "humantime_serde"
    )]
    pub refresh_interval: Duration,
    #[serde(
        default = "WeatherConfig::default_request_timeout",
        with = "humantime_serde"
    )]
    pub request_timeout: Duration,
}

impl WeatherConfig {
    fn default_endpoint() -> String {
        DEFAULT_WEATHER_ENDPOINT.to_string()
    }

    fn default_icon_url_template() -> String {
        DEFAULT_ICON_URL_TEMPLATE.to_string()
    }

    const fn default_refresh_interval() -> Duration {
        Duration::from_secs(15 * 60)
    }

    const fn default_request_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn icon_url(&self, icon_code: &str) -> String {
        self.icon_url_template.replace("{icon}", icon_code)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.api_key.trim().is_empty(),
            "weather.api-key must not be empty"
        );
        ensure!(
            !self.location.trim().is_empty(),
            "weather.location must not be empty"
        );
        ensure!(
            self.icon_url_template.contains("{icon}"),
            "weather.icon-url-template must contain an {{icon}} placeholder"
        );
        ensure!(
            !self.refresh_interval.is_zero(),
            "weather.refresh-interval must be positive"
        );
        Ok(())
    }
}

/// Source region copied out of each downloaded image before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropWindow {
    fn default() -> Self {
        Self {
            x: 85,
            y: 85,
            width: 900,
            height: 900,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct MaterializeConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub crop: CropWindow,
}

impl MaterializeConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.target_width > 0 && self.target_height > 0,
            "materialize target resolution must be positive"
        );
        ensure!(
            self.crop.width > 0 && self.crop.height > 0,
            "materialize.crop width and height must be positive"
        );
        Ok(())
    }
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            target_width: 480,
            target_height: 480,
            crop: CropWindow::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Preferred font family; falls back to common sans-serif faces.
    pub font_family: Option<String>,
    pub font_size: f32,
    pub text_color: [u8; 3],
    pub outline_color: [u8; 3],
    /// Nominal icon edge used for layout when no icon is available.
    pub icon_size: u32,
    /// Distance from the canvas centre up to the bottom of the icon.
    pub icon_offset: i32,
    /// How far the temperature line tucks up into the icon.
    pub temperature_overlap: i32,
    /// Gap between the temperature line and the date line.
    pub date_gap: i32,
    /// Gap between the date line and the clock line.
    pub time_gap: i32,
    pub date_format: String,
    pub time_format: String,
}

impl OverlayConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.font_size.is_finite() && self.font_size > 0.0,
            "overlay.font-size must be positive"
        );
        ensure!(
            !self.date_format.is_empty() && !self.time_format.is_empty(),
            "overlay date/time formats must not be empty"
        );
        Ok(())
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 36.0,
            text_color: [255, 255, 255],
            outline_color: [0, 0, 0],
            icon_size: 100,
            icon_offset: 160,
            temperature_overlap: 15,
            date_gap: 280,
            time_gap: 10,
            date_format: "%d %B %Y".to_string(),
            time_format: "%H:%M".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub fullscreen: bool,
    pub hide_cursor: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "EPIC Photo Frame".to_string(),
            fullscreen: true,
            hide_cursor: true,
        }
    }
}
