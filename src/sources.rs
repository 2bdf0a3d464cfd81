//! Seams between the scheduling core and the network.
//!
//! The slideshow only ever talks to these traits; production uses the
//! `remote` clients and tests substitute in-process fakes.

use std::future::Future;
use std::sync::Arc;

use image::RgbaImage;

use crate::catalog::CatalogItem;
use crate::error::FetchError;

/// Provides the ordered remote catalog, newest item first.
pub trait CatalogSource {
    fn fetch_catalog(&self) -> impl Future<Output = Result<Vec<CatalogItem>, FetchError>> + Send;
}

/// Provides raw image bytes for a fully-qualified URL.
pub trait ImageSource {
    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// A single weather observation as reported by the service.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub icon_code: String,
    pub temperature_celsius: f64,
    /// Decoded condition icon; absent when only the icon download failed.
    pub icon: Option<Arc<RgbaImage>>,
}

/// Provides the current weather for the configured location.
pub trait WeatherSource {
    fn fetch_weather(&self) -> impl Future<Output = Result<WeatherReport, FetchError>> + Send;
}
