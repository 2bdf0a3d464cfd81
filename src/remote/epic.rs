use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::catalog::CatalogItem;
use crate::config::FeedConfig;
use crate::error::FetchError;
use crate::sources::{CatalogSource, ImageSource};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// One element of the feed's JSON array; other fields are ignored.
#[derive(Debug, Deserialize)]
struct FeedEntry {
    date: String,
    image: String,
}

/// Client for the EPIC catalog endpoint and its image archive.
#[derive(Debug, Clone)]
pub struct EpicClient {
    http: Client,
    catalog_url: String,
}

impl EpicClient {
    pub fn new(http: Client, cfg: &FeedConfig) -> Self {
        Self {
            http,
            catalog_url: cfg.catalog_url.clone(),
        }
    }
}

impl CatalogSource for EpicClient {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, FetchError> {
        debug!(url = %self.catalog_url, "requesting catalog");
        let entries: Vec<FeedEntry> = self
            .http
            .get(&self.catalog_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_entries(entries)
    }
}

impl ImageSource for EpicClient {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

fn parse_entries(entries: Vec<FeedEntry>) -> Result<Vec<CatalogItem>, FetchError> {
    entries
        .into_iter()
        .map(|entry| {
            CatalogItem::parse(&entry.date, entry.image).map_err(|err| {
                FetchError::Malformed(format!("bad item date {:?}: {err}", entry.date))
            })
        })
        .collect()
}
