//! Google Trends client.
//!
//! Reads the daily trending-searches RSS feed for a region. The feed is an
//! ordinary RSS 2.0 document whose `<item><title>` elements are the trending
//! terms; the `ht:`-namespaced extras (traffic, related news) are ignored.
//!
//! Failures never reach the caller: any network, status, or parse error is
//! logged and turned into an empty list.

use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

pub const DEFAULT_TRENDS_URL: &str = "https://trends.google.com";
pub const DEFAULT_REGION: &str = "BR";
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
}

/// Client for the Google Trends trending-searches feed.
#[derive(Debug, Clone)]
pub struct TrendsClient {
    client: Client,
    base_url: Url,
    language: String,
}

impl TrendsClient {
    /// Client against the public Google Trends host with the given interface language.
    pub fn new(language: &str) -> Result<Self, url::ParseError> {
        Self::with_base_url(DEFAULT_TRENDS_URL, language)
    }

    pub fn with_base_url(base_url: &str, language: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            language: language.to_string(),
        })
    }

    /// Trending search terms for `region` (a Trends geo code such as `"BR"`).
    ///
    /// Returns an empty list if anything goes wrong, so "no trends" and
    /// "fetch failed" look the same to the caller.
    #[instrument(level = "info", skip(self))]
    pub async fn get_trending_searches(&self, region: &str) -> Vec<String> {
        match self.fetch_trending(region).await {
            Ok(terms) => {
                info!(count = terms.len(), region, "Fetched trending searches");
                debug!(?terms, "Trending terms");
                terms
            }
            Err(e) => {
                error!(region, error = %e, "Failed to fetch trending searches");
                Vec::new()
            }
        }
    }

    async fn fetch_trending(&self, region: &str) -> Result<Vec<String>, Box<dyn Error>> {
        let url = self.base_url.join("trending/rss")?;
        let body = self
            .client
            .get(url)
            .query(&[("geo", region), ("hl", self.language.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_trending_feed(&body)
    }
}

/// Extract the item titles of a trending-searches RSS feed, in feed order.
///
/// Titles are trimmed and blank ones skipped; repeated titles are kept.
fn parse_trending_feed(xml: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let rss: Rss = from_str(xml)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| item.title)
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .collect())
}
