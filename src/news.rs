//! NewsAPI client.
//!
//! One GET against the `/v2/everything` endpoint per query, restricted to a
//! single calendar day. Like the trends client, failures are logged and
//! masked: the caller gets an empty [`NewsPayload`].

use crate::models::NewsPayload;
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use itertools::Itertools;
use reqwest::Client;
use std::error::Error;
use tracing::{error, info, instrument, warn};

pub const DEFAULT_NEWS_URL: &str = "https://newsapi.org/v2/everything";
pub const DEFAULT_DAYS_AGO: u32 = 1;
pub const DEFAULT_SORT_BY: &str = "popularity";

/// Returned by [`extract_news_content`] when the payload has no `articles` field.
pub const NO_NEWS_AVAILABLE: &str = "No news available.";

#[derive(Debug, Clone)]
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_NEWS_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Articles matching `query` published on the day `days_ago` days before today.
    ///
    /// Both `from` and `to` are set to that same date. Returns the empty
    /// payload on any transport, status, or decoding failure, and when
    /// `days_ago` reaches past the representable calendar.
    #[instrument(level = "info", skip(self))]
    pub async fn get_news(&self, query: &str, days_ago: u32, sort_by: &str) -> NewsPayload {
        let Some(date) = news_window_date(&Local::now(), days_ago) else {
            warn!(days_ago, "News window is out of the calendar range");
            return NewsPayload::default();
        };
        match self.fetch(query, &date, sort_by).await {
            Ok(payload) => {
                let count = payload.articles.as_ref().map_or(0, Vec::len);
                info!(count, total = ?payload.total_results, %date, "Fetched news articles");
                payload
            }
            Err(e) => {
                error!(%date, error = %e, "Failed to reach the news API");
                NewsPayload::default()
            }
        }
    }

    async fn fetch(&self, query: &str, date: &str, sort_by: &str) -> Result<NewsPayload, Box<dyn Error>> {
        let payload = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("from", date),
                ("to", date),
                ("sortBy", sort_by),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<NewsPayload>()
            .await?;
        Ok(payload)
    }
}

/// `%Y-%m-%d` of the day `days_ago` days before `now`, or `None` if that
/// day is out of chrono's range.
pub fn news_window_date<Tz: TimeZone>(now: &DateTime<Tz>, days_ago: u32) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let window = TimeDelta::try_days(i64::from(days_ago))?;
    let day = now.clone().checked_sub_signed(window)?;
    Some(day.format("%Y-%m-%d").to_string())
}

/// Render a payload as `- Title (Source)` lines joined by newlines.
///
/// A payload without an `articles` field yields [`NO_NEWS_AVAILABLE`]; an
/// empty `articles` list yields an empty string.
pub fn extract_news_content(payload: &NewsPayload) -> String {
    match &payload.articles {
        Some(articles) => articles
            .iter()
            .map(|article| {
                format!(
                    "- {} ({})",
                    article.title_or_placeholder(),
                    article.source_name_or_placeholder()
                )
            })
            .join("\n"),
        None => NO_NEWS_AVAILABLE.to_string(),
    }
}
