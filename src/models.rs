//! Data models shared across the pipeline.
//!
//! - [`NewsPayload`]: loosely-typed NewsAPI response
//! - [`NewsItem`], [`NewsSource`]: one article entry of that response
//! - [`Frame`]: column-named rows of text handed to the relational store
//!
//! NewsAPI uses camelCase field names, so the news types rename on the way in.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Placeholder for an article that has no title.
pub const UNTITLED: &str = "Untitled";

/// Placeholder for an article whose source has no name.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

/// A NewsAPI `/v2/everything` response.
///
/// No schema is enforced: every field is optional and unknown fields are
/// ignored. `NewsPayload::default()` is the empty payload returned when a
/// request fails.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct NewsPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "totalResults")]
    pub total_results: Option<u64>,
    /// `None` when the response carried no `articles` field at all.
    #[serde(default)]
    pub articles: Option<Vec<NewsItem>>,
}

/// A single article inside a [`NewsPayload`].
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<NewsSource>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
}

/// The nested `source` object of a [`NewsItem`].
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct NewsSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl NewsItem {
    /// Title, or [`UNTITLED`] when missing.
    pub fn title_or_placeholder(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    /// Source name, or [`UNKNOWN_SOURCE`] when the source or its name is missing.
    pub fn source_name_or_placeholder(&self) -> &str {
        self.source
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or(UNKNOWN_SOURCE)
    }
}

/// Tabular input for the relational store.
///
/// Every cell is optional text; `None` is written as SQL `NULL`. Each row has
/// exactly one cell per column, which [`Frame::push_row`] enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Frame {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, rejecting it if its width differs from the column count.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<(), StoreError> {
        if row.len() != self.columns.len() {
            return Err(StoreError::InvalidArgument(format!(
                "row has {} cells but frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same rows, columns renamed by `f`.
    pub fn map_columns(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            columns: self.columns.iter().map(|c| f(c)).collect(),
            rows: self.rows.clone(),
        }
    }
}
