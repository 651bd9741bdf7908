//! Command-line interface definitions for Trend Press.
//!
//! API keys can come from flags or from the environment (a `.env` file is
//! loaded first). Database parameters are not flags: the store reads
//! `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_NAME` and `DB_PORT`.

use crate::gemini::DEFAULT_MODEL;
use crate::news::{DEFAULT_DAYS_AGO, DEFAULT_SORT_BY};
use crate::store::DEFAULT_SCHEMA;
use crate::trends::{DEFAULT_LANGUAGE, DEFAULT_REGION};
use clap::Parser;

/// Draft a news article about what people are searching for right now.
///
/// # Examples
///
/// ```sh
/// # Article about today's top trending search in Brazil
/// trend_press
///
/// # Skip the trends lookup and persist the run
/// trend_press --term "eleições" --persist --schema press
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Google Trends geo code to read trending searches for
    #[arg(short, long, default_value = DEFAULT_REGION)]
    pub region: String,

    /// Interface language for the trends feed
    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Use this search term instead of the top trending one
    #[arg(short, long)]
    pub term: Option<String>,

    /// How many days back the one-day news window starts
    #[arg(long, default_value_t = DEFAULT_DAYS_AGO)]
    pub days_ago: u32,

    /// NewsAPI sort order (relevancy, popularity, publishedAt)
    #[arg(long, default_value = DEFAULT_SORT_BY)]
    pub sort_by: String,

    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Gemini model used to draft the article
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Store trends, news and the article in PostgreSQL
    #[arg(short, long)]
    pub persist: bool,

    /// Database schema for persisted tables
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    pub schema: String,
}
