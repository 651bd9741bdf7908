//! # Trend Press
//!
//! A small content pipeline that turns what people are searching for into a
//! draft news article.
//!
//! ## Pipeline
//!
//! 1. **Trends**: read the top trending searches for a region from Google Trends
//! 2. **News**: fetch one day of NewsAPI coverage for the top term
//! 3. **Drafting**: ask a Gemini chat session for a journalistic article
//! 4. **Persistence** (optional): write trends, news and the article to PostgreSQL
//!
//! ## Usage
//!
//! ```sh
//! NEWS_API_KEY=... GEMINI_API_KEY=... trend_press --persist
//! ```
//!
//! The article is printed to stdout; logs go to stderr and honour `RUST_LOG`.

use chrono::{DateTime, Local};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod error;
mod gemini;
mod models;
mod news;
mod store;
mod trends;
mod utils;

use cli::Cli;
use error::StoreError;
use gemini::ArticleGenerator;
use models::{Frame, NewsPayload};
use news::{extract_news_content, NewsApiClient};
use store::{quote_ident, DbConfig, Store, DEFAULT_SCHEMA};
use trends::TrendsClient;
use utils::truncate_for_log;

const TRENDS_TABLE: &str = "trending_searches";
const NEWS_TABLE: &str = "news";
const ARTICLES_TABLE: &str = "articles";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("trend_press starting up");

    let args = Cli::parse();
    debug!(region = %args.region, term = ?args.term, persist = args.persist, "Parsed CLI arguments");

    // ---- Trends ----
    let (term, trending) = match &args.term {
        Some(term) => {
            info!(%term, "Using search term from the command line");
            (term.clone(), Vec::new())
        }
        None => {
            let trends = TrendsClient::new(&args.language)?;
            let trending = trends.get_trending_searches(&args.region).await;
            let term = trending
                .first()
                .cloned()
                .ok_or("no trending searches available for this region")?;
            info!(%term, available = trending.len(), "Picked top trending search");
            (term, trending)
        }
    };

    // ---- News ----
    let news = NewsApiClient::new(&args.news_api_key);
    let payload = news.get_news(&term, args.days_ago, &args.sort_by).await;
    let news_content = extract_news_content(&payload);
    debug!(preview = %truncate_for_log(&news_content, 300), "News summary");

    // ---- Drafting ----
    let mut generator = ArticleGenerator::new(&args.gemini_api_key, &args.model);
    generator.start_chat();
    let article = generator
        .generate_article(&article_input(&term, &news_content))
        .await?;
    let generated_at = Local::now();
    info!(bytes = article.len(), "Article drafted");

    println!("{article}");

    // ---- Persistence ----
    if args.persist {
        let mut store = Store::connect(DbConfig::from_env().with_schema(&args.schema)).await;
        let run = Run {
            region: &args.region,
            term: &term,
            trending: &trending,
            payload: &payload,
            model: &args.model,
            article: &article,
            generated_at,
        };
        persist(&mut store, &run).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Text handed to the generator: the search term followed by the news lines.
fn article_input(term: &str, news_content: &str) -> String {
    format!("Termo em alta nas buscas: {term}\n\nNotícias relacionadas:\n{news_content}")
}

/// Everything one pipeline run produced.
struct Run<'a> {
    region: &'a str,
    term: &'a str,
    trending: &'a [String],
    payload: &'a NewsPayload,
    model: &'a str,
    article: &'a str,
    generated_at: DateTime<Local>,
}

/// Write a run to the store.
///
/// Trends and news are snapshots and replace their tables; articles
/// accumulate across runs.
#[instrument(level = "info", skip_all, fields(schema = %store.schema()))]
async fn persist(store: &mut Store, run: &Run<'_>) -> Result<(), Box<dyn Error>> {
    if !store.is_connected() {
        error!("No database connection; run not persisted");
        return Err(StoreError::NotConnected.into());
    }

    if store.schema() != DEFAULT_SCHEMA {
        let ddl = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(store.schema()));
        store.execute_query(&ddl).await?;
    }

    let fetched_at = run.generated_at.to_rfc3339();

    if run.trending.is_empty() {
        debug!("No trending list for this run; keeping previous snapshot");
    } else {
        let trends = trends_frame(run.trending, run.region, &fetched_at)?;
        store.create_table(TRENDS_TABLE, &trends, true).await?;
    }

    match news_frame(run.term, run.payload)? {
        Some(news) => {
            if news.is_empty() {
                warn!(term = %run.term, "News payload has no articles; news table will be empty");
            }
            store.create_table(NEWS_TABLE, &news, true).await?
        }
        None => warn!(term = %run.term, "No news payload to persist"),
    }

    let article = article_frame(run)?;
    if store.table_exists(ARTICLES_TABLE).await? {
        store.insert_into_table(ARTICLES_TABLE, &article, true).await?;
    } else {
        store.create_table(ARTICLES_TABLE, &article, true).await?;
    }

    info!("Run persisted");
    Ok(())
}

fn trends_frame(terms: &[String], region: &str, fetched_at: &str) -> Result<Frame, StoreError> {
    let mut frame = Frame::new(["rank", "term", "region", "fetched_at"]);
    for (i, term) in terms.iter().enumerate() {
        frame.push_row(vec![
            Some((i + 1).to_string()),
            Some(term.clone()),
            Some(region.to_string()),
            Some(fetched_at.to_string()),
        ])?;
    }
    Ok(frame)
}

/// `None` when the payload had no `articles` field (failed or empty response).
fn news_frame(term: &str, payload: &NewsPayload) -> Result<Option<Frame>, StoreError> {
    let Some(articles) = &payload.articles else {
        return Ok(None);
    };
    let mut frame = Frame::new(["query", "title", "source", "description", "url", "published_at"]);
    for article in articles {
        frame.push_row(vec![
            Some(term.to_string()),
            Some(article.title_or_placeholder().to_string()),
            Some(article.source_name_or_placeholder().to_string()),
            article.description.clone(),
            article.url.clone(),
            article.published_at.clone(),
        ])?;
    }
    Ok(Some(frame))
}

fn article_frame(run: &Run<'_>) -> Result<Frame, StoreError> {
    let mut frame = Frame::new(["term", "model", "generated_at", "article"]);
    frame.push_row(vec![
        Some(run.term.to_string()),
        Some(run.model.to_string()),
        Some(run.generated_at.to_rfc3339()),
        Some(run.article.to_string()),
    ])?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewsItem, NewsSource, UNKNOWN_SOURCE, UNTITLED};

    fn run<'a>(trending: &'a [String], payload: &'a NewsPayload) -> Run<'a> {
        Run {
            region: "BR",
            term: "eleições",
            trending,
            payload,
            model: "gemini-1.5-flash",
            article: "Texto do artigo.",
            generated_at: Local::now(),
        }
    }

    #[test]
    fn test_article_input() {
        let input = article_input("eleições", "- Apuração (G1)");
        assert!(input.starts_with("Termo em alta nas buscas: eleições"));
        assert!(input.ends_with("- Apuração (G1)"));
    }

    #[test]
    fn test_trends_frame_ranks() {
        let terms = vec!["a".to_string(), "b".to_string()];
        let frame = trends_frame(&terms, "BR", "2026-10-17T00:00:00+00:00").unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.rows()[1][0].as_deref(), Some("2"));
        assert_eq!(frame.rows()[1][1].as_deref(), Some("b"));
    }

    #[test]
    fn test_news_frame_without_articles() {
        assert!(news_frame("x", &NewsPayload::default()).unwrap().is_none());
    }

    #[test]
    fn test_news_frame_placeholders() {
        let payload = NewsPayload {
            articles: Some(vec![NewsItem {
                title: None,
                source: Some(NewsSource::default()),
                url: Some("https://example.com".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let frame = news_frame("x", &payload).unwrap().unwrap();
        let row = &frame.rows()[0];
        assert_eq!(row[1].as_deref(), Some(UNTITLED));
        assert_eq!(row[2].as_deref(), Some(UNKNOWN_SOURCE));
        assert_eq!(row[3], None);
        assert_eq!(row[4].as_deref(), Some("https://example.com"));
        assert_eq!(row[5], None);
    }

    #[test]
    fn test_article_frame() {
        let payload = NewsPayload::default();
        let frame = article_frame(&run(&[], &payload)).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.columns()[3], "article");
        assert_eq!(frame.rows()[0][0].as_deref(), Some("eleições"));
    }

    #[tokio::test]
    async fn test_persist_without_connection_fails() {
        let mut store = Store::connect(DbConfig {
            host: Some("127.0.0.1".to_string()),
            port: Some(9),
            ..Default::default()
        })
        .await;
        assert!(!store.is_connected());
        let trending = vec!["eleições".to_string()];
        let payload = NewsPayload::default();
        let err = persist(&mut store, &run(&trending, &payload)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotConnected)
        ));
    }

    #[test]
    fn test_news_frame_with_empty_articles() {
        let payload: NewsPayload = serde_json::from_str(r#"{"status": "ok", "articles": []}"#).unwrap();
        let frame = news_frame("x", &payload).unwrap().unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.columns().len(), 6);
    }
}
