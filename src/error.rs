//! Error types for the article generator and the relational store.
//!
//! The trends and news clients never surface errors to their callers (they
//! log and return empty results), so only the components that propagate
//! failures have an error enum here.

use thiserror::Error;

/// Failures raised by [`crate::gemini::ArticleGenerator`].
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// `generate_article` was called before `start_chat`.
    #[error("chat session has not been started; call start_chat() first")]
    SessionNotStarted,

    /// The HTTP request to the generative-language API failed.
    #[error("generative API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("generative API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered without any candidate text.
    #[error("generative API returned no candidates")]
    EmptyResponse,
}

/// Failures raised by [`crate::store::Store`].
///
/// Database errors inside `create_table`, `insert_into_table` and
/// `execute_query` are logged and swallowed; they only surface from
/// `table_exists`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller passed something unusable (empty query, malformed frame).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection failed when the store was constructed.
    #[error("store has no open database connection")]
    NotConnected,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
