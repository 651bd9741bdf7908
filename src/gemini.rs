//! Article generation through a Gemini chat session.
//!
//! The REST `generateContent` endpoint is stateless, so the chat session is
//! simply the running history of user and model turns, resent with every
//! message together with the system instruction and generation profile.
//!
//! # Session lifecycle
//!
//! ```ignore
//! let mut generator = ArticleGenerator::new("api-key", DEFAULT_MODEL);
//! generator.start_chat();
//! let article = generator.generate_article(&news_summary).await?;
//! ```
//!
//! Calling [`ArticleGenerator::generate_article`] without a session fails
//! with [`GeneratorError::SessionNotStarted`].

use crate::error::GeneratorError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const SYSTEM_INSTRUCTION: &str =
    "Você é um assistente que escreve textos jornalísticos claros e objetivos.";
const ARTICLE_PROMPT: &str =
    "Redija um artigo jornalístico com base nas seguintes informações:";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2000,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl Content {
    fn text(role: Option<&str>, text: String) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: &'a Content,
    contents: &'a [Content],
    generation_config: &'a GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Conversation history of one chat session.
#[derive(Debug, Default)]
struct ChatSession {
    history: Vec<Content>,
}

/// Drafts journalistic articles with a hosted Gemini model.
#[derive(Debug)]
pub struct ArticleGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    generation_config: GenerationConfig,
    system_instruction: Content,
    chat_session: Option<ChatSession>,
}

impl ArticleGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_GEMINI_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            generation_config: GenerationConfig::default(),
            system_instruction: Content::text(None, SYSTEM_INSTRUCTION.to_string()),
            chat_session: None,
        }
    }

    /// Open a new chat session with empty history, replacing any previous one.
    pub fn start_chat(&mut self) {
        info!(model = %self.model, "Starting chat session");
        self.chat_session = Some(ChatSession::default());
    }

    /// Ask the model for an article based on `input_text`.
    ///
    /// The response text is returned verbatim. There is no retry; any API
    /// failure is returned to the caller and leaves the history untouched.
    #[instrument(level = "info", skip_all, fields(model = %self.model, input_bytes = input_text.len()))]
    pub async fn generate_article(&mut self, input_text: &str) -> Result<String, GeneratorError> {
        let session = self
            .chat_session
            .as_mut()
            .ok_or(GeneratorError::SessionNotStarted)?;

        let message = Content::text(Some("user"), format!("{ARTICLE_PROMPT}\n\n{input_text}"));
        let mut contents = session.history.clone();
        contents.push(message.clone());

        let request = GenerateRequest {
            system_instruction: &self.system_instruction,
            contents: &contents,
            generation_config: &self.generation_config,
        };

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let t0 = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Generation request rejected");
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let reply = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or(GeneratorError::EmptyResponse)?;
        let text: String = reply.parts.iter().map(|p| p.text.as_str()).collect();

        session.history.push(message);
        session.history.push(Content::text(Some("model"), text.clone()));

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            output_bytes = text.len(),
            "Generated article"
        );
        Ok(text)
    }
}
