//! Core `ResponseGenerator` trait and the `ApiNarrator` implementation.
//!
//! `ApiNarrator` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint — Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM.  All
//! connection details come from [`NarrationSettings`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::NarrationSettings;
use crate::narration::prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// NarrationError
// ---------------------------------------------------------------------------

/// Errors that can occur while generating narration.
#[derive(Debug, Error)]
pub enum NarrationError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("narration request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse narration response: {0}")]
    Parse(String),

    /// The backend answered with no usable text.
    #[error("narration backend returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for NarrationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NarrationError::Timeout
        } else {
            NarrationError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// IntentKind / NarrationContext
// ---------------------------------------------------------------------------

/// What the narration is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Introduce the element a tour step just moved to.
    TourStep,
    /// Summarise a section on request ("what is this?").
    SectionOverview,
}

/// Seed text for one narration request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrationContext {
    /// Section or step title.
    pub section: String,
    /// Step description or other seed text.
    pub description: String,
    /// Visible text of the section, when known.
    pub excerpt: Option<String>,
}

// ---------------------------------------------------------------------------
// ResponseGenerator trait
// ---------------------------------------------------------------------------

/// Async source of narration text.
///
/// Implementors must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn ResponseGenerator>`.  Callers treat errors and empty strings the
/// same way: nothing is spoken.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        intent: IntentKind,
        context: &NarrationContext,
    ) -> Result<String, NarrationError>;
}

// ---------------------------------------------------------------------------
// ApiNarrator
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ApiNarrator {
    client: reqwest::Client,
    settings: NarrationSettings,
    prompt_builder: PromptBuilder,
}

impl ApiNarrator {
    /// Build an `ApiNarrator` from settings.
    ///
    /// The HTTP client carries the per-request timeout; a default client is
    /// used if the builder fails.
    pub fn from_settings(settings: &NarrationSettings, language: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            settings: settings.clone(),
            prompt_builder: PromptBuilder::new(language),
        }
    }
}

#[async_trait]
impl ResponseGenerator for ApiNarrator {
    /// The `Authorization: Bearer …` header is attached only when
    /// `api_key` is a non-empty string.
    async fn generate(
        &self,
        intent: IntentKind,
        context: &NarrationContext,
    ) -> Result<String, NarrationError> {
        let (system_msg, user_msg) = self.prompt_builder.build_chat(intent, context);

        let url = format!("{}/v1/chat/completions", self.settings.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model":       self.settings.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.settings.temperature,
            "max_tokens":  160
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.settings.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NarrationError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(NarrationError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(NarrationError::EmptyResponse);
        }

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
