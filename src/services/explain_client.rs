//! Client for the explanation backend.
//!
//! The backend is a single `POST /` endpoint taking `{text, type, messages?}`
//! and answering `{result}` with status 200. Every other outcome (transport
//! failure, non-200 status, body without a string `result`) is reported as
//! [`ExplainError::Api`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::types::ai::{ChatMessage, ExplainKind, ExplainRequest, ExplainResponse, WireChatMessage};
use crate::types::errors::ExplainError;
use crate::types::settings::BackendSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Explanation, dictionary and chat lookups.
#[async_trait]
pub trait ExplainService: Send + Sync {
    async fn explain(&self, text: &str) -> Result<String, ExplainError>;
    async fn dictionary(&self, word: &str) -> Result<String, ExplainError>;
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ExplainError>;
}

/// HTTP implementation of [`ExplainService`]. Holds no per-request state.
pub struct ExplainClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl ExplainClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, ExplainError> {
        let endpoint = Url::parse(&settings.base_url)
            .map_err(|e| ExplainError::InvalidUrl(format!("{}: {}", settings.base_url, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ExplainError::InvalidUrl(settings.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExplainError::Api(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Interprets a backend reply.
    pub fn parse_response(status: u16, body: &str) -> Result<String, ExplainError> {
        if status != 200 {
            let detail = serde_json::from_str::<ExplainResponse>(body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ExplainError::Api(detail));
        }

        let parsed: ExplainResponse = serde_json::from_str(body)
            .map_err(|e| ExplainError::Api(format!("Malformed response: {}", e)))?;
        parsed
            .result
            .ok_or_else(|| ExplainError::Api("Response has no result".to_string()))
    }

    async fn call(&self, request: ExplainRequest) -> Result<String, ExplainError> {
        debug!(kind = ?request.kind, chars = request.text.chars().count(), "explain request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-API-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExplainError::Api(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(status = %status, "explain backend error");
        }
        Self::parse_response(status.as_u16(), &body)
    }
}

#[async_trait]
impl ExplainService for ExplainClient {
    async fn explain(&self, text: &str) -> Result<String, ExplainError> {
        self.call(ExplainRequest {
            text: text.to_string(),
            kind: ExplainKind::Explain,
            messages: None,
        })
        .await
    }

    async fn dictionary(&self, word: &str) -> Result<String, ExplainError> {
        self.call(ExplainRequest {
            text: word.to_string(),
            kind: ExplainKind::Dictionary,
            messages: None,
        })
        .await
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ExplainError> {
        self.call(ExplainRequest {
            text: String::new(),
            kind: ExplainKind::Chat,
            messages: Some(messages.iter().map(WireChatMessage::from).collect()),
        })
        .await
    }
}
