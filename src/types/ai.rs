use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of request sent to the explanation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainKind {
    Explain,
    Dictionary,
    Chat,
}

/// A single message in a lookup chat. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub is_user: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    fn new(content: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            is_user,
        }
    }
}

/// Wire form of a chat message: `{content, isUser}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireChatMessage {
    pub content: String,
    pub is_user: bool,
}

impl From<&ChatMessage> for WireChatMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            content: msg.content.clone(),
            is_user: msg.is_user,
        }
    }
}

/// Request body for `POST /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplainRequest {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ExplainKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<WireChatMessage>>,
}

/// Response body: `{result}` on success, `{error}` otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainResponse {
    pub result: Option<String>,
    pub error: Option<String>,
}
