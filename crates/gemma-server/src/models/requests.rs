//! Request bodies for the generation API.

use gemma_engine::ChatMessage;
use serde::Deserialize;

/// `POST /generate` request body.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Conversation so far; the last user message drives the generation.
    pub messages: Vec<ChatMessage>,
    /// Optional base64-encoded image attached to the last user message.
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Chat the assistant reply is persisted under.
    pub chat_id: i64,
    /// Caller-chosen generation id; a UUID is generated when absent.
    #[serde(default)]
    pub generation_id: Option<String>,
}

/// `POST /cancel` request body.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub generation_id: String,
}
