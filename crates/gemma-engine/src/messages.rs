//! Chat message model and multimodal input normalization.
//!
//! Message content is either a plain string or a structured list of parts,
//! mirroring the JSON accepted by multimodal chat templates. When a request
//! carries an image, the most recent user message must reference it with an
//! image part (or the `<image>` placeholder in plain text) — otherwise the
//! template would silently drop the image.

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Marker a plain-text user message uses to reference the attached image.
pub const IMAGE_PLACEHOLDER: &str = "<image>";

/// A chat message: role plus plain or structured content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Message content: `"content": "hi"` or `"content": [{"type": ...}, ...]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to prompt text; image parts render as the placeholder.
    pub fn as_prompt_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Image => IMAGE_PLACEHOLDER.to_string(),
                    ContentPart::Text { text } => text.clone(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One element of structured message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Image,
    Text { text: String },
}

/// Ensure the most recent user message references the attached image.
///
/// Scans from the end of the list, rewrites the first user message found,
/// and stops: plain text lacking the placeholder becomes
/// `[image, text]` parts; a part list lacking an image part gets one
/// inserted at the front. Applies at most once per request.
pub fn attach_image_placeholder(messages: &mut [ChatMessage]) {
    for message in messages.iter_mut().rev() {
        if message.role != "user" {
            continue;
        }
        match &mut message.content {
            MessageContent::Text(text) => {
                if !text.contains(IMAGE_PLACEHOLDER) {
                    let text = std::mem::take(text);
                    message.content =
                        MessageContent::Parts(vec![ContentPart::Image, ContentPart::Text { text }]);
                }
            }
            MessageContent::Parts(parts) => {
                if !parts.iter().any(|part| matches!(part, ContentPart::Image)) {
                    parts.insert(0, ContentPart::Image);
                }
            }
        }
        break;
    }
}

/// Render a transcript into a single prompt string, one `role: content`
/// line per message.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content.as_prompt_text()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode a base64 image payload.
pub fn decode_image(image_base64: &str) -> Result<Vec<u8>> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD
        .decode(image_base64)
        .map_err(|e| EngineError::InputPreparation(format!("invalid base64 image: {e}")))
}
