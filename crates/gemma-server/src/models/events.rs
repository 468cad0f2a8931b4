//! Typed session events and their wire encoding.

use serde::{Deserialize, Serialize};

/// One event in a generation session's stream.
///
/// Serializes to the SSE payload shapes directly:
/// `{"type":"update","text":...,"generation_id":...}` and so on. `text` is
/// the *full* accumulated text at emission time, never a delta, so events
/// for one session are prefix-extensions of each other and a lost frame
/// costs the client nothing but latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Update {
        text: String,
        generation_id: String,
    },
    Complete {
        text: String,
        generation_id: String,
    },
    Error {
        message: String,
        generation_id: String,
    },
}

impl GenerationEvent {
    /// Complete and Error are terminal: nothing follows them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Update { .. })
    }
}
