//! Server-Sent Events encoding for generation sessions.
//!
//! One event per SSE message, `data: {json}\n\n`, UTF-8, no buffering
//! beyond the event in hand — the encoder never reorders or coalesces.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::StreamExt;

use crate::models::GenerationEvent;

/// Render one SSE frame for an event.
pub fn encode_event(event: &GenerationEvent) -> String {
    // serialization of string-only fields cannot fail
    format!("data: {}\n\n", serde_json::to_string(event).unwrap())
}

/// Wrap a session's event stream as an SSE response.
pub fn sse_response<S>(
    events: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = GenerationEvent> + Send + 'static,
{
    let frames = events.map(|event| {
        Ok(Event::default().data(serde_json::to_string(&event).unwrap()))
    });
    Sse::new(frames).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_frame_shape() {
        let frame = encode_event(&GenerationEvent::Update {
            text: "Hello".to_string(),
            generation_id: "gen-1".to_string(),
        });
        assert_eq!(
            frame,
            "data: {\"type\":\"update\",\"text\":\"Hello\",\"generation_id\":\"gen-1\"}\n\n"
        );
    }

    #[test]
    fn complete_frame_shape() {
        let frame = encode_event(&GenerationEvent::Complete {
            text: "Hello world".to_string(),
            generation_id: "gen-1".to_string(),
        });
        assert!(frame.starts_with("data: {\"type\":\"complete\""));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn error_frame_uses_message_field() {
        let frame = encode_event(&GenerationEvent::Error {
            message: "Generation timed out.".to_string(),
            generation_id: "gen-1".to_string(),
        });
        assert!(frame.contains("\"message\":\"Generation timed out.\""));
        assert!(!frame.contains("\"text\""));
    }
}
