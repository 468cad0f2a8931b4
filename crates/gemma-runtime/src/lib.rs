//! # gemma-runtime
//!
//! Runtime engine backends. Currently ships [`MockEngine`], an in-process
//! scriptable engine used by the server binary and by orchestration tests.
//! Real model backends implement the same [`GenerationEngine`] trait.

use std::time::Duration;

use gemma_engine::{
    messages, ChatMessage, EngineError, EngineInputs, GenerationEngine, Result, TokenSink,
};
use tokio_util::sync::CancellationToken;

/// Poll interval while a stalled script waits for cancellation.
const STALL_POLL: Duration = Duration::from_millis(5);

/// A scriptable engine that emits a canned delta sequence.
///
/// Supports concurrent generations (no shared mutable state), so it does not
/// need the [`gemma_engine::Exclusive`] wrapper. Scripts can inject a fault
/// or an indefinite stall at a given delta index to exercise the
/// orchestrator's error and timeout paths.
pub struct MockEngine {
    deltas: Vec<String>,
    delay: Duration,
    fault_after: Option<(usize, String)>,
    stall_after: Option<usize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            deltas: "The quick brown fox jumps over the lazy dog. "
                .split_inclusive(' ')
                .map(str::to_string)
                .collect(),
            delay: Duration::from_millis(10),
            fault_after: None,
            stall_after: None,
        }
    }

    /// Replace the canned delta script.
    pub fn with_deltas<I, S>(mut self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deltas = deltas.into_iter().map(Into::into).collect();
        self
    }

    /// Sleep between deltas (zero for deterministic tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail with an inference error instead of emitting delta `index`.
    pub fn fault_after(mut self, index: usize, message: impl Into<String>) -> Self {
        self.fault_after = Some((index, message.into()));
        self
    }

    /// Go idle instead of emitting delta `index`, until cancelled. Drives
    /// the consumer into its idle-timeout path.
    pub fn stall_after(mut self, index: usize) -> Self {
        self.stall_after = Some(index);
        self
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationEngine for MockEngine {
    fn prepare_inputs(
        &self,
        messages: &[ChatMessage],
        image_base64: Option<&str>,
    ) -> Result<EngineInputs> {
        if messages.is_empty() {
            return Err(EngineError::InputPreparation(
                "message list is empty".to_string(),
            ));
        }
        let prompt = messages::render_transcript(messages);
        let image = image_base64.map(messages::decode_image).transpose()?;
        Ok(EngineInputs { prompt, image })
    }

    fn generate(
        &self,
        _inputs: EngineInputs,
        cancel: CancellationToken,
        sink: TokenSink,
    ) -> Result<()> {
        for (index, delta) in self.deltas.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!("mock generation cancelled at delta {index}");
                return Ok(());
            }
            if let Some((fault_index, message)) = &self.fault_after {
                if index == *fault_index {
                    return Err(EngineError::Inference(message.clone()));
                }
            }
            if self.stall_after == Some(index) {
                while !cancel.is_cancelled() {
                    std::thread::sleep(STALL_POLL);
                }
                return Ok(());
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if !sink.send(delta.clone()) {
                // consumer gone; nothing left to generate for
                return Ok(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemma_engine::{token_channel, StreamItem};

    fn inputs() -> EngineInputs {
        EngineInputs {
            prompt: "user: hi".to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn emits_script_in_order() {
        let engine = MockEngine::new()
            .with_deltas(["A", "B", "C"])
            .with_delay(Duration::ZERO);
        let (sink, mut stream) = token_channel(8, Duration::from_secs(1));

        std::thread::spawn(move || engine.generate(inputs(), CancellationToken::new(), sink));

        assert_eq!(stream.next().await, StreamItem::Delta("A".into()));
        assert_eq!(stream.next().await, StreamItem::Delta("B".into()));
        assert_eq!(stream.next().await, StreamItem::Delta("C".into()));
        assert_eq!(stream.next().await, StreamItem::Eos);
    }

    #[test]
    fn pre_cancelled_token_emits_nothing() {
        let engine = MockEngine::new().with_delay(Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (sink, stream) = token_channel(64, Duration::from_secs(1));
        engine.generate(inputs(), cancel, sink).unwrap();
        drop(stream);
    }

    #[test]
    fn fault_script_returns_error() {
        let engine = MockEngine::new()
            .with_deltas(["A", "B"])
            .with_delay(Duration::ZERO)
            .fault_after(1, "synthetic failure");
        let (sink, _stream) = token_channel(8, Duration::from_secs(1));
        let err = engine
            .generate(inputs(), CancellationToken::new(), sink)
            .unwrap_err();
        assert!(matches!(err, EngineError::Inference(_)));
    }

    #[test]
    fn prepare_inputs_rejects_empty_transcript() {
        let err = MockEngine::new().prepare_inputs(&[], None).unwrap_err();
        assert!(matches!(err, EngineError::InputPreparation(_)));
    }

    #[test]
    fn prepare_inputs_rejects_bad_image() {
        let messages = [ChatMessage::user("hello")];
        let err = MockEngine::new()
            .prepare_inputs(&messages, Some("@@@"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InputPreparation(_)));
    }
}
