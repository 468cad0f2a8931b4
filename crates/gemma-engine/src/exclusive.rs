//! Serialization wrapper for engines that cannot run concurrent generations.
//!
//! Most real backends share one set of model weights and one execution
//! context, so only a single generation may run at a time. [`Exclusive`]
//! makes that constraint explicit: worker threads queue on a mutex gate
//! around `generate`. This is the throughput ceiling of a single-context
//! deployment — it lives here, visibly, rather than hidden inside the
//! orchestrator.

use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::{ChatMessage, EngineInputs, GenerationEngine, Result, TokenSink};

/// Wraps any engine and serializes `generate` calls.
pub struct Exclusive<E> {
    inner: E,
    gate: Mutex<()>,
}

impl<E> Exclusive<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

impl<E: GenerationEngine> GenerationEngine for Exclusive<E> {
    fn prepare_inputs(
        &self,
        messages: &[ChatMessage],
        image_base64: Option<&str>,
    ) -> Result<EngineInputs> {
        // input preparation has no shared execution context; no gate needed
        self.inner.prepare_inputs(messages, image_base64)
    }

    fn generate(
        &self,
        inputs: EngineInputs,
        cancel: CancellationToken,
        sink: TokenSink,
    ) -> Result<()> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.generate(inputs, cancel, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_channel;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Trips if two generate calls ever overlap.
    struct OverlapDetector {
        busy: AtomicBool,
    }

    impl GenerationEngine for OverlapDetector {
        fn prepare_inputs(
            &self,
            _messages: &[ChatMessage],
            _image_base64: Option<&str>,
        ) -> Result<EngineInputs> {
            Ok(EngineInputs {
                prompt: String::new(),
                image: None,
            })
        }

        fn generate(
            &self,
            _inputs: EngineInputs,
            _cancel: CancellationToken,
            sink: TokenSink,
        ) -> Result<()> {
            assert!(
                !self.busy.swap(true, Ordering::SeqCst),
                "generate calls overlapped"
            );
            std::thread::sleep(Duration::from_millis(20));
            sink.send("token");
            self.busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn concurrent_generates_are_serialized() {
        let engine = Arc::new(Exclusive::new(OverlapDetector {
            busy: AtomicBool::new(false),
        }));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let (sink, _stream) = token_channel(8, Duration::from_secs(1));
                    let inputs = EngineInputs {
                        prompt: String::new(),
                        image: None,
                    };
                    engine.generate(inputs, CancellationToken::new(), sink)
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    }
}
