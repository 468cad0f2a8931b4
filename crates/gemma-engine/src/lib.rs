//! # gemma-engine
//!
//! The "narrow waist" of the gemma-serve stack. Defines the core
//! [`GenerationEngine`] trait and associated types that the server and runtime
//! crates depend on. Implementations can swap backends (mock, GPU, FFI)
//! without changing orchestration code.
//!
//! ## Design Notes
//!
//! ### Blocking producer, async consumer
//! `GenerationEngine::generate` is a *blocking* call: it runs on a dedicated
//! worker thread spawned by the caller and pushes text deltas into a
//! [`TokenSink`]. The async side pulls from the matching [`TokenStream`],
//! which offloads the blocking wait to the runtime's blocking pool so an
//! event-loop thread is never parked. See [`bridge`].
//!
//! ### Cooperative cancellation
//! Engines receive a `CancellationToken` and must poll it between generation
//! steps. Cancellation is never forced; a signaled token is a request to stop
//! promptly, not a kill switch.

pub mod bridge;
pub mod exclusive;
pub mod messages;

pub use bridge::{token_channel, StreamItem, TokenSink, TokenStream, DEFAULT_IDLE_TIMEOUT};
pub use exclusive::Exclusive;
pub use messages::{ChatMessage, ContentPart, MessageContent, IMAGE_PLACEHOLDER};

use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Input preparation failed: {0}")]
    InputPreparation(String),
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Fully prepared inputs for one generation: the rendered prompt and an
/// optional decoded image.
#[derive(Debug, Clone)]
pub struct EngineInputs {
    pub prompt: String,
    pub image: Option<Vec<u8>>,
}

/// The core engine trait — the orchestrator depends on *engine behavior*,
/// not implementation details.
///
/// `generate` blocks until the generation finishes, faults, or observes the
/// cancellation token. It must also stop if [`TokenSink::send`] reports the
/// consumer gone (client disconnected).
pub trait GenerationEngine: Send + Sync {
    /// Convert a chat transcript and optional base64 image into engine inputs.
    fn prepare_inputs(
        &self,
        messages: &[ChatMessage],
        image_base64: Option<&str>,
    ) -> Result<EngineInputs>;

    /// Produce text deltas into `sink` until done, cancelled, or faulted.
    ///
    /// Runs on a dedicated worker thread; the thread is released when this
    /// returns. End-of-stream is signaled by dropping `sink`.
    fn generate(
        &self,
        inputs: EngineInputs,
        cancel: CancellationToken,
        sink: TokenSink,
    ) -> Result<()>;
}
