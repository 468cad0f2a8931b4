//! Generation session lifecycle.
//!
//! One session bridges a blocking engine worker to an async event stream:
//! the worker pushes deltas through the token bridge, the session appends
//! them to the accumulated text, emits `Update` events, forwards snapshots
//! to the persistence saver, and settles into exactly one terminal state.
//!
//! Terminal behavior:
//! - natural end-of-stream → `Completed`, one `Complete` event;
//! - cancellation (before or mid-stream) → `Cancelled`, one `Complete`
//!   event carrying the text accumulated so far — a cancelled answer is
//!   still a usable answer;
//! - idle timeout → `TimedOut`, one `Error` event, no `Complete`;
//! - input preparation or engine fault → `Errored`, one `Error` event.
//!
//! Every terminal transition cancels the session token (so the worker
//! thread stops even on success), unregisters from the cancellation
//! registry, and hands the saver its final snapshot. If the client
//! disconnects instead, the stream is dropped mid-poll: [`SessionGuard`]
//! performs the same cleanup from `Drop`, and the saver's detached writer
//! task still performs the final flush.

use std::sync::Arc;
use std::thread;

use futures::stream::Stream;
use gemma_engine::{messages, token_channel, StreamItem};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{GenerateRequest, GenerationEvent};
use crate::persistence::SessionSaver;
use crate::registry::{CancellationRegistry, DuplicateSession};
use crate::state::AppState;

/// Session lifecycle states. `Running` is the initial state; all others are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Completed,
    TimedOut,
    Errored,
    Cancelled,
}

/// Cleans up a session when its event stream is dropped without reaching a
/// terminal transition (client disconnect). The normal path calls
/// [`SessionGuard::complete`] instead, which unregisters synchronously.
struct SessionGuard {
    generation_id: String,
    cancel: CancellationToken,
    registry: Arc<CancellationRegistry>,
    disarmed: bool,
}

impl SessionGuard {
    async fn complete(mut self) {
        self.disarmed = true;
        self.cancel.cancel();
        self.registry.unregister(&self.generation_id).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        // Signal the worker thread to stop, then remove the registry entry
        // from a spawned task (Drop cannot await).
        self.cancel.cancel();
        let registry = Arc::clone(&self.registry);
        let id = self.generation_id.clone();
        tokio::spawn(async move {
            registry.unregister(&id).await;
        });
    }
}

/// Start a generation session and return its event stream.
///
/// Registers the generation id (caller-chosen or a fresh UUID) before any
/// work begins, so `/cancel` can reach the session from its first moment.
/// Input preparation failures surface as an `Error` event on the stream,
/// not as an HTTP error: by the time they can occur the id is live.
pub async fn run_generation(
    state: AppState,
    request: GenerateRequest,
) -> Result<impl Stream<Item = GenerationEvent>, DuplicateSession> {
    let generation_id = request
        .generation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cancel = state.registry.register(&generation_id).await?;
    tracing::info!(%generation_id, chat_id = request.chat_id, "generation session started");
    Ok(stream_events(state, request, generation_id, cancel))
}

fn stream_events(
    state: AppState,
    request: GenerateRequest,
    generation_id: String,
    cancel: CancellationToken,
) -> impl Stream<Item = GenerationEvent> {
    let AppState {
        engine,
        store,
        registry,
        config,
    } = state;
    let GenerateRequest {
        mut messages,
        image_base64,
        chat_id,
        ..
    } = request;

    async_stream::stream! {
        let guard = SessionGuard {
            generation_id: generation_id.clone(),
            cancel: cancel.clone(),
            registry,
            disarmed: false,
        };
        let saver = SessionSaver::spawn(store, chat_id, config.save_threshold);
        let mut accumulated = String::new();
        let mut state = SessionState::Running;

        // Input preparation: make sure the last user message references the
        // image, then hand the transcript to the engine.
        if image_base64.is_some() {
            messages::attach_image_placeholder(&mut messages);
        }
        let inputs = match engine.prepare_inputs(&messages, image_base64.as_deref()) {
            Ok(inputs) => Some(inputs),
            Err(error) => {
                tracing::warn!(%generation_id, %error, "input preparation failed");
                state = SessionState::Errored;
                yield GenerationEvent::Error {
                    message: error.to_string(),
                    generation_id: generation_id.clone(),
                };
                None
            }
        };

        if let Some(inputs) = inputs {
            let worker_engine = Arc::clone(&engine);
            let worker_cancel = cancel.clone();
            let (sink, mut tokens) = token_channel(config.token_buffer, config.idle_timeout);
            let spawned = thread::Builder::new()
                .name(format!("generation-{generation_id}"))
                .spawn(move || {
                    if let Err(error) = worker_engine.generate(inputs, worker_cancel, sink.clone()) {
                        sink.fault(error.to_string());
                    }
                });

            match spawned {
                Err(error) => {
                    state = SessionState::Errored;
                    yield GenerationEvent::Error {
                        message: format!("failed to start generation worker: {error}"),
                        generation_id: generation_id.clone(),
                    };
                }
                Ok(_worker) => loop {
                    match tokens.next().await {
                        StreamItem::Delta(delta) => {
                            accumulated.push_str(&delta);
                            saver.on_update(&accumulated);
                            yield GenerationEvent::Update {
                                text: accumulated.clone(),
                                generation_id: generation_id.clone(),
                            };
                            // cancellation check runs after the delta is
                            // forwarded: the partial answer is never dropped
                            if cancel.is_cancelled() {
                                state = SessionState::Cancelled;
                                yield GenerationEvent::Complete {
                                    text: accumulated.clone(),
                                    generation_id: generation_id.clone(),
                                };
                                break;
                            }
                        }
                        StreamItem::Eos => {
                            // a token cancelled before the first delta still
                            // ends the stream here, as Cancelled
                            state = if cancel.is_cancelled() {
                                SessionState::Cancelled
                            } else {
                                SessionState::Completed
                            };
                            yield GenerationEvent::Complete {
                                text: accumulated.clone(),
                                generation_id: generation_id.clone(),
                            };
                            break;
                        }
                        StreamItem::TimedOut => {
                            state = SessionState::TimedOut;
                            yield GenerationEvent::Error {
                                message: "Generation timed out.".to_string(),
                                generation_id: generation_id.clone(),
                            };
                            break;
                        }
                        StreamItem::Fault(message) => {
                            state = SessionState::Errored;
                            yield GenerationEvent::Error {
                                message,
                                generation_id: generation_id.clone(),
                            };
                            break;
                        }
                    }
                },
            }
        }

        // Unconditional cleanup: final persistence snapshot, worker told to
        // stop, registry entry removed.
        saver.on_terminal(&accumulated);
        guard.complete().await;
        tracing::info!(
            %generation_id,
            ?state,
            chars = accumulated.len(),
            "generation session finished"
        );
    }
}
