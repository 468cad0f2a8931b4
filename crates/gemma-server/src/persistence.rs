//! Incremental persistence of partial generation output.
//!
//! Each session gets a [`SessionSaver`]: a detached writer task that owns
//! the persistence cursor (remote message id + last saved snapshot) and
//! receives full-text snapshots over an unbounded queue. Enqueueing never
//! blocks the token stream, flushes for one session are serialized by the
//! single writer, and because the task's lifetime is independent of the
//! request task, the final flush survives client disconnects and stream
//! teardown.
//!
//! Persistence is best-effort: a failed flush is logged and the cursor left
//! unchanged, so the next flush carries the whole unsaved delta
//! (at-least-once, self-healing). Failures never abort the generation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Character growth since the last save required to trigger a non-final
/// flush.
pub const DEFAULT_SAVE_THRESHOLD: usize = 150;

/// Handle to a message row in the remote store.
pub type MessageId = i64;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("message store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("message store returned status {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

/// The remote message store, as the orchestrator sees it.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create a message under a chat; returns the new message's id.
    async fn create_message(
        &self,
        chat_id: i64,
        role: &str,
        content: &str,
    ) -> Result<MessageId, PersistenceError>;

    /// Replace the content of an existing message.
    async fn update_message(
        &self,
        message_id: MessageId,
        content: &str,
    ) -> Result<(), PersistenceError>;
}

/// REST client for the message store service.
pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageStore {
    /// `base_url` is the store's API root, e.g. `http://127.0.0.1:8001/db`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn create_message(
        &self,
        chat_id: i64,
        role: &str,
        content: &str,
    ) -> Result<MessageId, PersistenceError> {
        let response = self
            .client
            .post(format!("{}/chats/{}/messages", self.base_url, chat_id))
            .json(&serde_json::json!({ "role": role, "content": content }))
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::CREATED {
            return Err(PersistenceError::UnexpectedStatus(response.status()));
        }
        Ok(response.json::<MessageId>().await?)
    }

    async fn update_message(
        &self,
        message_id: MessageId,
        content: &str,
    ) -> Result<(), PersistenceError> {
        let response = self
            .client
            .patch(format!("{}/messages/{}", self.base_url, message_id))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PersistenceError::UnexpectedStatus(response.status()));
        }
        Ok(())
    }
}

/// Where the session's output stands in the remote store.
struct PersistenceCursor {
    message_id: Option<MessageId>,
    last_saved: String,
    threshold: usize,
}

impl PersistenceCursor {
    fn new(threshold: usize) -> Self {
        Self {
            message_id: None,
            last_saved: String::new(),
            threshold,
        }
    }

    fn should_flush(&self, text: &str) -> bool {
        text.len().saturating_sub(self.last_saved.len()) >= self.threshold
    }

    fn needs_final(&self, text: &str) -> bool {
        !text.is_empty() && text != self.last_saved
    }

    /// Create-then-update upsert. First successful flush records the remote
    /// message id; later flushes address it. A failure leaves the cursor
    /// unchanged so the next attempt carries the full unsaved delta.
    async fn flush(&mut self, store: &dyn MessageStore, chat_id: i64, text: &str) {
        let result = match self.message_id {
            None => store
                .create_message(chat_id, "assistant", text)
                .await
                .map(|id| self.message_id = Some(id)),
            Some(id) => store.update_message(id, text).await,
        };
        match result {
            Ok(()) => {
                self.last_saved = text.to_string();
                tracing::debug!(chat_id, chars = text.len(), "flushed partial output");
            }
            Err(error) => {
                tracing::warn!(%error, chat_id, "message store flush failed; will retry at next flush point");
            }
        }
    }
}

enum SaveSignal {
    Update(String),
    Terminal(String),
}

/// Per-session persistence throttler.
pub struct SessionSaver {
    tx: mpsc::UnboundedSender<SaveSignal>,
    task: JoinHandle<()>,
}

impl SessionSaver {
    /// Spawn the writer task for one session.
    pub fn spawn(store: Arc<dyn MessageStore>, chat_id: i64, threshold: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(writer_loop(store, chat_id, threshold, rx));
        Self { tx, task }
    }

    /// Forward the full accumulated text after an Update event. Never
    /// blocks; the writer decides whether this snapshot crosses the
    /// threshold.
    pub fn on_update(&self, full_text: &str) {
        let _ = self.tx.send(SaveSignal::Update(full_text.to_string()));
    }

    /// Forward the final accumulated text at a terminal transition. The
    /// writer performs the guaranteed final flush and exits.
    pub fn on_terminal(&self, full_text: &str) {
        let _ = self.tx.send(SaveSignal::Terminal(full_text.to_string()));
    }

    /// Wait for the writer to drain and exit. Production code just drops the
    /// handle (the detached task finishes on its own); tests use this to
    /// observe flush completion deterministically.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

async fn writer_loop(
    store: Arc<dyn MessageStore>,
    chat_id: i64,
    threshold: usize,
    mut rx: mpsc::UnboundedReceiver<SaveSignal>,
) {
    let mut cursor = PersistenceCursor::new(threshold);
    let mut latest = String::new();

    while let Some(signal) = rx.recv().await {
        match signal {
            SaveSignal::Update(text) => {
                latest = text;
                if cursor.should_flush(&latest) {
                    cursor.flush(store.as_ref(), chat_id, &latest).await;
                }
            }
            SaveSignal::Terminal(text) => {
                latest = text;
                if cursor.needs_final(&latest) {
                    cursor.flush(store.as_ref(), chat_id, &latest).await;
                }
                return;
            }
        }
    }

    // The handle was dropped without a terminal signal (client disconnect
    // tore the session down mid-stream). Flush whatever we last saw.
    if cursor.needs_final(&latest) {
        cursor.flush(store.as_ref(), chat_id, &latest).await;
    }
}
