//! Token bridge between a blocking generation worker and an async consumer.
//!
//! The worker thread holds a [`TokenSink`] and pushes deltas with plain
//! blocking sends; the async side holds a [`TokenStream`] and awaits
//! [`TokenStream::next`], which runs the blocking `recv_timeout` under
//! [`tokio::task::spawn_blocking`]. The event-loop thread is only ever
//! briefly occupied.
//!
//! The bridge is single-producer/single-consumer and not restartable: after
//! a fault, timeout, or end-of-stream, every subsequent pull returns
//! [`StreamItem::Eos`].

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// How long the consumer waits for the next delta before declaring the
/// generation timed out.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

enum WorkerMessage {
    Delta(String),
    Fault(String),
}

/// Create a bounded token channel. `capacity` applies backpressure to the
/// worker; `idle_timeout` bounds how long the consumer waits per pull.
pub fn token_channel(capacity: usize, idle_timeout: Duration) -> (TokenSink, TokenStream) {
    let (tx, rx) = bounded(capacity);
    (
        TokenSink { tx },
        TokenStream {
            rx: Some(rx),
            idle_timeout,
        },
    )
}

/// Producer half, held by the generation worker thread.
///
/// Dropping the sink (and all clones) signals end-of-stream.
#[derive(Clone)]
pub struct TokenSink {
    tx: Sender<WorkerMessage>,
}

impl TokenSink {
    /// Push a text delta. Returns `false` once the consumer is gone, which
    /// the worker should treat as a request to stop generating.
    pub fn send(&self, delta: impl Into<String>) -> bool {
        self.tx.send(WorkerMessage::Delta(delta.into())).is_ok()
    }

    /// Report a fault from inside the worker. The consumer surfaces it as a
    /// terminal [`StreamItem::Fault`].
    pub fn fault(&self, message: impl Into<String>) {
        let _ = self.tx.send(WorkerMessage::Fault(message.into()));
    }
}

/// One pull from the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// The next text delta.
    Delta(String),
    /// The worker reported an error; no further deltas follow.
    Fault(String),
    /// Natural end-of-stream (worker finished and dropped its sink).
    Eos,
    /// No delta arrived within the idle timeout.
    TimedOut,
}

/// Consumer half. Single-consumer: `next` takes `&mut self`.
pub struct TokenStream {
    rx: Option<Receiver<WorkerMessage>>,
    idle_timeout: Duration,
}

impl TokenStream {
    /// Await the next delta, end-of-stream, fault, or timeout.
    ///
    /// The receiver moves into the blocking pool for the duration of the
    /// wait and is only restored on a successful delta, so terminal pulls
    /// leave the stream exhausted.
    pub async fn next(&mut self) -> StreamItem {
        let Some(rx) = self.rx.take() else {
            return StreamItem::Eos;
        };
        let timeout = self.idle_timeout;
        let joined = tokio::task::spawn_blocking(move || {
            let item = rx.recv_timeout(timeout);
            (rx, item)
        })
        .await;

        match joined {
            Ok((rx, Ok(WorkerMessage::Delta(delta)))) => {
                self.rx = Some(rx);
                StreamItem::Delta(delta)
            }
            Ok((_, Ok(WorkerMessage::Fault(message)))) => StreamItem::Fault(message),
            Ok((_, Err(RecvTimeoutError::Timeout))) => StreamItem::TimedOut,
            Ok((_, Err(RecvTimeoutError::Disconnected))) => StreamItem::Eos,
            Err(join_error) => StreamItem::Fault(format!("token bridge wait failed: {join_error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deltas_then_eos() {
        let (sink, mut stream) = token_channel(8, DEFAULT_IDLE_TIMEOUT);
        assert!(sink.send("Hello "));
        assert!(sink.send("world"));
        drop(sink);

        assert_eq!(stream.next().await, StreamItem::Delta("Hello ".into()));
        assert_eq!(stream.next().await, StreamItem::Delta("world".into()));
        assert_eq!(stream.next().await, StreamItem::Eos);
        // exhausted streams stay exhausted
        assert_eq!(stream.next().await, StreamItem::Eos);
    }

    #[tokio::test]
    async fn idle_timeout_surfaces_then_exhausts() {
        let (sink, mut stream) = token_channel(8, Duration::from_millis(20));
        assert_eq!(stream.next().await, StreamItem::TimedOut);
        // late sends after a timeout are never observed
        sink.send("too late");
        assert_eq!(stream.next().await, StreamItem::Eos);
    }

    #[tokio::test]
    async fn fault_is_terminal() {
        let (sink, mut stream) = token_channel(8, DEFAULT_IDLE_TIMEOUT);
        sink.send("partial");
        sink.fault("backend exploded");
        assert_eq!(stream.next().await, StreamItem::Delta("partial".into()));
        assert_eq!(
            stream.next().await,
            StreamItem::Fault("backend exploded".into())
        );
        assert_eq!(stream.next().await, StreamItem::Eos);
    }

    #[tokio::test]
    async fn send_fails_after_consumer_drops() {
        let (sink, stream) = token_channel(1, DEFAULT_IDLE_TIMEOUT);
        drop(stream);
        assert!(!sink.send("ignored"));
    }
}
