//! # gemma-server
//!
//! HTTP service around the gemma-serve generation orchestrator.
//!
//! One generation request becomes a *session*: a blocking engine worker on a
//! dedicated thread, bridged into an async SSE event stream, with
//! cancellation multiplexed through a process-wide registry and partial
//! output persisted incrementally to a remote message store.

pub mod error;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod server;
pub mod session;
pub mod sse;
pub mod state;

pub use error::ServerError;
pub use persistence::{HttpMessageStore, MessageStore, SessionSaver};
pub use registry::CancellationRegistry;
pub use server::{create_router, run_server};
pub use state::{AppState, ServerConfig};
