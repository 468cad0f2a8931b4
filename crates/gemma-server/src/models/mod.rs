//! Request/response and event types for the generation API.

pub mod events;
pub mod requests;

pub use events::GenerationEvent;
pub use requests::{CancelRequest, GenerateRequest};
