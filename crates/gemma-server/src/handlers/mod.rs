//! HTTP request handlers for API endpoints.

pub mod cancel;
pub mod generate;
pub mod health;

pub use cancel::handle_cancel;
pub use generate::handle_generate;
pub use health::handle_health;
