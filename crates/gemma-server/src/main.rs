use std::sync::Arc;

use gemma_engine::GenerationEngine;
use gemma_runtime::MockEngine;
use gemma_server::{
    run_server, AppState, CancellationRegistry, HttpMessageStore, MessageStore, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Engine backend. MockEngine handles concurrent sessions; wrap a real
    // single-context backend in gemma_engine::Exclusive instead.
    let engine: Arc<dyn GenerationEngine> = Arc::new(MockEngine::new());

    // Remote message store for partial-output persistence
    let store_url = std::env::var("MESSAGE_STORE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8001/db".to_string());
    let store: Arc<dyn MessageStore> = Arc::new(HttpMessageStore::new(store_url));

    let state = AppState {
        engine,
        store,
        registry: Arc::new(CancellationRegistry::new()),
        config: ServerConfig::default(),
    };

    let addr = "0.0.0.0:8000".parse()?;
    tracing::info!("Starting server on {}", addr);

    run_server(state, addr).await?;
    Ok(())
}
