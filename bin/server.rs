// Wellness Chat - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wellness_chat::api::{router, AppState};
use wellness_chat::translation::from_config;
use wellness_chat::{setup_database, AppConfig, ChatEngine, KnowledgeBase};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db_path = Path::new(&config.database.path);
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    setup_database(&conn)?;

    let knowledge = KnowledgeBase::load(&conn)?;
    if knowledge.is_empty() {
        tracing::warn!("knowledge base is empty, run `wellness-chat import` to load questions");
    }

    // blocking HTTP client; must be built before the runtime starts
    let translator = from_config(&config.translation)?;
    let engine = ChatEngine::new(&config, translator)?;

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        knowledge: Arc::new(knowledge),
        engine: Arc::new(engine),
        auth: config.auth.clone(),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(state, &config.server.bind_addr))
}

async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!(addr = bind_addr, version = wellness_chat::VERSION, "wellness chat server listening");
    tracing::info!("  POST /chat                     - ask a question");
    tracing::info!("  GET  /api/history/:username    - recent turns");
    tracing::info!("  POST /api/register | /api/login | /api/reset-password");
    tracing::info!("  GET  /api/tips/:category       - wellness tip");

    axum::serve(listener, app).await?;
    Ok(())
}
