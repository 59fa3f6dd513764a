// src/main.rs

use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use arogya_backend::api::api_router;
use arogya_backend::config::ArogyaConfig;
use arogya_backend::llm::groq::GroqClient;
use arogya_backend::search::qdrant::QdrantProtocolSearch;
use arogya_backend::sessions::SessionStore;
use arogya_backend::state::AppState;
use arogya_backend::store::{sqlite::create_pool, SqliteDocumentStore};
use arogya_backend::triage::TriageOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ArogyaConfig::from_env();
    info!("Starting Arogya triage backend");
    info!("Model: {}", config.groq_model);

    let pool = create_pool(&config.database_url, config.sqlite_max_connections).await?;
    let store = Arc::new(SqliteDocumentStore::initialize(pool.clone()).await?);
    let sessions = SessionStore::initialize(pool).await?;

    let llm = Arc::new(GroqClient::new(&config)?);
    let search = Arc::new(QdrantProtocolSearch::new(
        config.qdrant_url.as_deref(),
        &config.protocols_collection,
        config.gemini_api_key.clone(),
    ));
    if config.qdrant_url.is_none() {
        info!("QDRANT_URL not set; protocol retrieval disabled");
    }

    let orchestrator = TriageOrchestrator::new(llm, search, sessions, &config);
    let app_state = Arc::new(AppState::new(config.clone(), orchestrator, store));

    let app = api_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
