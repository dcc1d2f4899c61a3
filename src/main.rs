use std::net::SocketAddr;
use std::sync::Arc;

use rag_chatbot::api::{create_router, AppState};
use rag_chatbot::infrastructure::{embedder_from_config, AnthropicLlm, AppConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=debug,rag_chatbot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let storage = &config.config.storage;
    std::fs::create_dir_all(&storage.data_dir)?;
    std::fs::create_dir_all(&storage.docs_dir)?;
    if let Some(parent) = storage.index_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let embedder = embedder_from_config(&config.config.embedding);
    let llm = Arc::new(AnthropicLlm::from_config(&config.config.llm));
    info!(
        embedding_model = %config.config.embedding.model,
        llm_model = %config.config.llm.model,
        "providers initialized"
    );

    let server = config.config.server.clone();
    let state = AppState::build(config, embedder, llm)?;
    info!(records = state.rag_service.vector_store().len().await, "vector store loaded");

    let app = create_router(state);
    let addr = SocketAddr::new(server.host.parse()?, server.port);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
