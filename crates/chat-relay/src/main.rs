use anyhow::Result;
use axum::{routing::get, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{error, info, warn};

use chat_relay::channel::{DiscordChannel, MessagingClient};
use chat_relay::config::{ServerConfig, Settings};
use chat_relay::handlers;
use chat_relay::services::session::OrchestratorConfig;
use chat_relay::services::{LlmService, SessionOrchestrator, SessionStore};

const INBOUND_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chat_relay=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Starting chat relay...");

    let settings = Settings::load()?;
    let system_message = settings.session.load_system_message()?;
    info!("Configuration loaded");

    let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);

    let discord = Arc::new(DiscordChannel::new(settings.discord.clone()));
    discord.init().await?;

    let store = Arc::new(SessionStore::new(settings.session.max_cache));
    let orchestrator = Arc::new(SessionOrchestrator::new(
        store.clone(),
        llm_service,
        discord.clone() as Arc<dyn MessagingClient>,
        OrchestratorConfig::from_settings(&settings, system_message),
    ));

    if settings.server.enabled {
        let server_config = settings.server.clone();
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_http(server_config, store).await {
                error!("HTTP server stopped: {:#}", e);
            }
        });
    }

    let (tx, mut rx) = mpsc::channel(INBOUND_BUFFER);
    let gateway = {
        let discord = discord.clone();
        tokio::spawn(async move { discord.run(tx).await })
    };

    info!("Listening for Discord messages");
    loop {
        tokio::select! {
            inbound = rx.recv() => {
                let Some(message) = inbound else {
                    warn!("Gateway listener exited");
                    break;
                };
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    let outcome = orchestrator.handle_message(&message).await;
                    tracing::debug!("Message {} -> {:?}", message.message_id, outcome);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    gateway.abort();
    Ok(())
}

async fn serve_http(config: ServerConfig, store: Arc<SessionStore>) -> Result<()> {
    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/stats", get(handlers::health::session_stats))
        .layer(Extension(store))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        );

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
