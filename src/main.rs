use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnup_auth::common::auth_factory::{create_auth_services, create_token_codec};
use learnup_auth::common::config::AppConfig;
use learnup_auth::common::db::create_database_pool;
use learnup_auth::common::di::AppState;
use learnup_auth::infrastructure::repositories::SessionPgRepository;
use learnup_auth::infrastructure::services::expiry_sweeper::ExpirySweeper;
use learnup_auth::infrastructure::services::session_event_notifier::BroadcastSessionNotifier;
use learnup_auth::interfaces::create_api_routes;

/// LearnUp auth - session and token lifecycle service
///
/// Issues and rotates token pairs, keeps the access-token blacklist and
/// validates every protected request. The layers follow the usual
/// hexagonal split:
///
/// - Domain Layer: entities, repository traits, token codec (domain/*)
/// - Application Layer: session manager, revocation cache, validation pipeline (application/*)
/// - Infrastructure Layer: PostgreSQL adapters and background jobs (infrastructure/*)
/// - Interface Layer: axum middleware and `/api/auth` handlers (interfaces/*)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = AppConfig::from_env();

    // Weak secrets and unusable lifetimes abort before any connection is opened
    let token_codec = create_token_codec(&config.auth)
        .context("Configuración de autenticación inválida")?;

    let pool = Arc::new(create_database_pool(&config).await?);
    tracing::info!("PostgreSQL database pool initialized successfully");

    // Session notifications fan out to whoever subscribes; the logger is the default subscriber
    let notifier = Arc::new(BroadcastSessionNotifier::new(256));
    let _session_logger = notifier.spawn_logger();

    let auth = create_auth_services(&config.auth, token_codec, pool.clone(), notifier.clone())
        .await
        .context("No se pudieron inicializar los servicios de autenticación")?;
    tracing::info!("Authentication system initialized successfully");

    // Background cleanup of expired sessions, tokens and blacklist entries
    let shutdown = CancellationToken::new();
    let sweeper = Arc::new(ExpirySweeper::new(
        Arc::new(SessionPgRepository::new(pool.clone())),
        auth.revocation_cache.clone(),
        config.auth.revoked_retention_days,
        &config.sweeper,
    ));
    let sweeper_handle = sweeper.start(shutdown.clone());

    let app_state = Arc::new(AppState::new(auth, config.cookies.clone()).with_database(pool));
    let app = create_api_routes(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("Dirección del servidor inválida")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting LearnUp auth server on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        tracing::error!("Expiry sweeper ended abnormally: {}", e);
    }

    tracing::info!("Server shutdown completed");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
