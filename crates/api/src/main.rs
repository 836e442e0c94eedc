use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use marquee_api::config::{ServerConfig, StoreKind};
use marquee_api::router::build_app_router;
use marquee_api::{background, state};
use marquee_db::memory::MemoryStore;
use marquee_db::{PgStore, Store};
use marquee_pipeline::encode::{self, WebpMuxEncoder};
use marquee_pipeline::now_playing::{HttpNowPlayingProbe, NowPlayingProbe};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_api=debug,marquee_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store,
        cadence_secs = config.generation.cadence.secs(),
        "Loaded server configuration"
    );

    // --- Store ---
    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set when STORE=postgres");

            let pool = marquee_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            marquee_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            marquee_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgStore::new(pool, config.generation.aligner()))
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store; content is lost on restart");
            Arc::new(MemoryStore::with_aligner(config.generation.aligner()))
        }
    };

    // --- Render directory ---
    tokio::fs::create_dir_all(&config.generation.render_dir)
        .await
        .expect("Failed to create render directory");

    // --- Placeholder ---
    let placeholder = config.static_dir.join("missing.webp");
    if encode::ensure_placeholder(&placeholder, config.generation.width, config.generation.height)
        .expect("Failed to write placeholder artifact")
    {
        tracing::info!(path = %placeholder.display(), "Placeholder artifact written");
    }

    // --- Now-playing probe ---
    let probe: Option<Arc<dyn NowPlayingProbe>> = match &config.now_playing_token {
        Some(token) => {
            tracing::info!(url = %config.now_playing_url, "Now-playing probe enabled");
            Some(Arc::new(HttpNowPlayingProbe::new(
                config.now_playing_url.clone(),
                token.clone(),
            )))
        }
        None => {
            tracing::info!("NOW_PLAYING_TOKEN not set, now-playing probe disabled");
            None
        }
    };

    // --- App state ---
    let state = AppState::new(
        Arc::clone(&store),
        config.clone(),
        Arc::new(WebpMuxEncoder::default()),
        probe,
    );

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let retention_handle = tokio::spawn(background::retention::run(
        Arc::clone(&store),
        config.generation.render_dir.clone(),
        config.retention(),
        cancel.clone(),
    ));

    let schedule_handle = config.generate_interval_secs.map(|secs| {
        tokio::spawn(background::generation_schedule::run(
            state.orchestrator.clone(),
            Duration::from_secs(secs),
            cancel.clone(),
        ))
    });

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    if let Some(handle) = schedule_handle {
        // A pass in flight finishes and releases its lock before this returns.
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
