use anyhow::{Context, Result};
use facegate_store::ProfileStore;
use facegated::engine::spawn_engine;
use facegated::{routes, AppState, Config, MatchService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facegated=info,facegate_store=info,tower_http=info".into()),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facegated starting");

    let config = Config::from_env();
    config.validate()?;
    tracing::info!(
        model_dir = %config.model_dir.display(),
        db_path = %config.db_path.display(),
        descriptor_dim = config.descriptor_dim,
        match_threshold = config.match_threshold,
        "configuration loaded"
    );

    // Models first: without them the daemon must not accept traffic.
    let engine = spawn_engine(
        &config.detector_path(),
        &config.recognizer_path(),
        config.descriptor_dim,
        config.multi_face_policy(),
    )
    .context("failed to load face models")?;

    if let Some(dir) = config.db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let store = ProfileStore::connect(
        config.db_path.clone(),
        config.descriptor_dim,
        config.store_retry_interval(),
    );

    let service = MatchService::new(
        Arc::new(engine),
        Arc::new(store),
        config.match_policy(),
        config.store_ready_timeout(),
    );
    let app = routes::app(
        AppState::new(service),
        config.max_upload_bytes,
        config.request_timeout(),
    );

    let addr = SocketAddr::new(
        config.host.parse().context("FACEGATE_HOST is not an IP address")?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "facegated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facegated shutting down");
    Ok(())
}
