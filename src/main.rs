mod api;
mod cascade;
mod config;
mod error;
mod formats;
mod instances;
mod providers;
mod rewrite;

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{build_router, AppState, APP_NAME, APP_VERSION};
use crate::cascade::ResolutionCascade;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::instances::InstanceDirectory;
use crate::providers::build_providers;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_resolver=info,axum=info".into()),
        )
        .compact()
        .init();

    let cfg = AppConfig::from_env()?;
    let http = reqwest::Client::builder()
        .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
        .build()
        .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;
    let directory = Arc::new(InstanceDirectory::new(http.clone(), &cfg.mirror));
    let cascade = Arc::new(ResolutionCascade::new(build_providers(
        &cfg,
        http,
        directory,
    )));
    let state = Arc::new(AppState::new(cfg.clone(), cascade));

    let app = build_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        require_video_id = cfg.require_video_id,
        primary_enabled = cfg.primary.lookup_url.is_some(),
        mirror_directory = cfg.mirror.directory_url.as_deref().unwrap_or("<fallback only>"),
        format_preference = %cfg.mirror.format_preference,
        tertiary_enabled = cfg.tertiary.api_key.is_some(),
        "starting audio-resolver"
    );
    if cfg.primary.lookup_url.is_none() {
        warn!("PRIMARY_LOOKUP_URL is not set; the metadata-matched provider is disabled");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
