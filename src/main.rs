use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracker_sync::config::Config;
use tracker_sync::connector::LiveConnector;
use tracker_sync::credentials::{AesGcmCipher, Cipher, CredentialResolver};
use tracker_sync::rewrite::ConfiguredRewriter;
use tracker_sync::server::{AppState, build_router};
use tracker_sync::store::JsonFileStore;
use tracker_sync::webhooks::SyncEngine;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracker_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Config::from_env()).await {
        error!(error = %e, "tracker-sync exited with an error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(JsonFileStore::open(&config.store_path)?);

    let cipher: Option<Arc<dyn Cipher>> = match &config.encryption_key {
        Some(key) => Some(Arc::new(AesGcmCipher::from_key(key)?)),
        None => None,
    };
    let credentials = CredentialResolver::new(config.overrides.clone(), cipher);
    let rewriter = ConfiguredRewriter::from_config(config.rewrite.as_ref())?;

    let tracker = TaskTracker::new();
    let shutdown = CancellationToken::new();
    let bind_addr = config.bind_addr;

    let engine = SyncEngine::new(
        store,
        Arc::new(LiveConnector::new()),
        rewriter,
        credentials,
        Arc::new(config),
    )
    .with_background(tracker.clone(), shutdown.clone());
    let app = build_router(AppState::new(Arc::new(engine)));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("listening on {}", bind_addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
            signal.cancel();
        })
        .await?;

    tracker.close();
    tracker.wait().await;
    Ok(())
}
