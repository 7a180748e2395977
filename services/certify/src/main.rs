//! certify
//!
//! Serves the certificate form, issues PDF certificates with QR verification
//! links, and answers download and verification requests.

use std::sync::Arc;

use anyhow::{Context, Result};
use certify::{
    api,
    config::{self, StoreBackend},
    files::CertificateFiles,
    service::CertificateService,
    state::AppState,
    store::{CertificateStore, MemoryStore, SqliteStore},
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to CERTIFY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting certify");
    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        cert_dir = %config.cert_dir.display(),
        "Configuration loaded"
    );

    let store: Arc<dyn CertificateStore> = match &config.store {
        StoreBackend::Memory => {
            warn!("Using in-memory store; certificate records will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Sqlite { path } => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("Failed to open certificate store {}", path.display()))?;
            info!(path = %path.display(), "Certificate store opened");
            Arc::new(store)
        }
    };

    info!(durable = store.is_durable(), "Certificate store selected");

    let service = CertificateService::new(
        config.base_url.clone(),
        CertificateFiles::new(config.cert_dir.clone()),
        store,
    );
    service
        .reconcile()
        .await
        .context("Failed to reconcile certificate storage")?;

    // Build and run the server
    let app = api::create_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await;

    match result {
        Ok(()) => info!("certify shutdown complete"),
        Err(e) => {
            error!(error = %e, "Server error");
            return Err(e.into());
        }
    }
    Ok(())
}
