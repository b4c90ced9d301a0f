use anyhow::Result;
use axum::Router;
use filedrop_store::{
    backends::{LocalfsBackend, MetaStorageBackend},
    config::AppConfig,
    handlers::AppState,
    routes,
    services::sweeper::sweep_expired,
};
use std::{io::ErrorKind, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + sweep flag ---
    let (cfg, sweep) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting filedrop-store with config: {:?}", cfg);

    // --- Ensure storage directories exist ---
    let localfs = LocalfsBackend::new(&cfg.meta_dir, &cfg.files_dir, cfg.limits);
    localfs.ensure_dirs().await?;
    tracing::debug!(
        "Storage directories ready: files={} meta={}",
        cfg.files_dir.display(),
        cfg.meta_dir.display()
    );

    let backend: Arc<dyn MetaStorageBackend> = Arc::new(localfs);

    // --- Handle sweep mode ---
    if sweep {
        let report = sweep_expired(backend.as_ref(), chrono::Utc::now()).await?;
        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted,
            skipped = report.skipped,
            "Sweep complete."
        );
        return Ok(()); // exit after sweep
    }

    if cfg.cleanup_every_minutes > 0 {
        spawn_sweeper(
            backend.clone(),
            Duration::from_secs(cfg.cleanup_every_minutes * 60),
        );
    }

    // --- Build router ---
    let state = AppState {
        backend,
        storage_dirs: vec![
            ("files", cfg.files_dir.clone()),
            ("meta", cfg.meta_dir.clone()),
        ],
    };
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Run the expiry sweep on a fixed interval for the life of the process.
fn spawn_sweeper(backend: Arc<dyn MetaStorageBackend>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_expired(backend.as_ref(), chrono::Utc::now()).await {
                Ok(report) => tracing::debug!(
                    scanned = report.scanned,
                    deleted = report.deleted,
                    skipped = report.skipped,
                    "Periodic sweep complete"
                ),
                Err(err) => tracing::warn!("Periodic sweep failed: {}", err),
            }
        }
    });
}
