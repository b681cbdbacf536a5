use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use stockledger_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db = api::db::establish_connection(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db).await.map_err(|e| {
            error!("failed running migrations: {}", e);
            e
        })?;
    }

    let state = api::AppState::new(Arc::new(db), cfg.clone());
    let app = api::app(state);

    let addr = cfg.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("stockledger-api listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
