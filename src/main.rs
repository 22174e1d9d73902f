//! Kiosk queue server binary.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinicq::{
    http::create_router,
    persist::sqlite::SqliteOpSink,
    runtime::handle::{RuntimeConfig, spawn_queue_runtime},
    seed,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinicq=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = std::env::var("CLINICQ_DB").unwrap_or_else(|_| "clinicq.db".to_string());
    let addr = std::env::var("CLINICQ_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());

    let sink = SqliteOpSink::open(&db_path).map_err(|e| format!("open journal: {e:?}"))?;
    let mut store = sink.load_store().map_err(|e| format!("load store: {e:?}"))?;
    seed::seed_if_empty(&mut store, now_ms()).map_err(|e| format!("seed: {e:?}"))?;
    info!(db = %db_path, clinics = store.clinic_count(), "store loaded");

    let handle = spawn_queue_runtime(store, Some(Box::new(sink)), RuntimeConfig::default());
    let app = create_router(handle.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "clinic queue server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush the journal before exit.
    handle
        .shutdown()
        .await
        .map_err(|e| format!("shutdown: {e:?}"))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("ctrl-c handler failed: {err}");
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
