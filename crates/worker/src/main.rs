use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_ledger::{LedgerApi, LedgerConfig};
use atelier_orchestrator::api::OrchestratorApi;
use atelier_orchestrator::routing::RoutingConfig;

mod monitor;
mod store;

use monitor::{Monitor, MonitorConfig};
use store::PgTrainingStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = atelier_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    atelier_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Clients ---
    let gateway = OrchestratorApi::new(RoutingConfig::from_env());
    let ledger = LedgerApi::new(LedgerConfig::from_env());

    // --- Monitor ---
    let monitor = Arc::new(Monitor::new(
        Arc::new(PgTrainingStore::new(pool)),
        Arc::new(gateway),
        Arc::new(ledger),
        MonitorConfig::from_env(),
    ));

    let cancel = CancellationToken::new();
    let task = tokio::spawn(monitor::run(monitor, cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    if let Err(e) = task.await {
        tracing::error!(error = %e, "Monitor task panicked");
    }
}
