mod client;
mod config;
mod error;
mod flowerpower;
mod indexer;
mod logging;
mod metrics;
mod models;
mod rest;
mod store;
mod thingful;

use crate::client::Client;
use crate::config::Config;
use crate::flowerpower::FlowerPower;
use crate::indexer::Indexer;
use crate::metrics::PrometheusMetrics;
use crate::rest::ApiState;
use crate::store::PgStore;
use crate::thingful::Thingful;
use std::process::exit;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

static TERMINATED: AtomicU32 = AtomicU32::new(0);

/// First SIGINT shuts down gracefully, the second one kills the process
fn register_sigint_handler(shutdown: CancellationToken) {
    let res = ctrlc::set_handler(move || {
        let count = TERMINATED.fetch_add(1, Ordering::Relaxed);
        if count >= 1 {
            info!("Force killing");
            exit(1);
        }
        info!("Shutting down, waiting for running work to finish");
        shutdown.cancel();
    });
    if let Err(e) = res {
        error!("Failed registering sigint handler: {}", e);
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };
    logging::init(config.verbose());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        core_version = kudzu_core::CORE_VERSION,
        "Starting kudzu"
    );

    let conn = match models::establish_db_connection(config.database_url()).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("Failed connecting database: {}", e);
            exit(1);
        }
    };
    if let Err(e) = models::migrate(&conn).await {
        error!("Failed migrating database: {}", e);
        exit(1);
    }

    let metrics = match PrometheusMetrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            error!("Failed registering metrics: {}", e);
            exit(1);
        }
    };
    let client = match Client::new(config.client_timeout(), metrics.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed building http client: {}", e);
            exit(1);
        }
    };

    let store = Arc::new(PgStore::new(conn, config.reindex_interval()));
    let source = Arc::new(FlowerPower::new(
        client.clone(),
        config.flowerpower(),
        metrics.clone(),
    ));
    let thingful = Arc::new(Thingful::new(client, config.thingful(), metrics.clone()));

    let shutdown = CancellationToken::new();
    register_sigint_handler(shutdown.clone());

    let indexer = Arc::new(Indexer::new(
        store.clone(),
        source.clone(),
        thingful.clone(),
        metrics.clone(),
        config.indexer(),
    ));
    let indexer_handle = if config.no_indexer() {
        info!("Indexer disabled");
        None
    } else {
        let indexer = indexer.clone();
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move { indexer.run(shutdown).await }))
    };

    let state = Arc::new(ApiState {
        thingful,
        source,
        store,
        indexer: (!config.no_indexer()).then_some(indexer),
        metrics,
        shutdown: shutdown.clone(),
        tasks: TaskTracker::new(),
    });
    if let Err(e) = rest::serve(state.clone(), config.server_port()).await {
        error!("Failed starting webserver: {}", e);
        shutdown.cancel();
    }

    state.tasks.close();
    if !state.tasks.is_empty() {
        info!(tasks = state.tasks.len(), "Waiting for onboarding to finish");
    }
    state.tasks.wait().await;

    if let Some(handle) = indexer_handle {
        if let Err(e) = handle.await {
            error!("Indexer task failed: {}", e);
        }
    }
    info!("Bye");
}
