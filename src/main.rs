use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use grundy_backend::api::{router, AppDependencies, AppState};
use grundy_backend::config::AppConfig;
use grundy_backend::database::{InMemoryOrderRepository, InMemoryTransactionRepository};
use grundy_backend::logging::init_tracing;
use grundy_backend::payments::providers::PaystackProvider;
use grundy_backend::services::fulfillment::QueueFulfillmentTrigger;
use grundy_backend::workers::{join_with_timeout, FulfillmentWorker};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing credential stops the process before anything is served
    let config = match AppConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return Err(e.into());
        }
    };

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        currency = %config.checkout.currency,
        callback_url = %config.checkout.callback_url(),
        "Starting Grundy checkout backend"
    );

    if !config.checkout.verify_pod_authorization {
        warn!("Pay-on-delivery authorization codes are accepted without gateway confirmation");
    }

    let gateway = Arc::new(
        PaystackProvider::new(config.paystack.clone())
            .context("failed to initialize Paystack client")?,
    );

    let (fulfillment, fulfillment_rx) =
        QueueFulfillmentTrigger::channel(config.fulfillment.queue_capacity);
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let worker = FulfillmentWorker::new(fulfillment_rx, config.fulfillment.clone());
    let worker_handle = tokio::spawn(worker.run(worker_shutdown_rx));

    let state = AppState::new(
        &config.checkout,
        AppDependencies {
            orders: Arc::new(InMemoryOrderRepository::new()),
            transactions: Arc::new(InMemoryTransactionRepository::new()),
            gateway,
            fulfillment: Arc::new(fulfillment),
        },
    )
    .map_err(|e| anyhow::anyhow!("failed to build application state: {}", e))?;

    let app = router(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await
        .context("server error")?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(processed) = join_with_timeout(worker_handle, Duration::from_secs(5)).await {
        info!(processed, "Fulfillment worker drained");
    }

    info!("Server shutdown complete");

    Ok(())
}
