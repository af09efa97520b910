use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billing_engine::AppState;
use billing_engine::config::EngineConfig;
use billing_engine::jobs::receipt_queue_worker::start_receipt_queue_worker_job;
use billing_engine::jobs::recurring_charge_sync::start_recurring_charge_sync_job;
use billing_engine::queue::{InMemoryReceiptQueue, ReceiptQueue};
use billing_engine::services::gateway::{GatewayClient, HttpGatewayClient};
use billing_engine::services::mailer::{LogMailer, Mailer};
use billing_engine::services::receipts::ReceiptService;
use billing_engine::services::recurring::RecurringPaymentService;
use billing_engine::store::{InMemoryPaymentStore, PaymentRecordStore};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,billing_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env().expect("Failed to load configuration");

    let store: Arc<dyn PaymentRecordStore> = Arc::new(InMemoryPaymentStore::default());
    let queue: Arc<dyn ReceiptQueue> = Arc::new(InMemoryReceiptQueue::default());
    let gateway: Arc<dyn GatewayClient> = Arc::new(HttpGatewayClient::new(config.gateway.clone()));
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

    let receipts = Arc::new(ReceiptService::new(
        Arc::clone(&queue),
        mailer,
        config.receipt.clone(),
    ));
    let recurring = Arc::new(RecurringPaymentService::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::clone(&receipts),
        config.cadence,
        Duration::from_secs(config.settle_delay_secs),
    ));

    let state = AppState {
        store,
        queue,
        gateway,
        receipts,
        recurring,
        config,
    };

    // Start background jobs
    start_recurring_charge_sync_job(
        Arc::clone(&state.recurring),
        state.config.charge_poll_interval_secs,
    )
    .await;
    start_receipt_queue_worker_job(
        Arc::clone(&state.queue),
        Arc::clone(&state.store),
        Arc::clone(&state.gateway),
        Arc::clone(&state.receipts),
        state.config.receipt_queue_interval_secs,
        state.config.receipt_queue_max_attempts,
    )
    .await;

    tracing::info!("Billing engine running");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");

    tracing::info!("Shutting down");
}
