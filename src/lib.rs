// src/lib.rs

use std::sync::Arc;

use config::EngineConfig;
use queue::ReceiptQueue;
use services::gateway::GatewayClient;
use services::receipts::ReceiptService;
use services::recurring::RecurringPaymentService;
use store::PaymentRecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentRecordStore>,
    pub queue: Arc<dyn ReceiptQueue>,
    pub gateway: Arc<dyn GatewayClient>,
    pub receipts: Arc<ReceiptService>,
    pub recurring: Arc<RecurringPaymentService>,
    pub config: EngineConfig,
}

pub mod entities {
    pub mod payment;
    pub mod retry_job;
}

pub mod services {
    pub mod gateway;
    pub mod mailer;
    pub mod receipts;
    pub mod recurring;
}

pub mod jobs {
    pub mod receipt_queue_worker;
    pub mod recurring_charge_sync;
}

pub mod config;
pub mod error;
pub mod queue;
pub mod store;
