//! Environment-driven configuration for the engine daemon.
//!
//! Every knob has a default so a bare `.env` is enough for a local run
//! against the sandbox gateway.

use std::env;

use crate::entities::payment::RecurrenceCadence;
use crate::error::BillingError;

#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub base_url: String,
    pub merchant_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub development: GatewayCredentials,
    pub production: GatewayCredentials,
}

#[derive(Debug, Clone)]
pub struct ReceiptConfig {
    /// Subject line on every receipt email.
    pub subject: String,
    /// Thank-you message prepended to the receipt body. Empty means none.
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gateway: GatewayConfig,
    pub receipt: ReceiptConfig,
    pub cadence: RecurrenceCadence,
    /// Seconds to wait after a charge before requesting the transaction
    /// for its receipt.
    pub settle_delay_secs: u64,
    pub charge_poll_interval_secs: u64,
    pub receipt_queue_interval_secs: u64,
    /// Total delivery attempts before a retry job is dropped.
    pub receipt_queue_max_attempts: u32,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, BillingError> {
        let gateway = GatewayConfig {
            development: GatewayCredentials {
                base_url: env_or("GATEWAY_DEV_URL", "https://apitest.cybersource.com"),
                merchant_id: env::var("GATEWAY_DEV_MERCHANT_ID").unwrap_or_default(),
                api_key: env::var("GATEWAY_DEV_API_KEY").unwrap_or_default(),
            },
            production: GatewayCredentials {
                base_url: env_or("GATEWAY_PROD_URL", "https://api.cybersource.com"),
                merchant_id: env::var("GATEWAY_PROD_MERCHANT_ID").unwrap_or_default(),
                api_key: env::var("GATEWAY_PROD_API_KEY").unwrap_or_default(),
            },
        };

        let receipt = ReceiptConfig {
            subject: env_or("RECEIPT_SUBJECT", "Your receipt"),
            message: env::var("RECEIPT_MESSAGE").unwrap_or_default(),
        };

        let cadence = env_or("RECURRENCE_CADENCE", "monthly")
            .parse::<RecurrenceCadence>()
            .map_err(|e| BillingError::Config(format!("RECURRENCE_CADENCE: {}", e)))?;

        Ok(Self {
            gateway,
            receipt,
            cadence,
            settle_delay_secs: env_u64("SETTLE_DELAY_SECS", 5)?,
            charge_poll_interval_secs: env_u64("CHARGE_POLL_INTERVAL_SECS", 3600)?,
            receipt_queue_interval_secs: env_u64("RECEIPT_QUEUE_INTERVAL_SECS", 60)?,
            receipt_queue_max_attempts: env_u64("RECEIPT_QUEUE_MAX_ATTEMPTS", 10)? as u32,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> Result<u64, BillingError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            BillingError::Config(format!("{} must be an integer, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
