use std::sync::Arc;

use tokio::time::{Duration, interval};

use crate::services::recurring::RecurringPaymentService;

/// Periodically recovers missing gateway ids and charges every due
/// recurring payment.
pub async fn start_recurring_charge_sync_job(
    recurring: Arc<RecurringPaymentService>,
    poll_interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(poll_interval_secs));

        loop {
            interval.tick().await;
            tracing::info!("Starting recurring charge pass");

            match recurring.run_due_charges().await {
                Ok(summary) => {
                    tracing::info!(
                        "Recurring charge pass complete: {} charged, {} capped, {} failed",
                        summary.charged,
                        summary.capped,
                        summary.failed
                    );
                }
                Err(e) => {
                    tracing::error!("Recurring charge pass failed: {}", e);
                }
            }
        }
    });
}
