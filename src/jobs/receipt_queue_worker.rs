use std::sync::Arc;

use tokio::time::{Duration, interval};

use crate::error::{BillingError, StoreError};
use crate::queue::ReceiptQueue;
use crate::services::gateway::GatewayClient;
use crate::services::receipts::ReceiptService;
use crate::store::PaymentRecordStore;

/// Periodically drains the receipt retry queue.
pub async fn start_receipt_queue_worker_job(
    queue: Arc<dyn ReceiptQueue>,
    store: Arc<dyn PaymentRecordStore>,
    gateway: Arc<dyn GatewayClient>,
    receipts: Arc<ReceiptService>,
    poll_interval_secs: u64,
    max_attempts: u32,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(poll_interval_secs));

        loop {
            interval.tick().await;

            if let Err(e) = process_receipt_queue(
                queue.as_ref(),
                store.as_ref(),
                gateway.as_ref(),
                receipts.as_ref(),
                max_attempts,
            )
            .await
            {
                tracing::error!("Receipt queue pass failed: {}", e);
            }
        }
    });
}

/// One pass over the queue. Each pending job gets exactly one delivery
/// attempt: a job released during the pass is not claimed again until the
/// next pass. Jobs whose payment record no longer exists are dropped; jobs
/// that keep failing are dropped once they reach `max_attempts`. A store
/// outage aborts the pass and returns the claimed job to pending with its
/// attempt count untouched.
pub async fn process_receipt_queue(
    queue: &dyn ReceiptQueue,
    store: &dyn PaymentRecordStore,
    gateway: &dyn GatewayClient,
    receipts: &ReceiptService,
    max_attempts: u32,
) -> Result<(), BillingError> {
    let batch = queue.pending_count().await?;

    for _ in 0..batch {
        let Some(job) = queue.claim_next().await? else {
            break;
        };

        let record = match store.load(job.payment_record_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(
                    "Dropping receipt job {}: payment record {} no longer exists",
                    job.id,
                    job.payment_record_id
                );
                queue.discard(job.id).await?;
                continue;
            }
            Err(e) => {
                // No delivery attempt was made yet.
                queue.unclaim(job.id).await?;
                return Err(e.into());
            }
        };

        let sent = match receipts
            .try_send_receipt(
                gateway,
                job.environment,
                &record,
                &job.email_key,
                job.recipient.as_deref(),
            )
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                queue.release(job.id).await?;
                return Err(e);
            }
        };

        if sent {
            queue.complete(job.id).await?;
            tracing::info!(
                "Queued receipt for payment record {} delivered",
                job.payment_record_id
            );
        } else if job.attempts + 1 >= max_attempts {
            queue.discard(job.id).await?;
            tracing::error!(
                "Receipt for payment record {} failed {} times, dropping job {}",
                job.payment_record_id,
                job.attempts + 1,
                job.id
            );
        } else {
            queue.release(job.id).await?;
            tracing::error!(
                "Receipt for payment record {} still undeliverable, attempt {} of {}",
                job.payment_record_id,
                job.attempts + 1,
                max_attempts
            );
        }
    }

    Ok(())
}
