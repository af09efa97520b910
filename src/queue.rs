//! Receipt retry queue port and the in-memory implementation.
//!
//! The substrate provides at-least-once delivery: jobs move pending ->
//! claimed -> (completed | released back to pending | discarded). Success is
//! terminal and removes the job. Deduplication happens before insert: the
//! scan covers pending and claimed jobs, so a job currently being retried
//! cannot be re-enqueued by the dispatcher it re-invokes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::entities::retry_job::RetryJob;
use crate::error::QueueError;

#[async_trait]
pub trait ReceiptQueue: Send + Sync {
    /// Appends a job unless one already exists for the same payment record.
    /// Returns false when the insert was deduplicated away.
    async fn enqueue(&self, job: RetryJob) -> Result<bool, QueueError>;

    /// Claims the oldest pending job, moving it to the claimed state.
    async fn claim_next(&self) -> Result<Option<RetryJob>, QueueError>;

    /// Terminal success: drops the claimed job.
    async fn complete(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Failed attempt: returns the claimed job to pending with its attempt
    /// counter incremented.
    async fn release(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Returns a claimed job to pending untouched, for when no delivery
    /// attempt could be made.
    async fn unclaim(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Drops a claimed job without retrying it (dead-letter).
    async fn discard(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// True when a pending or claimed job exists for this payment record.
    async fn contains_record(&self, payment_record_id: i64) -> Result<bool, QueueError>;

    async fn pending_count(&self) -> Result<usize, QueueError>;
}

#[derive(Default, Clone)]
pub struct InMemoryReceiptQueue {
    inner: Arc<Mutex<QueueInner>>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<RetryJob>,
    claimed: HashMap<Uuid, RetryJob>,
}

impl QueueInner {
    fn contains_record(&self, payment_record_id: i64) -> bool {
        self.pending
            .iter()
            .any(|job| job.payment_record_id == payment_record_id)
            || self
                .claimed
                .values()
                .any(|job| job.payment_record_id == payment_record_id)
    }
}

impl InMemoryReceiptQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReceiptQueue for InMemoryReceiptQueue {
    async fn enqueue(&self, job: RetryJob) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock();
        if inner.contains_record(job.payment_record_id) {
            return Ok(false);
        }
        inner.pending.push_back(job);
        Ok(true)
    }

    async fn claim_next(&self) -> Result<Option<RetryJob>, QueueError> {
        let mut inner = self.inner.lock();
        let job = inner.pending.pop_front();
        if let Some(job) = &job {
            inner.claimed.insert(job.id, job.clone());
        }
        Ok(job)
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.inner.lock().claimed.remove(&job_id);
        Ok(())
    }

    async fn release(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if let Some(mut job) = inner.claimed.remove(&job_id) {
            job.attempts += 1;
            inner.pending.push_back(job);
        }
        Ok(())
    }

    async fn unclaim(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.claimed.remove(&job_id) {
            inner.pending.push_back(job);
        }
        Ok(())
    }

    async fn discard(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.inner.lock().claimed.remove(&job_id);
        Ok(())
    }

    async fn contains_record(&self, payment_record_id: i64) -> Result<bool, QueueError> {
        Ok(self.inner.lock().contains_record(payment_record_id))
    }

    async fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(self.inner.lock().pending.len())
    }
}
