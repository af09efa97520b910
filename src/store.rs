//! Payment record store port and the in-memory implementation.
//!
//! Persistence itself is an external collaborator; the engine only needs a
//! generic keyed store with filtered id queries and version-checked writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use parking_lot::RwLock;

use crate::entities::payment::{NewPaymentRecord, PaymentRecord};
use crate::error::StoreError;

/// Query conditions over payment records. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub recurring: Option<bool>,
    pub recurring_active: Option<bool>,
    pub has_payment_id: Option<bool>,
    pub has_customer_id: Option<bool>,
    pub status: Option<String>,
    /// Matches records whose `recurring_next` is set and strictly earlier.
    pub recurring_next_before: Option<NaiveDateTime>,
}

impl PaymentFilter {
    /// Active recurring parents that are ready to charge: confirmed remote
    /// ids, transmitted initial payment, next-occurrence date in the past.
    pub fn due_recurring(now: NaiveDateTime) -> Self {
        Self {
            recurring: Some(true),
            recurring_active: Some(true),
            has_payment_id: Some(true),
            has_customer_id: Some(true),
            status: Some("TRANSMITTED".to_string()),
            recurring_next_before: Some(now),
        }
    }

    /// Active recurring parents still missing the tokenized customer id.
    pub fn missing_customer() -> Self {
        Self {
            recurring: Some(true),
            recurring_active: Some(true),
            has_payment_id: Some(true),
            has_customer_id: Some(false),
            ..Default::default()
        }
    }

    /// Active recurring parents still missing the remote transaction id.
    pub fn missing_payment_id() -> Self {
        Self {
            recurring: Some(true),
            recurring_active: Some(true),
            has_payment_id: Some(false),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &PaymentRecord) -> bool {
        if let Some(recurring) = self.recurring {
            if record.recurring != recurring {
                return false;
            }
        }
        if let Some(active) = self.recurring_active {
            if record.recurring_active != active {
                return false;
            }
        }
        if let Some(has_payment_id) = self.has_payment_id {
            if record.payment_id.is_some() != has_payment_id {
                return false;
            }
        }
        if let Some(has_customer_id) = self.has_customer_id {
            if record.customer_id.is_some() != has_customer_id {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if &record.status != status {
                return false;
            }
        }
        if let Some(before) = self.recurring_next_before {
            match record.recurring_next {
                Some(next) if next < before => {}
                _ => return false,
            }
        }
        true
    }
}

#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    /// Ids of all records matching the filter, in ascending id order.
    async fn query(&self, filter: &PaymentFilter) -> Result<Vec<i64>, StoreError>;

    async fn load(&self, id: i64) -> Result<PaymentRecord, StoreError>;

    async fn create(&self, fields: NewPaymentRecord) -> Result<PaymentRecord, StoreError>;

    /// Conditional write: fails with `VersionConflict` when the stored
    /// version differs from `record.version`. Returns the bumped record.
    async fn save(&self, record: &PaymentRecord) -> Result<PaymentRecord, StoreError>;
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    records: HashMap<i64, PaymentRecord>,
    next_id: i64,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRecordStore for InMemoryPaymentStore {
    async fn query(&self, filter: &PaymentFilter) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.read();
        let mut ids: Vec<i64> = inner
            .records
            .values()
            .filter(|record| filter.matches(record))
            .map(|record| record.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn load(&self, id: i64) -> Result<PaymentRecord, StoreError> {
        let inner = self.inner.read();
        inner
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, fields: NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        let record = PaymentRecord {
            id,
            code: fields.code,
            payment_id: fields.payment_id,
            customer_id: fields.customer_id,
            authorized_amount: fields.authorized_amount,
            currency: fields.currency,
            status: fields.status,
            recurring: fields.recurring,
            recurring_active: fields.recurring_active,
            recurring_next: fields.recurring_next,
            recurring_max: fields.recurring_max,
            recurring_payments: Vec::new(),
            environment: fields.environment,
            order_details: fields.order_details,
            created: Utc::now().naive_utc(),
            submitted: fields.submitted,
            version: 0,
        };
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn save(&self, record: &PaymentRecord) -> Result<PaymentRecord, StoreError> {
        let mut inner = self.inner.write();
        let stored = inner
            .records
            .get(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;
        if stored.version != record.version {
            return Err(StoreError::VersionConflict {
                id: record.id,
                expected: record.version,
            });
        }
        let mut updated = record.clone();
        updated.version += 1;
        inner.records.insert(record.id, updated.clone());
        Ok(updated)
    }
}
