//! Recurring charge engine.
//!
//! Walks active recurring parents whose next-charge date has passed, submits
//! one merchant-initiated follow-on charge per parent, records the outcome
//! as a child payment record and advances or closes the series. Receipts go
//! out on a deferred task so the remote side has time to settle first.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::entities::payment::{
    DATE_TIME_FORMAT, NewPaymentRecord, PaymentRecord, RecurrenceCadence, normalize_amount,
};
use crate::error::{BillingError, StoreError};
use crate::services::gateway::{ChargeRequest, GatewayClient, SearchRequest};
use crate::services::receipts::ReceiptService;
use crate::store::{PaymentFilter, PaymentRecordStore};

/// Message key attached to recurring receipts, derived from the parent
/// record id. Queue payloads and mail logs carry it verbatim.
pub fn receipt_email_key(parent_id: i64) -> String {
    format!("rpayment_id_{}_recurring", parent_id)
}

/// What happened to one due parent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// Series cap reached, parent deactivated without charging.
    Capped,
    /// Gateway refused or failed the charge, nothing was persisted.
    Failed,
    /// Charge went through, child record created and parent advanced.
    Charged { child_id: i64 },
}

/// Tallies for one engine pass over the due records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub charged: usize,
    pub capped: usize,
    pub failed: usize,
}

pub struct RecurringPaymentService {
    store: Arc<dyn PaymentRecordStore>,
    gateway: Arc<dyn GatewayClient>,
    receipts: Arc<ReceiptService>,
    cadence: RecurrenceCadence,
    settle_delay: Duration,
}

impl RecurringPaymentService {
    pub fn new(
        store: Arc<dyn PaymentRecordStore>,
        gateway: Arc<dyn GatewayClient>,
        receipts: Arc<ReceiptService>,
        cadence: RecurrenceCadence,
        settle_delay: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            receipts,
            cadence,
            settle_delay,
        }
    }

    /// One full engine pass: recover records with missing remote ids, then
    /// charge everything due. Store failures abort the pass; per-record
    /// gateway failures are tallied and the pass moves on.
    pub async fn run_due_charges(&self) -> Result<RunSummary, BillingError> {
        self.discover_missing_payment_ids().await?;
        self.discover_missing_customer_ids().await?;

        let now = Utc::now().naive_utc();
        let due = self.store.query(&PaymentFilter::due_recurring(now)).await?;
        let mut summary = RunSummary::default();

        for id in due {
            let record = match self.store.load(id).await {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => {
                    tracing::warn!("Due payment record {} vanished before charging", id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match self.charge_occurrence(&record).await? {
                ChargeOutcome::Charged { child_id } => {
                    tracing::info!(
                        "Recurring charge for payment {} created record {}",
                        record.code,
                        child_id
                    );
                    summary.charged += 1;
                }
                ChargeOutcome::Capped => summary.capped += 1,
                ChargeOutcome::Failed => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// Charges one follow-on occurrence against a recurring parent.
    ///
    /// The cap counts the initial charge, so a parent with `recurring_max`
    /// of N stops after N-1 children. A capped parent is deactivated and
    /// saved before returning.
    pub async fn charge_occurrence(
        &self,
        record: &PaymentRecord,
    ) -> Result<ChargeOutcome, BillingError> {
        if record.child_count() + 1 >= record.recurring_max as usize {
            tracing::info!(
                "Payment {} recurring charge will not be processed. Number of payments exceeds the maximum value.",
                record.code
            );
            let mut parent = record.clone();
            parent.recurring_active = false;
            self.store.save(&parent).await?;
            return Ok(ChargeOutcome::Capped);
        }

        let (Some(payment_id), Some(customer_id)) =
            (record.payment_id.as_deref(), record.customer_id.as_deref())
        else {
            tracing::warn!(
                "Payment {} is missing gateway ids and cannot be charged",
                record.code
            );
            return Ok(ChargeOutcome::Failed);
        };

        let new_code = format!("{}-{}", record.code, record.child_count() + 1);
        let amount = normalize_amount(&record.authorized_amount);
        let request = ChargeRequest {
            code: new_code.clone(),
            total_amount: amount.clone(),
            currency: record.currency.clone(),
            customer_id: customer_id.to_string(),
            previous_payment_id: payment_id.to_string(),
        };

        let response = match self
            .gateway
            .create_payment(record.environment, &request)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Recurring charge {} failed: {}", new_code, e);
                return Ok(ChargeOutcome::Failed);
            }
        };

        let child = self
            .store
            .create(NewPaymentRecord {
                code: new_code,
                payment_id: Some(response.id),
                customer_id: None,
                authorized_amount: amount,
                currency: record.currency.clone(),
                status: response.status,
                recurring: false,
                recurring_active: false,
                recurring_next: None,
                recurring_max: 0,
                environment: record.environment,
                order_details: None,
                submitted: Some(response.submit_time_utc),
            })
            .await?;

        let mut parent = record.clone();
        parent.recurring_payments.push(child.id);
        if parent.child_count() + 1 < parent.recurring_max as usize {
            let next = self.cadence.next_after(child.created);
            tracing::debug!(
                "Payment {} next charge scheduled for {}",
                parent.code,
                next.format(DATE_TIME_FORMAT)
            );
            parent.recurring_next = Some(next);
        } else {
            // This occurrence was the last one allowed.
            parent.recurring_active = false;
        }
        self.store.save(&parent).await?;

        self.dispatch_receipt_later(parent.id, child.clone());

        Ok(ChargeOutcome::Charged { child_id: child.id })
    }

    /// Asks the gateway for the newest transaction under the record's
    /// reference code and persists the found id. No-op on an empty search;
    /// gateway failures are logged and leave the record untouched.
    pub async fn discover_missing_payment_id(
        &self,
        record: &PaymentRecord,
    ) -> Result<(), BillingError> {
        let request = SearchRequest {
            query: format!("clientReferenceInformation.code:{}", record.code),
            sort: "submitTimeUtc:desc".to_string(),
            offset: 0,
            limit: 1,
        };
        let result = match self
            .gateway
            .search_transactions(record.environment, &request)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Transaction search for payment {} failed: {}", record.code, e);
                return Ok(());
            }
        };

        if let Some(summary) = result.transaction_summaries.first() {
            let mut updated = record.clone();
            updated.payment_id = Some(summary.id.clone());
            self.store.save(&updated).await?;
            tracing::info!(
                "Payment {} recovered transaction id {}",
                record.code,
                summary.id
            );
        }

        Ok(())
    }

    /// Sweeps recurring parents that never got a transaction id.
    pub async fn discover_missing_payment_ids(&self) -> Result<(), BillingError> {
        let ids = self
            .store
            .query(&PaymentFilter::missing_payment_id())
            .await?;

        for id in ids {
            let record = match self.store.load(id).await {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            self.discover_missing_payment_id(&record).await?;
        }

        Ok(())
    }

    /// Pulls the tokenized customer id off the record's remote transaction
    /// and persists it. Silent no-op when the transaction carries none;
    /// gateway failures are logged and leave the record untouched.
    pub async fn discover_missing_customer_id(
        &self,
        record: &PaymentRecord,
    ) -> Result<(), BillingError> {
        let Some(payment_id) = record.payment_id.as_deref() else {
            return Ok(());
        };

        let detail = match self
            .gateway
            .get_transaction(record.environment, payment_id)
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(
                    "Transaction lookup for payment {} failed: {}",
                    record.code,
                    e
                );
                return Ok(());
            }
        };

        if let Some(customer_id) = detail.customer_id() {
            let mut updated = record.clone();
            updated.customer_id = Some(customer_id.to_string());
            self.store.save(&updated).await?;
            tracing::info!(
                "Payment {} recovered customer id {}",
                record.code,
                customer_id
            );
        }

        Ok(())
    }

    /// Sweeps recurring parents with a transaction id but no tokenized
    /// customer.
    pub async fn discover_missing_customer_ids(&self) -> Result<(), BillingError> {
        let ids = self.store.query(&PaymentFilter::missing_customer()).await?;

        for id in ids {
            let record = match self.store.load(id).await {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            self.discover_missing_customer_id(&record).await?;
        }

        Ok(())
    }

    /// Emails the child's receipt after a settle delay so the transaction
    /// is queryable on the remote side. Failures inside the task queue a
    /// retry job through the receipt service.
    fn dispatch_receipt_later(&self, parent_id: i64, child: PaymentRecord) {
        let gateway = Arc::clone(&self.gateway);
        let receipts = Arc::clone(&self.receipts);
        let delay = self.settle_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let key = receipt_email_key(parent_id);
            if let Err(e) = receipts
                .try_send_receipt(gateway.as_ref(), child.environment, &child, &key, None)
                .await
            {
                tracing::error!(
                    "Receipt dispatch for payment record {} failed: {}",
                    child.id,
                    e
                );
            }
        });
    }
}
