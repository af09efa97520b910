//! Receipt building and delivery.
//!
//! `try_send_receipt` never fails the surrounding charge flow over a remote
//! hiccup: an unavailable transaction or a refused send turns into a queued
//! retry job instead. Only store and queue errors propagate.

use std::sync::Arc;

use crate::config::ReceiptConfig;
use crate::entities::payment::{Environment, PaymentRecord};
use crate::entities::retry_job::RetryJob;
use crate::error::BillingError;
use crate::queue::ReceiptQueue;
use crate::services::gateway::{GatewayClient, TransactionDetail, card_type_name};
use crate::services::mailer::Mailer;

const SECTION_BREAK: &str = "------------------------------------\n\n";
const CARD_MASK: &str = "xxxxxxxxxxxx";

pub struct ReceiptService {
    queue: Arc<dyn ReceiptQueue>,
    mailer: Arc<dyn Mailer>,
    config: ReceiptConfig,
}

impl ReceiptService {
    pub fn new(
        queue: Arc<dyn ReceiptQueue>,
        mailer: Arc<dyn Mailer>,
        config: ReceiptConfig,
    ) -> Self {
        Self {
            queue,
            mailer,
            config,
        }
    }

    /// Attempts to email a receipt for `record` right now.
    ///
    /// Returns `Ok(true)` when the mail went out. Any delivery obstacle, a
    /// record with no transaction id yet, an unavailable transaction, a
    /// refused send, queues a retry job and returns `Ok(false)`.
    pub async fn try_send_receipt(
        &self,
        gateway: &dyn GatewayClient,
        environment: Environment,
        record: &PaymentRecord,
        email_key: &str,
        to: Option<&str>,
    ) -> Result<bool, BillingError> {
        let Some(payment_id) = record.payment_id.as_deref() else {
            tracing::warn!(
                "Payment record {} has no transaction id yet, queueing receipt",
                record.id
            );
            self.queue_for_retry(environment, record.id, email_key, to)
                .await?;
            return Ok(false);
        };

        let detail = match gateway.get_transaction(environment, payment_id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(
                    "Transaction {} unavailable for receipt: {}, queueing",
                    payment_id,
                    e
                );
                self.queue_for_retry(environment, record.id, email_key, to)
                    .await?;
                return Ok(false);
            }
        };

        let sent = self.send_receipt(record, &detail, email_key, to).await;
        if !sent {
            self.queue_for_retry(environment, record.id, email_key, to)
                .await?;
        }
        Ok(sent)
    }

    /// Builds the receipt and hands it to the mailer. Falls back to the
    /// billing email on the transaction when no recipient was given.
    async fn send_receipt(
        &self,
        record: &PaymentRecord,
        detail: &TransactionDetail,
        email_key: &str,
        to: Option<&str>,
    ) -> bool {
        let bill_to_email = detail
            .order_information
            .bill_to
            .as_ref()
            .map(|bill_to| bill_to.email.as_str());
        let recipient = match to.or(bill_to_email) {
            Some(recipient) if !recipient.is_empty() => recipient.to_string(),
            _ => {
                tracing::warn!("No recipient for payment code {} receipt", record.code);
                return false;
            }
        };

        let body = self.build_receipt_body(record, detail);
        let sent = self
            .mailer
            .send(email_key, &recipient, &self.config.subject, &body)
            .await;

        if sent {
            tracing::info!("Payment code {} receipt emailed.", record.code);
        } else {
            tracing::warn!(
                "Mailer refused receipt for payment code {} to {}",
                record.code,
                recipient
            );
        }
        sent
    }

    /// Plain-text receipt template.
    pub fn build_receipt_body(&self, record: &PaymentRecord, detail: &TransactionDetail) -> String {
        let mut body = String::new();

        if !self.config.message.is_empty() {
            body.push_str(&self.config.message);
            body.push_str("\n\n");
        }

        body.push_str("RECEIPT\n\n");
        body.push_str(&format!(
            "Date: {}\n",
            receipt_date(detail.submit_time_utc.as_deref())
        ));
        body.push_str(&format!("Order Number: {}\n\n", record.code));
        body.push_str(SECTION_BREAK);

        body.push_str("BILLING INFORMATION\n\n");
        if let Some(bill_to) = &detail.order_information.bill_to {
            body.push_str(&format!("{} {}\n", bill_to.first_name, bill_to.last_name));
            if let Some(company) = bill_to.company.as_deref().filter(|v| !v.is_empty()) {
                body.push_str(company);
                body.push('\n');
            }
            body.push_str(&bill_to.address1);
            body.push('\n');
            if let Some(address2) = bill_to.address2.as_deref().filter(|v| !v.is_empty()) {
                body.push_str(address2);
                body.push('\n');
            }
            body.push_str(&bill_to.locality);
            body.push('\n');
            body.push_str(&bill_to.administrative_area);
            body.push('\n');
            body.push_str(&bill_to.postal_code);
            body.push('\n');
            body.push_str(&bill_to.email);
            body.push('\n');
            body.push_str(&bill_to.phone_number);
            body.push('\n');
        }
        body.push('\n');
        body.push_str(SECTION_BREAK);

        body.push_str("PAYMENT DETAILS\n\n");
        if let Some(card) = &detail.payment_information.card {
            body.push_str(&format!(
                "Card Type {}\n",
                card_type_name(card.card_type.as_deref().unwrap_or_default())
            ));
            body.push_str(&format!(
                "Card Number {}{}\n",
                CARD_MASK,
                card.suffix.as_deref().unwrap_or_default()
            ));
            body.push_str(&format!(
                "Expiration {}-{}\n",
                card.expiration_month.as_deref().unwrap_or_default(),
                card.expiration_year.as_deref().unwrap_or_default()
            ));
        }
        body.push('\n');
        body.push_str(SECTION_BREAK);

        if let Some(details) = record.order_details.as_deref().filter(|v| !v.is_empty()) {
            body.push_str("ORDER DETAILS\n\n");
            for item in details.split("; ") {
                body.push_str(item);
                body.push('\n');
            }
            body.push('\n');
            body.push_str(SECTION_BREAK);
        }

        body.push_str("TOTAL AMOUNT\n\n");
        body.push_str(&format!("$ {}\n", receipt_amount(detail)));
        body
    }

    async fn queue_for_retry(
        &self,
        environment: Environment,
        payment_record_id: i64,
        email_key: &str,
        to: Option<&str>,
    ) -> Result<(), BillingError> {
        let job = RetryJob::new(environment, payment_record_id, email_key, to);
        if self.queue.enqueue(job).await? {
            tracing::info!(
                "Receipt for payment record {} queued for retry",
                payment_record_id
            );
        }
        Ok(())
    }
}

/// Long-form date line, e.g. "Wednesday, April 1, 2026 - 09:30". Unparseable
/// timestamps are printed as-is.
fn receipt_date(submit_time_utc: Option<&str>) -> String {
    let Some(raw) = submit_time_utc else {
        return String::new();
    };
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.format("%A, %B %-d, %Y - %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Charged total with two decimal places, preferring the authorized amount.
fn receipt_amount(detail: &TransactionDetail) -> String {
    let raw = detail
        .order_information
        .amount_details
        .authorized_amount
        .as_deref()
        .or(detail.order_information.amount_details.total_amount.as_deref())
        .unwrap_or("0");
    match raw.parse::<rust_decimal::Decimal>() {
        Ok(amount) => format!("{:.2}", amount),
        Err(_) => raw.to_string(),
    }
}
