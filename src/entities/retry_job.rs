use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::payment::Environment;

/// Durable work item: "attempt to (re)send a receipt". At most one
/// non-terminal job exists per payment record at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryJob {
    pub id: Uuid,
    pub environment: Environment,
    /// Payment record to resend for; doubles as the deduplication key.
    #[serde(rename = "pid")]
    pub payment_record_id: i64,
    /// Template discriminator for the outgoing mail.
    #[serde(rename = "key")]
    pub email_key: String,
    /// None means: resolve from the transaction's billing data at delivery time.
    #[serde(rename = "to")]
    pub recipient: Option<String>,
    /// Failed delivery attempts made through the queue so far.
    pub attempts: u32,
    pub created: NaiveDateTime,
}

impl RetryJob {
    pub fn new(
        environment: Environment,
        payment_record_id: i64,
        email_key: &str,
        recipient: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            environment,
            payment_record_id,
            email_key: email_key.to_string(),
            recipient: recipient.map(str::to_string),
            attempts: 0,
            created: Utc::now().naive_utc(),
        }
    }
}
