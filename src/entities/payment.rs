//! Payment record entity: one authorized or captured charge.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Store/display format for recurrence timestamps (UTC).
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Gateway environment a record was created under. Replayed on every
/// follow-up call so historical records stay reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            // "sandbox" is an accepted alias for the development host.
            "development" | "sandbox" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// One charge attempt. Parents of recurring series carry the recurrence
/// fields; child occurrences are plain captured charges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    /// Merchant-generated human-readable reference, unique per charge attempt.
    pub code: String,
    /// Remote transaction id, None until confirmed or discovered.
    pub payment_id: Option<String>,
    /// Remote tokenized-customer id, None until discovered.
    pub customer_id: Option<String>,
    /// Decimal string, e.g. "25.00".
    pub authorized_amount: String,
    pub currency: String,
    /// Gateway-reported state, e.g. "TRANSMITTED", "AUTHORIZED".
    pub status: String,
    pub recurring: bool,
    pub recurring_active: bool,
    pub recurring_next: Option<NaiveDateTime>,
    /// Cap on the total number of charges in the series, first charge included.
    pub recurring_max: u32,
    /// Ordered child record ids, oldest first.
    pub recurring_payments: Vec<i64>,
    pub environment: Environment,
    /// "; "-separated line items, rendered on receipts when present.
    pub order_details: Option<String>,
    pub created: NaiveDateTime,
    /// Submit time as reported by the gateway.
    pub submitted: Option<String>,
    /// Optimistic-concurrency token, checked on save.
    pub version: u64,
}

impl PaymentRecord {
    pub fn child_count(&self) -> usize {
        self.recurring_payments.len()
    }
}

/// Field set accepted by `PaymentRecordStore::create`. The store assigns
/// `id`, `created`, `version` and starts with no children.
#[derive(Debug, Clone, Default)]
pub struct NewPaymentRecord {
    pub code: String,
    pub payment_id: Option<String>,
    pub customer_id: Option<String>,
    pub authorized_amount: String,
    pub currency: String,
    pub status: String,
    pub recurring: bool,
    pub recurring_active: bool,
    pub recurring_next: Option<NaiveDateTime>,
    pub recurring_max: u32,
    pub environment: Environment,
    pub order_details: Option<String>,
    pub submitted: Option<String>,
}

/// Cadence policy for the next occurrence of a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceCadence {
    /// One calendar month later, day clamped at month end.
    Monthly,
    EveryDays(u32),
}

impl RecurrenceCadence {
    /// Next occurrence date, measured from the child record's creation time.
    pub fn next_after(&self, from: NaiveDateTime) -> NaiveDateTime {
        match self {
            RecurrenceCadence::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or_else(|| from + Duration::days(30)),
            RecurrenceCadence::EveryDays(days) => from + Duration::days(i64::from(*days)),
        }
    }
}

impl FromStr for RecurrenceCadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower == "monthly" {
            return Ok(RecurrenceCadence::Monthly);
        }
        if let Some(days) = lower.strip_prefix("days:") {
            let days: u32 = days
                .parse()
                .map_err(|_| format!("invalid cadence day count '{}'", days))?;
            if days == 0 {
                return Err("cadence day count must be positive".to_string());
            }
            return Ok(RecurrenceCadence::EveryDays(days));
        }
        Err(format!("unknown recurrence cadence '{}'", s))
    }
}

/// Gateways reject bare integer amounts; make sure a decimal fraction is
/// present ("10" -> "10.00"). Amounts that already carry a separator are
/// left untouched.
pub fn normalize_amount(amount: &str) -> String {
    if amount.contains('.') {
        amount.to_string()
    } else {
        format!("{}.00", amount)
    }
}
