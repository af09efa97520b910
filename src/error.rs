use thiserror::Error;

/// Failures from the remote payment gateway. Always treated as transient by
/// callers: a failed charge skips to the next record, a failed transaction
/// fetch routes the receipt into the retry queue.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Failures from the payment record store. These propagate uncaught: queue
/// dedup and recurrence dates depend on writes being durable.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("payment record {0} not found")]
    NotFound(i64),
    #[error("payment record {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: i64, expected: u64 },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failures from the retry queue substrate.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("configuration error: {0}")]
    Config(String),
}
