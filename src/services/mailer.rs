//! Outbound mail port. Delivery backends report success as a bool; the
//! receipt path turns a false into a queued retry rather than an error.

use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hands one message to the delivery backend. `key` identifies the
    /// message kind for templating and logs.
    async fn send(&self, key: &str, to: &str, subject: &str, body: &str) -> bool;
}

/// Mailer that writes messages to the log instead of delivering them.
/// Useful for local runs without an SMTP relay.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, key: &str, to: &str, subject: &str, body: &str) -> bool {
        tracing::info!(
            "Mail [{}] to {}: {} ({} bytes)",
            key,
            to,
            subject,
            body.len()
        );
        true
    }
}
