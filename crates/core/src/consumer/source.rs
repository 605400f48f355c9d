use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a broker subscription.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Failed to connect to broker at {uri}: {reason}")]
    Connect { uri: String, reason: String },

    #[error("Failed to subscribe to queue {queue}: {reason}")]
    Subscribe { queue: String, reason: String },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Failed to close subscription: {0}")]
    Close(String),
}

/// A subscription delivering raw message payloads.
#[async_trait]
pub trait MessageSource: Send {
    /// Short description for logs.
    fn name(&self) -> &str;

    /// Wait for the next payload.
    ///
    /// `None` means the subscription has ended and will deliver nothing more.
    async fn next_payload(&mut self) -> Option<Result<Vec<u8>, BrokerError>>;

    /// Tear the subscription down.
    async fn close(&mut self) -> Result<(), BrokerError>;
}
