//! Mock message source for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::consumer::{BrokerError, MessageSource};
use crate::notification::Notification;

type Delivery = Result<Vec<u8>, BrokerError>;

/// In-memory broker subscription.
///
/// Payloads published through the paired [`MockBroker`] are delivered in
/// order. Dropping the broker ends the subscription.
#[derive(Debug)]
pub struct MockMessageSource {
    rx: mpsc::UnboundedReceiver<Delivery>,
    closed: Arc<AtomicBool>,
}

/// Publishing side of a [`MockMessageSource`].
#[derive(Debug, Clone)]
pub struct MockBroker {
    tx: mpsc::UnboundedSender<Delivery>,
    closed: Arc<AtomicBool>,
}

impl MockMessageSource {
    pub fn new() -> (Self, MockBroker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx,
                closed: Arc::clone(&closed),
            },
            MockBroker { tx, closed },
        )
    }
}

impl MockBroker {
    /// Deliver a raw payload.
    pub fn publish(&self, payload: impl Into<Vec<u8>>) {
        let _ = self.tx.send(Ok(payload.into()));
    }

    /// Deliver a notification encoded as JSON.
    pub fn publish_notification(&self, notification: &Notification) {
        self.publish(super::fixtures::payload(notification));
    }

    /// Deliver a subscription failure.
    pub fn fail(&self, reason: &str) {
        let _ = self.tx.send(Err(BrokerError::Delivery(reason.to_string())));
    }

    /// Whether the consumer closed the subscription.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for MockMessageSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn next_payload(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.close();
        Ok(())
    }
}
