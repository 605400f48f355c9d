//! Intake of notifications from the message broker.
//!
//! A [`QueueConsumer`] owns a [`MessageSource`], decodes every payload and
//! pushes the result onto the work queue. Undecodable payloads are logged and
//! dropped; the subscription keeps going.

mod amqp;
mod intake;
mod source;

pub use amqp::AmqpSource;
pub use intake::QueueConsumer;
pub use source::{BrokerError, MessageSource};
