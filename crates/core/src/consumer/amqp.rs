//! AMQP subscription backed by lapin.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tracing::info;

use crate::config::AmqpConfig;

use super::source::{BrokerError, MessageSource};

const CONSUMER_TAG: &str = "tagdeploy";

/// Reply code for a normal channel/connection close.
const REPLY_SUCCESS: u16 = 200;

/// Consumes one queue with automatic acknowledgment: a message counts as
/// handled as soon as it is delivered, whatever happens to the deployment.
pub struct AmqpSource {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl AmqpSource {
    /// Connect and start consuming. Fails if the broker or queue is unavailable.
    pub async fn connect(config: &AmqpConfig) -> Result<Self, BrokerError> {
        info!("Connecting to broker at {}", config.redacted_uri());
        let connection = Connection::connect(&config.amqp_uri(), ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect {
                uri: config.redacted_uri(),
                reason: e.to_string(),
            })?;

        let subscribe_error = |e: lapin::Error| BrokerError::Subscribe {
            queue: config.queue.clone(),
            reason: e.to_string(),
        };

        let channel = connection.create_channel().await.map_err(subscribe_error)?;
        let consumer = channel
            .basic_consume(
                &config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(subscribe_error)?;

        info!("Subscribed to queue {}", config.queue);
        Ok(Self {
            connection,
            channel,
            consumer,
            queue: config.queue.clone(),
        })
    }
}

#[async_trait]
impl MessageSource for AmqpSource {
    fn name(&self) -> &str {
        &self.queue
    }

    async fn next_payload(&mut self) -> Option<Result<Vec<u8>, BrokerError>> {
        match self.consumer.next().await? {
            Ok(delivery) => Some(Ok(delivery.data)),
            Err(e) => Some(Err(BrokerError::Delivery(e.to_string()))),
        }
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        let channel = self
            .channel
            .close(REPLY_SUCCESS, "consumer closed")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()));
        let connection = self
            .connection
            .close(REPLY_SUCCESS, "consumer closed")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()));
        channel.and(connection)
    }
}
