use std::sync::Arc;
use std::time::Duration;

use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer, ExchangeKind,
};
use serde::Serialize;

use crate::types::Event;

pub const EXCHANGE_NAME: &str = "kindred.events";

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct RabbitMQClient {
    // Held so the channel outlives the caller's handle on the connection.
    _connection: Arc<Connection>,
    channel: Channel,
}

impl RabbitMQClient {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                EXCHANGE_NAME,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(exchange = EXCHANGE_NAME, "connected to RabbitMQ");
        Ok(Self {
            _connection: Arc::new(connection),
            channel,
        })
    }

    /// Connects with a fixed backoff between attempts. Used at service startup
    /// where the broker may still be booting.
    pub async fn connect_with_retry(
        url: &str,
        attempts: u32,
        backoff: Duration,
    ) -> Result<Self, BrokerError> {
        let mut attempt = 1;
        loop {
            match Self::connect(url).await {
                Ok(client) => return Ok(client),
                Err(e) if attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "RabbitMQ not reachable, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn publish<T: Serialize>(
        &self,
        routing_key: &str,
        event: &Event<T>,
    ) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(event)?;

        self.channel
            .basic_publish(
                EXCHANGE_NAME,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await?
            .await?;

        tracing::debug!(
            routing_key = %routing_key,
            event_id = %event.id,
            "event published"
        );

        Ok(())
    }

    /// Declares a durable queue, binds it to every routing key and starts
    /// consuming with the given prefetch window.
    pub async fn subscribe(
        &self,
        queue_name: &str,
        routing_keys: &[&str],
        prefetch: u16,
    ) -> Result<Consumer, BrokerError> {
        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        for key in routing_keys {
            self.channel
                .queue_bind(
                    queue_name,
                    EXCHANGE_NAME,
                    key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let consumer = self
            .channel
            .basic_consume(
                queue_name,
                &format!("{queue_name}-consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(
            queue = %queue_name,
            bindings = ?routing_keys,
            prefetch,
            "subscribed to RabbitMQ queue"
        );

        Ok(consumer)
    }
}
