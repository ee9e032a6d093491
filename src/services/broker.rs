use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::info;

use crate::errors::GatewayError;
use crate::models::intent::IntentCreatedMessage;

const EXCHANGE: &str = "payment_intents_exchange";
const QUEUE: &str = "payment_intents_queue";
const ROUTING_KEY: &str = "payment.intent.created";

/// Broker Interface (§4.3). The publisher and the worker each get their own
/// channel — channels are not safe to share across concurrent publish and
/// consume — but both declare the same durable topology idempotently.
#[derive(Clone)]
pub struct Broker {
    connection_uri: String,
}

impl Broker {
    pub fn new(connection_uri: String) -> Self {
        Self { connection_uri }
    }

    async fn connect(&self) -> Result<Connection, GatewayError> {
        Connection::connect(&self.connection_uri, ConnectionProperties::default())
            .await
            .map_err(GatewayError::Broker)
    }

    async fn declare_topology(&self, channel: &Channel) -> Result<(), GatewayError> {
        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                QUEUE,
                EXCHANGE,
                ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(())
    }

    /// Opens a publishing channel, declares the topology, and returns a
    /// `Publisher` that owns it for the lifetime of the process.
    pub async fn publisher(&self) -> Result<Publisher, GatewayError> {
        let connection = self.connect().await?;
        let channel = connection.create_channel().await?;
        self.declare_topology(&channel).await?;

        // Leaking the connection keeps it alive for the channel's lifetime;
        // the process holds exactly one of these for its whole run.
        Box::leak(Box::new(connection));

        Ok(Publisher { channel })
    }

    /// Opens a consuming channel, declares the topology, sets
    /// `prefetch_count=1` for ordered one-at-a-time processing, and starts
    /// consuming with manual acknowledgement.
    pub async fn consumer(&self) -> Result<Consumer, GatewayError> {
        let connection = self.connect().await?;
        let channel = connection.create_channel().await?;
        self.declare_topology(&channel).await?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                QUEUE,
                "cashflow-gateway-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = QUEUE, "worker consumer registered");
        Box::leak(Box::new(connection));

        Ok(consumer)
    }
}

/// Thin wrapper the Intake Service publishes through.
pub struct Publisher {
    channel: Channel,
}

impl Publisher {
    /// Publishes with `content-type=application/json`,
    /// `delivery-mode=persistent`, routing key `payment.intent.created`. A
    /// publish failure after the DB insert is the caller's to log and
    /// swallow (§4.3) — it is surfaced here as an error, not rolled back.
    pub async fn publish(&self, message: &IntentCreatedMessage) -> Result<(), GatewayError> {
        let body = serde_json::to_vec(message)
            .map_err(|e| GatewayError::Internal(format!("failed to encode broker message: {e}")))?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        self.channel
            .basic_publish(
                EXCHANGE,
                ROUTING_KEY,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await?
            .await?;

        Ok(())
    }
}

pub async fn ack(delivery: &Delivery) -> Result<(), GatewayError> {
    delivery.ack(BasicAckOptions::default()).await?;
    Ok(())
}

pub async fn nack(delivery: &Delivery, requeue: bool) -> Result<(), GatewayError> {
    delivery
        .nack(BasicNackOptions {
            requeue,
            ..Default::default()
        })
        .await?;
    Ok(())
}
