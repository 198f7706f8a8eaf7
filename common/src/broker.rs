use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use thiserror::Error;

use crate::args::BrokerArgs;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(#[from] lapin::Error),
}

/// Single persistent AMQP connection + channel, publishing to one durable
/// queue. Reconnect on transport failure is out of scope; the process is
/// restarted instead, matching §4.10's contract.
pub struct Broker {
    channel: Channel,
    queue: String,
}

impl Broker {
    pub async fn connect(args: &BrokerArgs) -> Result<Self, BrokerError> {
        let conn = Connection::connect(&args.uri(), ConnectionProperties::default()).await?;
        let channel = conn.create_channel().await?;
        Ok(Self {
            channel,
            queue: args.rabbit_result_queue.clone(),
        })
    }

    /// Declares the configured queue (idempotent) and publishes `body` as
    /// `application/json` with the empty exchange, routing key = queue
    /// name, `mandatory=false`, `immediate=false`.
    pub async fn send(&self, body: Vec<u8>) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;

        Ok(())
    }
}
