//! AMQP 0-9-1 bus backed by lapin.
//!
//! One connection per process. Every declare and publish opens its own
//! channel and closes it before returning, success or not. A consumer's
//! channel lives exactly as long as its delivery stream: it is closed when
//! the stream ends, and also when the stream is dropped early.

use std::future::Future;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info};

use crate::bus::{Acknowledger, Delivery, DeliveryStream, MessageBus};
use crate::error::{BrokerError, Result};
use crate::topology::{
    ArgumentValue, Arguments, BindingConfig, ExchangeConfig, ExchangeKind, PublishOptions,
    QueueConfig, SubscribeOptions,
};
use crate::JSON_CONTENT_TYPE;

pub struct AmqpBus {
    connection: Connection,
}

impl AmqpBus {
    pub async fn connect(uri: &str) -> Result<Self> {
        info!("Connecting to AMQP broker");
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        info!("AMQP connection established");
        Ok(Self { connection })
    }

    pub async fn close(&self) -> Result<()> {
        self.connection.close(200, "shutdown").await?;
        Ok(())
    }

    /// Run `op` on a fresh channel and close the channel afterwards,
    /// whatever `op` returned.
    async fn with_channel<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Channel) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let channel = self.connection.create_channel().await?;
        let result = op(channel.clone()).await;
        release(channel).await;
        result
    }
}

async fn release(channel: Channel) {
    if let Err(e) = channel.close(200, "OK").await {
        debug!(error = %e, "Channel close failed (already closed?)");
    }
}

/// Owns a consumer's channel. Dropping it without [`ChannelGuard::release`]
/// closes the channel on a background task.
struct ChannelGuard(Option<Channel>);

impl ChannelGuard {
    async fn release(mut self) {
        if let Some(channel) = self.0.take() {
            release(channel).await;
        }
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        let Some(channel) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(release(channel));
            }
            Err(_) => debug!("No runtime left to close consumer channel"),
        }
    }
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn declare_exchange(&self, exchange: &ExchangeConfig) -> Result<()> {
        self.with_channel(|channel| async move {
            channel
                .exchange_declare(
                    &exchange.name,
                    exchange_kind(exchange.kind),
                    ExchangeDeclareOptions {
                        passive: false,
                        durable: exchange.durable,
                        auto_delete: exchange.auto_delete,
                        internal: exchange.internal,
                        nowait: exchange.no_wait,
                    },
                    field_table(&exchange.arguments),
                )
                .await?;
            Ok(())
        })
        .await
    }

    async fn declare_queue(&self, queue: &QueueConfig) -> Result<()> {
        self.with_channel(|channel| async move {
            channel
                .queue_declare(
                    &queue.name,
                    QueueDeclareOptions {
                        passive: false,
                        durable: queue.durable,
                        exclusive: queue.exclusive,
                        auto_delete: queue.auto_delete,
                        nowait: queue.no_wait,
                    },
                    field_table(&queue.arguments),
                )
                .await?;
            Ok(())
        })
        .await
    }

    async fn bind_queue(&self, binding: &BindingConfig) -> Result<()> {
        self.with_channel(|channel| async move {
            channel
                .queue_bind(
                    &binding.queue,
                    &binding.exchange,
                    &binding.routing_key,
                    QueueBindOptions {
                        nowait: binding.no_wait,
                    },
                    field_table(&binding.arguments),
                )
                .await?;
            Ok(())
        })
        .await
    }

    async fn publish(
        &self,
        exchange: &str,
        options: &PublishOptions,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.with_channel(|channel| async move {
            let confirm = channel
                .basic_publish(
                    exchange,
                    &options.routing_key,
                    BasicPublishOptions {
                        mandatory: options.mandatory,
                        immediate: options.immediate,
                    },
                    &payload,
                    BasicProperties::default().with_content_type(JSON_CONTENT_TYPE.into()),
                )
                .await?;
            confirm.await?;
            Ok(())
        })
        .await
    }

    async fn consume(&self, queue: &str, options: &SubscribeOptions) -> Result<DeliveryStream> {
        let channel = self.connection.create_channel().await?;

        let consumer = channel
            .basic_consume(
                queue,
                &options.consumer_tag,
                BasicConsumeOptions {
                    no_local: options.no_local,
                    no_ack: options.auto_ack,
                    exclusive: options.exclusive,
                    nowait: options.no_wait,
                },
                field_table(&options.arguments),
            )
            .await;

        let consumer = match consumer {
            Ok(consumer) => consumer,
            Err(e) => {
                release(channel).await;
                return Err(e.into());
            }
        };

        info!(queue, consumer_tag = consumer.tag().as_str(), "AMQP consumer started");

        let stream = futures::stream::unfold(
            (consumer, ChannelGuard(Some(channel))),
            |(mut consumer, guard)| async move {
                match consumer.next().await {
                    Some(item) => {
                        let delivery = item.map(into_delivery).map_err(BrokerError::from);
                        Some((delivery, (consumer, guard)))
                    }
                    None => {
                        guard.release().await;
                        None
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<()> {
        self.0
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await?;
        Ok(())
    }
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let routing_key = delivery.routing_key.as_str().to_string();
    let content_type = delivery
        .properties
        .content_type()
        .as_ref()
        .map(|ct| ct.as_str().to_string());

    let mut converted =
        Delivery::new(routing_key, delivery.data).with_acker(AmqpAcker(delivery.acker));
    if let Some(content_type) = content_type {
        converted = converted.with_content_type(content_type);
    }
    converted
}

fn exchange_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::Headers => lapin::ExchangeKind::Headers,
    }
}

fn field_table(arguments: &Arguments) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in arguments {
        let value = match value {
            ArgumentValue::Bool(b) => AMQPValue::Boolean(*b),
            ArgumentValue::Int(i) => AMQPValue::LongLongInt(*i),
            ArgumentValue::Float(f) => AMQPValue::Double(*f),
            ArgumentValue::Text(s) => AMQPValue::LongString(s.clone().into()),
        };
        table.insert(key.clone().into(), value);
    }
    table
}
