//! AmqpBus against a real RabbitMQ broker.
//!
//! Requirements: Docker (for RabbitMQ via testcontainers)
//!
//! Run with: cargo test -p seller-broker --features test-utils --test amqp_bus_test

#![cfg(feature = "test-utils")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use seller_broker::{
    declare_topology, spawn_subscription, BindingConfig, EventHandler, ExchangeConfig,
    HandleOutcome, MessageBus, PublishOptions, Publisher, PublisherConfig, QueueConfig,
    SubscribeOptions, Subscriber, SubscriberConfig, JSON_CONTENT_TYPE,
};

const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<u32>>,
    attempts: Mutex<u32>,
}

#[async_trait]
impl EventHandler<Ping> for Recorder {
    async fn handle(&self, event: Ping) -> HandleOutcome {
        let mut attempts = self.attempts.lock().unwrap();
        *attempts += 1;
        if *attempts == 1 {
            return HandleOutcome::Failed("store unavailable".to_string());
        }
        self.seen.lock().unwrap().push(event.seq);
        HandleOutcome::Applied
    }
}

fn subscriber_config(queue: &str, auto_ack: bool) -> SubscriberConfig {
    SubscriberConfig {
        exchange: ExchangeConfig::topic("ping"),
        queue: QueueConfig::durable(queue),
        binding: BindingConfig::new(queue, "ping", "ping.#"),
        subscribe: SubscribeOptions {
            auto_ack,
            ..SubscribeOptions::default()
        },
    }
}

async fn publisher(bus: Arc<dyn MessageBus>) -> Publisher<Ping> {
    Publisher::declare(
        bus,
        PublisherConfig {
            exchange: ExchangeConfig::topic("ping"),
            publish: PublishOptions::routed("ping.created"),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn published_event_arrives_as_json() {
    let (_container, bus) = seller_broker::testutil::rabbitmq_container().await;
    let bus: Arc<dyn MessageBus> = Arc::new(bus);

    let config = subscriber_config("ping.round_trip", true);
    declare_topology(bus.as_ref(), &config).await.unwrap();
    let mut deliveries = bus
        .consume(&config.queue.name, &config.subscribe)
        .await
        .unwrap();

    publisher(bus.clone())
        .await
        .publish(&Ping { seq: 7 })
        .await
        .unwrap();

    let delivery = timeout(WAIT, deliveries.next())
        .await
        .expect("no delivery in time")
        .expect("stream ended")
        .unwrap();

    assert_eq!(delivery.routing_key, "ping.created");
    assert_eq!(delivery.content_type.as_deref(), Some(JSON_CONTENT_TYPE));
    let ping: Ping = serde_json::from_slice(&delivery.body).unwrap();
    assert_eq!(ping, Ping { seq: 7 });
}

#[tokio::test]
async fn failed_event_is_redelivered_under_manual_ack() {
    let (_container, bus) = seller_broker::testutil::rabbitmq_container().await;
    let bus: Arc<dyn MessageBus> = Arc::new(bus);

    let subscriber =
        Subscriber::<Ping>::declare(bus.clone(), subscriber_config("ping.requeue", false))
            .await
            .unwrap();
    let recorder = Arc::new(Recorder::default());
    let task = spawn_subscription("ping", subscriber, recorder.clone());

    publisher(bus.clone())
        .await
        .publish(&Ping { seq: 1 })
        .await
        .unwrap();

    let applied = timeout(WAIT, async {
        loop {
            if !recorder.seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    task.abort();

    assert!(applied.is_ok(), "requeued event never applied");
    assert_eq!(*recorder.seen.lock().unwrap(), vec![1]);
    assert_eq!(*recorder.attempts.lock().unwrap(), 2);
}

#[tokio::test]
async fn dropped_stream_frees_an_exclusive_queue() {
    let (_container, bus) = seller_broker::testutil::rabbitmq_container().await;
    let bus: Arc<dyn MessageBus> = Arc::new(bus);

    let mut config = subscriber_config("ping.exclusive", true);
    config.subscribe.exclusive = true;
    declare_topology(bus.as_ref(), &config).await.unwrap();

    let first = bus
        .consume(&config.queue.name, &config.subscribe)
        .await
        .unwrap();
    assert!(bus
        .consume(&config.queue.name, &config.subscribe)
        .await
        .is_err());

    // Dropping the stream early must still close its channel, which cancels
    // the exclusive consumer.
    drop(first);

    let reopened = timeout(WAIT, async {
        loop {
            match bus.consume(&config.queue.name, &config.subscribe).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    })
    .await;
    assert!(reopened.is_ok(), "exclusive consumer was never released");
}
