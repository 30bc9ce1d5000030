//! In-process broker for tests.
//!
//! Models the parts of AMQP the pipeline relies on: typed exchanges, named
//! queues, topic bindings (`*` / `#`), mandatory routing and per-delivery
//! ack/reject. Everything published is also recorded so tests can assert on
//! what left a service. Queues can be closed to end a consumer's stream,
//! which makes subscription loops run to completion without sleeps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bus::{Acknowledger, Delivery, DeliveryStream, MessageBus};
use crate::error::{BrokerError, Result};
use crate::topology::{
    BindingConfig, ExchangeConfig, ExchangeKind, PublishOptions, QueueConfig, SubscribeOptions,
};
use crate::JSON_CONTENT_TYPE;

/// A message as it left a publisher, routed or not.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// How a consumer settled a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckRecord {
    Ack { queue: String },
    Reject { queue: String, requeue: bool },
}

struct QueueSlot {
    sender: Option<mpsc::UnboundedSender<Delivery>>,
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
    consumer_tag: Option<String>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueSlot>,
    bindings: Vec<BindingConfig>,
    published: Vec<PublishedMessage>,
    acks: Vec<AckRecord>,
    failing_publishes: usize,
}

/// Thread-safe in-memory broker. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail with [`BrokerError::Rejected`].
    pub fn fail_next_publishes(&self, count: usize) {
        self.state.lock().unwrap().failing_publishes = count;
    }

    /// Stop accepting messages on `queue`. Once the queue is drained its
    /// consumer stream ends.
    pub fn close_queue(&self, queue: &str) {
        if let Some(slot) = self.state.lock().unwrap().queues.get_mut(queue) {
            slot.sender = None;
        }
    }

    /// Every message published to `exchange`, in publish order.
    pub fn published(&self, exchange: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|m| m.exchange == exchange)
            .cloned()
            .collect()
    }

    /// Messages published to `exchange`, decoded as `T`.
    pub fn published_as<T: DeserializeOwned>(&self, exchange: &str) -> Vec<T> {
        self.published(exchange)
            .iter()
            .map(|m| serde_json::from_slice(&m.body).expect("published body is valid JSON"))
            .collect()
    }

    pub fn acks(&self) -> Vec<AckRecord> {
        self.state.lock().unwrap().acks.clone()
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.state.lock().unwrap().exchanges.contains_key(name)
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.state.lock().unwrap().queues.contains_key(name)
    }

    pub fn bindings(&self) -> Vec<BindingConfig> {
        self.state.lock().unwrap().bindings.clone()
    }

    /// Consumer tag registered on `queue`, generated when the subscriber
    /// left it empty.
    pub fn consumer_tag(&self, queue: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .and_then(|slot| slot.consumer_tag.clone())
    }

    /// Push a raw body straight onto a queue, bypassing exchanges.
    pub fn inject(&self, queue: &str, routing_key: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        let state = self.state.lock().unwrap();
        let slot = state
            .queues
            .get(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        if let Some(sender) = &slot.sender {
            let delivery = self.delivery(queue, routing_key, body.into(), sender.clone());
            let _ = sender.send(delivery);
        }
        Ok(())
    }

    fn delivery(
        &self,
        queue: &str,
        routing_key: &str,
        body: Vec<u8>,
        sender: mpsc::UnboundedSender<Delivery>,
    ) -> Delivery {
        let acker = MemoryAcker {
            broker: self.clone(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
            body: body.clone(),
            sender,
        };
        Delivery::new(routing_key, body)
            .with_content_type(JSON_CONTENT_TYPE)
            .with_acker(acker)
    }
}

#[async_trait]
impl MessageBus for MemoryBroker {
    async fn declare_exchange(&self, exchange: &ExchangeConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.exchanges.get(&exchange.name).copied() {
            Some(existing) if existing != exchange.kind => Err(BrokerError::KindMismatch {
                name: exchange.name.clone(),
                existing,
            }),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(exchange.name.clone(), exchange.kind);
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, queue: &QueueConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.queues.entry(queue.name.clone()).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            QueueSlot {
                sender: Some(sender),
                receiver: Some(receiver),
                consumer_tag: None,
            }
        });
        Ok(())
    }

    async fn bind_queue(&self, binding: &BindingConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.exchanges.contains_key(&binding.exchange) {
            return Err(BrokerError::UnknownExchange(binding.exchange.clone()));
        }
        if !state.queues.contains_key(&binding.queue) {
            return Err(BrokerError::UnknownQueue(binding.queue.clone()));
        }
        let exists = state.bindings.iter().any(|b| {
            b.queue == binding.queue
                && b.exchange == binding.exchange
                && b.routing_key == binding.routing_key
        });
        if !exists {
            state.bindings.push(binding.clone());
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        options: &PublishOptions,
        payload: Vec<u8>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if state.failing_publishes > 0 {
            state.failing_publishes -= 1;
            return Err(BrokerError::Rejected("injected publish failure".to_string()));
        }

        let kind = *state
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_string()))?;

        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: options.routing_key.clone(),
            body: payload.clone(),
        });

        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && routes(kind, &b.routing_key, &options.routing_key))
            .map(|b| b.queue.clone())
            .collect();

        if targets.is_empty() && options.mandatory {
            return Err(BrokerError::Unroutable {
                exchange: exchange.to_string(),
                routing_key: options.routing_key.clone(),
            });
        }

        for queue in targets {
            let sender = state.queues.get(&queue).and_then(|slot| slot.sender.clone());
            if let Some(sender) = sender {
                let delivery =
                    self.delivery(&queue, &options.routing_key, payload.clone(), sender.clone());
                let _ = sender.send(delivery);
            }
        }

        Ok(())
    }

    async fn consume(&self, queue: &str, options: &SubscribeOptions) -> Result<DeliveryStream> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        let receiver = slot
            .receiver
            .take()
            .ok_or_else(|| BrokerError::QueueInUse(queue.to_string()))?;

        slot.consumer_tag = Some(if options.consumer_tag.is_empty() {
            format!("ctag-{}", Uuid::new_v4())
        } else {
            options.consumer_tag.clone()
        });

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|delivery| (Ok(delivery), receiver))
        });

        Ok(Box::pin(stream))
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    routing_key: String,
    body: Vec<u8>,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        self.broker.state.lock().unwrap().acks.push(AckRecord::Ack {
            queue: self.queue.clone(),
        });
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<()> {
        self.broker.state.lock().unwrap().acks.push(AckRecord::Reject {
            queue: self.queue.clone(),
            requeue,
        });
        if requeue {
            let delivery = self.broker.delivery(
                &self.queue,
                &self.routing_key,
                self.body.clone(),
                self.sender.clone(),
            );
            let _ = self.sender.send(delivery);
        }
        Ok(())
    }
}

fn routes(kind: ExchangeKind, binding_key: &str, routing_key: &str) -> bool {
    match kind {
        ExchangeKind::Direct => binding_key == routing_key,
        ExchangeKind::Fanout => true,
        ExchangeKind::Topic => topic_matches(binding_key, routing_key),
        // Header matching is not modelled.
        ExchangeKind::Headers => false,
    }
}

/// AMQP topic matching: words split on `.`, `*` matches exactly one word,
/// `#` matches zero or more.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}
