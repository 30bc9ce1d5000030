use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::topology::{BindingConfig, ExchangeConfig, PublishOptions, QueueConfig, SubscribeOptions};

// ---------------------------------------------------------------------------
// MessageBus
// ---------------------------------------------------------------------------

/// Byte-level publish/subscribe over a topic-exchange broker.
///
/// Implementations own their connection; callers share one bus per process
/// behind an `Arc`. Event types are fixed one level up, in
/// [`Publisher`](crate::Publisher) and [`Subscriber`](crate::Subscriber).
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn declare_exchange(&self, exchange: &ExchangeConfig) -> Result<()>;

    async fn declare_queue(&self, queue: &QueueConfig) -> Result<()>;

    async fn bind_queue(&self, binding: &BindingConfig) -> Result<()>;

    /// Send one payload to `exchange`. Returns once the broker has accepted it.
    async fn publish(&self, exchange: &str, options: &PublishOptions, payload: Vec<u8>)
        -> Result<()>;

    /// Open a long-lived delivery stream on `queue`.
    async fn consume(&self, queue: &str, options: &SubscribeOptions) -> Result<DeliveryStream>;
}

pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Settles a delivery consumed without auto-ack.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;

    async fn reject(&self, requeue: bool) -> Result<()>;
}

/// One message taken off a queue.
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Delivery {
    pub fn new(routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.into(),
            body,
            content_type: None,
            acker: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_acker(mut self, acker: impl Acknowledger + 'static) -> Self {
        self.acker = Some(Box::new(acker));
        self
    }

    /// No-op when the delivery carries no acknowledger.
    pub async fn ack(&self) -> Result<()> {
        match &self.acker {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }

    pub async fn reject(&self, requeue: bool) -> Result<()> {
        match &self.acker {
            Some(acker) => acker.reject(requeue).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("body_len", &self.body.len())
            .field("content_type", &self.content_type)
            .field("ackable", &self.acker.is_some())
            .finish()
    }
}
