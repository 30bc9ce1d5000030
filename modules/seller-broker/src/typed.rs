use std::marker::PhantomData;
use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bus::{Delivery, MessageBus};
use crate::driver::{EventHandler, HandleOutcome};
use crate::error::Result;
use crate::topology::{declare_topology, PublishOptions, PublisherConfig, SubscriberConfig};

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishes `T` as JSON to one exchange with fixed publish options.
pub struct Publisher<T> {
    bus: Arc<dyn MessageBus>,
    exchange: String,
    options: PublishOptions,
    _event: PhantomData<fn(&T)>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            exchange: self.exchange.clone(),
            options: self.options.clone(),
            _event: PhantomData,
        }
    }
}

impl<T: Serialize> Publisher<T> {
    /// Declare the exchange, then hand back a publisher bound to it.
    pub async fn declare(bus: Arc<dyn MessageBus>, config: PublisherConfig) -> Result<Self> {
        bus.declare_exchange(&config.exchange).await?;
        Ok(Self::new(bus, config.exchange.name, config.publish))
    }

    /// Bind to an exchange that is already declared.
    pub fn new(bus: Arc<dyn MessageBus>, exchange: impl Into<String>, options: PublishOptions) -> Self {
        Self {
            bus,
            exchange: exchange.into(),
            options,
            _event: PhantomData,
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub async fn publish(&self, event: &T) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.bus.publish(&self.exchange, &self.options, payload).await?;
        debug!(
            exchange = %self.exchange,
            routing_key = %self.options.routing_key,
            "Event published"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Consumes `T` from one queue and hands each decoded event to a handler.
pub struct Subscriber<T> {
    bus: Arc<dyn MessageBus>,
    config: SubscriberConfig,
    _event: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + Send + 'static> Subscriber<T> {
    /// Declare exchange, queue and binding, then hand back a subscriber.
    pub async fn declare(bus: Arc<dyn MessageBus>, config: SubscriberConfig) -> Result<Self> {
        declare_topology(bus.as_ref(), &config).await?;
        Ok(Self {
            bus,
            config,
            _event: PhantomData,
        })
    }

    pub fn queue(&self) -> &str {
        &self.config.queue.name
    }

    fn manual_ack(&self) -> bool {
        !self.config.subscribe.auto_ack
    }

    /// Consume until the delivery stream ends.
    ///
    /// Undecodable messages are logged and skipped. Handler outcomes never
    /// stop the loop. With manual ack, applied and dropped events are acked,
    /// failed ones are requeued and undecodable ones rejected for good.
    pub async fn subscribe<H>(&self, handler: &H) -> Result<()>
    where
        H: EventHandler<T> + ?Sized,
    {
        let mut deliveries = self
            .bus
            .consume(&self.config.queue.name, &self.config.subscribe)
            .await?;

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery?;

            let event: T = match serde_json::from_slice(&delivery.body) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        queue = %self.config.queue.name,
                        routing_key = %delivery.routing_key,
                        error = %e,
                        "Skipping undecodable message"
                    );
                    if self.manual_ack() {
                        self.settle(&delivery, false, false).await;
                    }
                    continue;
                }
            };

            let outcome = handler.handle(event).await;
            if self.manual_ack() {
                match outcome {
                    HandleOutcome::Failed(_) => self.settle(&delivery, false, true).await,
                    _ => self.settle(&delivery, true, false).await,
                }
            }
        }

        Ok(())
    }

    async fn settle(&self, delivery: &Delivery, ack: bool, requeue: bool) {
        let result = if ack {
            delivery.ack().await
        } else {
            delivery.reject(requeue).await
        };
        if let Err(e) = result {
            warn!(queue = %self.config.queue.name, error = %e, "Failed to settle delivery");
        }
    }
}
