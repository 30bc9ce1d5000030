//! Binds a subscriber to a handler on its own task.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bus::MessageBus;
use crate::error::Result;
use crate::topology::SubscriberConfig;
use crate::typed::Subscriber;

/// What a handler did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The event changed stored state (and may have been republished).
    Applied,
    /// The event was ignored on purpose; retrying would not help.
    Dropped(String),
    /// The event could not be applied because a dependency failed.
    Failed(String),
}

impl HandleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, HandleOutcome::Applied)
    }
}

#[async_trait]
pub trait EventHandler<T>: Send + Sync {
    /// Handle one decoded event. Never panics on bad input; failures are
    /// reported through the outcome and logged by the handler itself.
    async fn handle(&self, event: T) -> HandleOutcome;
}

/// Run `subscriber` against `handler` on a background task.
///
/// The task ends when the delivery stream ends or the subscription fails.
/// Either way it is logged; the caller decides whether that is fatal.
pub fn spawn_subscription<T, H>(
    name: &'static str,
    subscriber: Subscriber<T>,
    handler: Arc<H>,
) -> JoinHandle<()>
where
    T: DeserializeOwned + Send + 'static,
    H: EventHandler<T> + 'static,
{
    tokio::spawn(async move {
        info!(pipeline = name, queue = subscriber.queue(), "Subscription started");
        match subscriber.subscribe(handler.as_ref()).await {
            Ok(()) => info!(pipeline = name, "Subscription ended"),
            Err(e) => error!(pipeline = name, error = %e, "Subscription failed"),
        }
    })
}

/// Declare the consuming side of `config` and start handling deliveries.
///
/// Topology errors are returned before anything is spawned.
pub async fn start_pipeline<T, H>(
    name: &'static str,
    bus: Arc<dyn MessageBus>,
    config: SubscriberConfig,
    handler: Arc<H>,
) -> Result<JoinHandle<()>>
where
    T: DeserializeOwned + Send + 'static,
    H: EventHandler<T> + 'static,
{
    let subscriber = Subscriber::<T>::declare(bus, config).await?;
    Ok(spawn_subscription(name, subscriber, handler))
}
