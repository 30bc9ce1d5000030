//! Broker channel for the seller pipeline.
//!
//! A byte-level [`MessageBus`] capability (AMQP via lapin, or in-memory for
//! tests) with typed [`Publisher`] / [`Subscriber`] wrappers on top, fixed to
//! one event type at the call site. The driver binds a subscriber to an
//! [`EventHandler`] on its own task.

pub mod amqp;
pub mod bus;
pub mod driver;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
#[cfg(feature = "test-utils")]
pub mod testutil;
pub mod topology;
pub mod typed;

pub use amqp::AmqpBus;
pub use bus::{Acknowledger, Delivery, DeliveryStream, MessageBus};
pub use driver::{spawn_subscription, start_pipeline, EventHandler, HandleOutcome};
pub use error::{BrokerError, Result};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{AckRecord, MemoryBroker, PublishedMessage};
pub use topology::{
    declare_topology, ArgumentValue, BindingConfig, ExchangeConfig, ExchangeKind, PublishOptions,
    PublisherConfig, QueueConfig, SubscribeOptions, SubscriberConfig,
};
pub use typed::{Publisher, Subscriber};

/// Content type stamped on every published message.
pub const JSON_CONTENT_TYPE: &str = "application/json";
