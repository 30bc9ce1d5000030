//! Declarative broker topology, loaded from each service's TOML file.
//!
//! Every flag defaults to `false` except `auto_ack`, which defaults to `true`
//! to keep the at-most-once-on-failure consumption the services run with.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use tracing::info;

use crate::bus::MessageBus;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Direct,
    Fanout,
    #[default]
    Topic,
    Headers,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
        };
        f.write_str(name)
    }
}

/// A value in an `arguments` table (`x-message-ttl`, `x-queue-type`, ...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

pub type Arguments = BTreeMap<String, ArgumentValue>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ExchangeKind,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub no_wait: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ExchangeConfig {
    /// A durable topic exchange with every other flag off.
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
            auto_delete: false,
            internal: false,
            no_wait: false,
            arguments: Arguments::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    pub name: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub no_wait: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

impl QueueConfig {
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            auto_delete: false,
            exclusive: false,
            no_wait: false,
            arguments: Arguments::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
    #[serde(default)]
    pub no_wait: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

impl BindingConfig {
    pub fn new(
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            no_wait: false,
            arguments: Arguments::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishOptions {
    #[serde(default)]
    pub routing_key: String,
    #[serde(default)]
    pub mandatory: bool,
    /// Passed through as configured. RabbitMQ 3+ refuses `immediate`.
    #[serde(default)]
    pub immediate: bool,
}

impl PublishOptions {
    pub fn routed(routing_key: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscribeOptions {
    /// Empty lets the broker generate a tag.
    #[serde(default)]
    pub consumer_tag: String,
    #[serde(default = "default_auto_ack")]
    pub auto_ack: bool,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub no_local: bool,
    #[serde(default)]
    pub no_wait: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

fn default_auto_ack() -> bool {
    true
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            consumer_tag: String::new(),
            auto_ack: default_auto_ack(),
            exclusive: false,
            no_local: false,
            no_wait: false,
            arguments: Arguments::new(),
        }
    }
}

/// Everything a publishing service declares before its first publish.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub publish: PublishOptions,
}

/// Everything a consuming service declares before it subscribes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriberConfig {
    pub exchange: ExchangeConfig,
    pub queue: QueueConfig,
    pub binding: BindingConfig,
    #[serde(default)]
    pub subscribe: SubscribeOptions,
}

/// Declare exchange, queue and binding, in that order. Idempotent on the
/// broker side; any failure is returned and is meant to stop startup.
pub async fn declare_topology(bus: &dyn MessageBus, config: &SubscriberConfig) -> Result<()> {
    bus.declare_exchange(&config.exchange).await?;
    bus.declare_queue(&config.queue).await?;
    bus.bind_queue(&config.binding).await?;

    info!(
        exchange = %config.exchange.name,
        queue = %config.queue.name,
        routing_key = %config.binding.routing_key,
        "Broker topology declared"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_config_defaults_to_auto_ack() {
        let config: SubscriberConfig = toml::from_str(
            r#"
            [exchange]
            name = "order"

            [queue]
            name = "statistic.order"
            durable = true

            [binding]
            queue = "statistic.order"
            exchange = "order"
            routing_key = "order.#"
            "#,
        )
        .unwrap();

        assert_eq!(config.exchange.kind, ExchangeKind::Topic);
        assert!(!config.exchange.durable);
        assert!(config.queue.durable);
        assert!(config.subscribe.auto_ack);
        assert!(config.subscribe.consumer_tag.is_empty());
    }

    #[test]
    fn arguments_keep_their_types() {
        let config: QueueConfig = toml::from_str(
            r#"
            name = "q"
            [arguments]
            x-message-ttl = 60000
            x-queue-type = "classic"
            x-single-active-consumer = true
            "#,
        )
        .unwrap();

        assert_eq!(config.arguments["x-message-ttl"], ArgumentValue::Int(60000));
        assert_eq!(
            config.arguments["x-queue-type"],
            ArgumentValue::Text("classic".to_string())
        );
        assert_eq!(
            config.arguments["x-single-active-consumer"],
            ArgumentValue::Bool(true)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<ExchangeConfig, _> =
            toml::from_str("name = \"order\"\ndurible = true");
        assert!(result.is_err());
    }

    #[test]
    fn exchange_kind_parses_lowercase() {
        let config: ExchangeConfig = toml::from_str("name = \"x\"\nkind = \"fanout\"").unwrap();
        assert_eq!(config.kind, ExchangeKind::Fanout);
        assert_eq!(config.kind.to_string(), "fanout");
    }
}
