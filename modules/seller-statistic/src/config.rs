use seller_broker::{PublisherConfig, SubscriberConfig};
use serde::Deserialize;

/// Broker topology for `statistic-service`, read from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatisticServiceConfig {
    /// Where order events are consumed from.
    pub order: SubscriberConfig,
    /// Where statistic events are published.
    pub statistic: PublisherConfig,
}
