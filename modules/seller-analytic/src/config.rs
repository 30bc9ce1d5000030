use seller_broker::SubscriberConfig;
use serde::Deserialize;

/// Broker topology for `analytic-service`, read from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticServiceConfig {
    /// Where statistic events are consumed from.
    pub statistic: SubscriberConfig,
}
