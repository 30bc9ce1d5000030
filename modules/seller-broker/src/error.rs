use crate::topology::ExchangeKind;

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Exchange not found: {0}")]
    UnknownExchange(String),

    #[error("Queue not found: {0}")]
    UnknownQueue(String),

    #[error("Exchange {name} already declared as {existing}")]
    KindMismatch { name: String, existing: ExchangeKind },

    #[error("No binding on exchange {exchange} routes key {routing_key:?}")]
    Unroutable { exchange: String, routing_key: String },

    #[error("Queue {0} already has a consumer")]
    QueueInUse(String),

    #[error("Publish rejected by broker: {0}")]
    Rejected(String),
}
