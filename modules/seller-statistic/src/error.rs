use seller_common::InvalidDate;
use seller_store::StoreError;

pub type Result<T> = std::result::Result<T, FoldError>;

/// Why one order event could not be folded.
#[derive(Debug, thiserror::Error)]
pub enum FoldError {
    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error("Order event rejected: {0}")]
    Overflow(String),

    #[error("Statistic store failed: {0}")]
    Store(#[from] StoreError),
}
