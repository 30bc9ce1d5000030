use seller_common::InvalidDate;
use seller_store::StoreError;

pub type Result<T> = std::result::Result<T, FoldError>;

#[derive(Debug, thiserror::Error)]
pub enum FoldError {
    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error("Analytic store failed: {0}")]
    Store(#[from] StoreError),
}
