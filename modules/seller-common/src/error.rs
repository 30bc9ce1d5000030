use thiserror::Error;

/// A date string that does not follow the fixed `YYYY-MM-DD` wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date {0:?}: expected YYYY-MM-DD")]
pub struct InvalidDate(pub String);
