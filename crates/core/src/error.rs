use thiserror::Error;

use crate::types::{RejectReason, UnfilledReason};

pub type MarketResult<T> = Result<T, MarketError>;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Click rejected: {0:?}")]
    PolicyRejected(RejectReason),

    #[error("No ad selected: {0:?}")]
    SelectionMiss(UnfilledReason),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] anyhow::Error),
}
