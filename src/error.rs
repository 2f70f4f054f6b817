use crate::domain::order::{OrderRef, OrderStatus};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderRef),
    #[error("Order {0} already exists")]
    DuplicateOrder(u64),
    #[error("Gateway unavailable after {attempts} attempt(s): {reason}")]
    AdapterUnavailable { attempts: u32, reason: String },
    #[error("Ledger invariant violated: {0}")]
    LedgerInvariantViolation(String),
    #[error("Illegal transition from {from:?}: {event}")]
    IllegalTransition { from: OrderStatus, event: String },
    #[error("Insufficient credit for user {user}: requested {requested}, available {available}")]
    InsufficientCredit {
        user: u64,
        requested: Decimal,
        available: Decimal,
    },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, SettlementError>;
