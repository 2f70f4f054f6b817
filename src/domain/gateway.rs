use crate::domain::order::{OrderRef, Outcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Success,
    Pending,
    Failed,
}

/// A provider's answer to a status query, already stripped of its wire format.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct StatusReport {
    pub code: i64,
    pub state: PaymentState,
}

/// What a status report means for the order.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Classification {
    Terminal(Outcome),
    Unresolved,
}

impl StatusReport {
    pub fn new(code: i64, state: PaymentState) -> Self {
        Self { code, state }
    }

    /// A negative code cancels regardless of the reported state.
    pub fn classify(&self) -> Classification {
        if self.code < 0 {
            return Classification::Terminal(Outcome::Cancelled);
        }
        match self.state {
            PaymentState::Success => Classification::Terminal(Outcome::Paid),
            PaymentState::Failed => Classification::Terminal(Outcome::Cancelled),
            PaymentState::Pending => Classification::Unresolved,
        }
    }
}

/// Failure to obtain a report at all. Never a payment decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("provider unreachable: {0}")]
    Unavailable(String),
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
    /// The provider refused the query itself (credentials, unknown merchant).
    #[error("provider rejected the status query: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Timeout(_))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum WebhookKind {
    /// Provider opened the transaction on its side.
    Started,
    Resolved(Outcome),
    /// Provider asks for the current state without changing it.
    Check,
}

/// An inbound push notification normalized to the core's vocabulary.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct WebhookEvent {
    pub order_ref: OrderRef,
    pub kind: WebhookKind,
    pub raw_code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            StatusReport::new(0, PaymentState::Success).classify(),
            Classification::Terminal(Outcome::Paid)
        );
        assert_eq!(
            StatusReport::new(0, PaymentState::Failed).classify(),
            Classification::Terminal(Outcome::Cancelled)
        );
        assert_eq!(
            StatusReport::new(0, PaymentState::Pending).classify(),
            Classification::Unresolved
        );
    }

    #[test]
    fn test_negative_code_cancels_even_on_success() {
        assert_eq!(
            StatusReport::new(-5017, PaymentState::Success).classify(),
            Classification::Terminal(Outcome::Cancelled)
        );
        assert_eq!(
            StatusReport::new(-1, PaymentState::Pending).classify(),
            Classification::Terminal(Outcome::Cancelled)
        );
    }

    #[test]
    fn test_only_transport_failures_are_retryable() {
        assert!(GatewayError::Unavailable("reset".to_string()).is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(15)).is_retryable());
        assert!(!GatewayError::Rejected("bad key".to_string()).is_retryable());
    }
}
