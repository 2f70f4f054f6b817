use crate::domain::money::Money;
use crate::domain::promo::PromoId;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type OrderId = u64;
pub type UserId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    /// Provider calls back into the system (merchant RPC).
    Push,
    /// Provider has to be queried for the result.
    Poll,
    Direct,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Pure transition function of the order lifecycle.
    ///
    /// Terminal states absorb every event without error so that a late
    /// duplicate delivery can be answered as a success.
    pub fn next(self, event: OrderEvent) -> Result<Transition> {
        use OrderStatus::*;

        if self.is_terminal() {
            return Ok(Transition::AlreadyTerminal(self));
        }
        match (self, event) {
            (Created, OrderEvent::Acknowledge) => Ok(Transition::Advanced {
                from: Created,
                to: Pending,
            }),
            (Pending, OrderEvent::Acknowledge) => Ok(Transition::Unchanged(Pending)),
            (Pending, OrderEvent::Resolve(outcome)) => Ok(Transition::Advanced {
                from: Pending,
                to: outcome.into(),
            }),
            (from, event) => Err(SettlementError::IllegalTransition {
                from,
                event: event.to_string(),
            }),
        }
    }
}

/// Terminal decision reported by a gateway.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Paid,
    Cancelled,
}

impl From<Outcome> for OrderStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Paid => OrderStatus::Paid,
            Outcome::Cancelled => OrderStatus::Cancelled,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OrderEvent {
    /// The gateway accepted the transaction and started collecting.
    Acknowledge,
    Resolve(Outcome),
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEvent::Acknowledge => write!(f, "acknowledge"),
            OrderEvent::Resolve(Outcome::Paid) => write!(f, "resolve as paid"),
            OrderEvent::Resolve(Outcome::Cancelled) => write!(f, "resolve as cancelled"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transition {
    Advanced { from: OrderStatus, to: OrderStatus },
    Unchanged(OrderStatus),
    AlreadyTerminal(OrderStatus),
}

/// How callers address an order: by primary key or by the correlation id
/// handed to the gateway.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderRef {
    Id(OrderId),
    Transaction(Uuid),
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRef::Id(id) => write!(f, "#{}", id),
            OrderRef::Transaction(tx) => write!(f, "transaction {}", tx),
        }
    }
}

/// One payment attempt for a user.
///
/// `status` and `settled_at` are only changed through [`Order::apply`], which
/// keeps `settled_at` set exactly when the status is terminal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub amount: Money,
    pub discount: Option<Decimal>,
    pub gateway: Gateway,
    pub promo: Option<PromoId>,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
    status: OrderStatus,
    settled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        id: OrderId,
        user: UserId,
        amount: Money,
        gateway: Gateway,
        promo: Option<PromoId>,
        discount: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user,
            amount,
            discount,
            gateway,
            promo,
            transaction_id: Uuid::new_v4(),
            created_at: now,
            status: OrderStatus::Created,
            settled_at: None,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    /// What the gateway is asked to collect after the promo discount.
    pub fn charge_amount(&self) -> Decimal {
        let discount = self.discount.unwrap_or(Decimal::ZERO);
        (self.amount.value() - discount).max(Decimal::ZERO)
    }

    pub fn apply(&mut self, event: OrderEvent, now: DateTime<Utc>) -> Result<Transition> {
        let transition = self.status.next(event)?;
        if let Transition::Advanced { to, .. } = transition {
            self.status = to;
            if to.is_terminal() {
                self.settled_at = Some(now);
            }
        }
        Ok(transition)
    }
}
