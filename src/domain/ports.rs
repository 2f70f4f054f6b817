use super::gateway::{GatewayError, StatusReport};
use super::ledger::UserAccount;
use super::notification::Notification;
use super::order::{Order, OrderRef, OrderStatus, UserId};
use super::promo::{PromoCode, PromoCodeUsage, PromoId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fails with `DuplicateOrder` if the id is taken.
    async fn insert_order(&self, order: Order) -> Result<()>;
    async fn get_order(&self, order_ref: OrderRef) -> Result<Option<Order>>;
    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn store_account(&self, account: UserAccount) -> Result<()>;
    async fn get_account(&self, user: UserId) -> Result<Option<UserAccount>>;
    async fn all_accounts(&self) -> Result<Vec<UserAccount>>;
}

#[async_trait]
pub trait PromoStore: Send + Sync {
    async fn store_promo(&self, promo: PromoCode) -> Result<()>;
    async fn get_promo(&self, id: PromoId) -> Result<Option<PromoCode>>;
    async fn get_usage(&self, promo: PromoId, user: UserId) -> Result<Option<PromoCodeUsage>>;
}

/// Everything one settlement changes, written as a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementWrite {
    /// The write only applies if the stored order still has this status.
    pub expected_status: OrderStatus,
    pub order: Order,
    pub account: Option<UserAccount>,
    pub promo_usage: Option<PromoCodeUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Someone else moved the order first; nothing was written.
    Conflict(OrderStatus),
}

/// Transactional store behind the settlement engine.
///
/// `commit` must be all-or-nothing across the order, account and promo
/// usage rows, and must honour `expected_status` atomically with the write.
#[async_trait]
pub trait SettlementStore: OrderStore + AccountStore + PromoStore {
    async fn commit(&self, write: SettlementWrite) -> Result<CommitOutcome>;
}

pub type SettlementStoreHandle = Arc<dyn SettlementStore>;

/// Queries a provider for the state of one order. Implementations live
/// outside this crate; they only report and never mutate.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn query_status(&self, order: &Order) -> std::result::Result<StatusReport, GatewayError>;
}

/// Fire-and-forget delivery of user-facing messages.
///
/// Must not block; delivery failures are the sink's to log.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
