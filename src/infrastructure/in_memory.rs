use crate::domain::ledger::UserAccount;
use crate::domain::order::{Order, OrderId, OrderRef, OrderStatus, UserId};
use crate::domain::ports::{
    AccountStore, CommitOutcome, OrderStore, PromoStore, SettlementStore, SettlementWrite,
};
use crate::domain::promo::{PromoCode, PromoCodeUsage, PromoId};
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    by_transaction: HashMap<Uuid, OrderId>,
    accounts: HashMap<UserId, UserAccount>,
    promos: HashMap<PromoId, PromoCode>,
    usages: HashMap<(PromoId, UserId), PromoCodeUsage>,
}

impl Tables {
    fn order(&self, order_ref: OrderRef) -> Option<&Order> {
        match order_ref {
            OrderRef::Id(id) => self.orders.get(&id),
            OrderRef::Transaction(tx) => self
                .by_transaction
                .get(&tx)
                .and_then(|id| self.orders.get(id)),
        }
    }
}

/// A thread-safe in-memory store for orders, ledgers and promo usage.
///
/// All tables sit behind a single `RwLock`, so a commit is atomic simply by
/// holding the write guard. Ideal for testing or single-process deployments.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(SettlementError::DuplicateOrder(order.id));
        }
        tables.by_transaction.insert(order.transaction_id, order.id);
        tables.orders.insert(order.id, order);
        Ok(())
    }

    async fn get_order(&self, order_ref: OrderRef) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.order(order_ref).cloned())
    }

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.status() == status)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn store_account(&self, account: UserAccount) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.accounts.insert(account.user, account);
        Ok(())
    }

    async fn get_account(&self, user: UserId) -> Result<Option<UserAccount>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&user).cloned())
    }

    async fn all_accounts(&self) -> Result<Vec<UserAccount>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<UserAccount> = tables.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.user);
        Ok(accounts)
    }
}

#[async_trait]
impl PromoStore for InMemoryStore {
    async fn store_promo(&self, promo: PromoCode) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.promos.insert(promo.id, promo);
        Ok(())
    }

    async fn get_promo(&self, id: PromoId) -> Result<Option<PromoCode>> {
        let tables = self.tables.read().await;
        Ok(tables.promos.get(&id).cloned())
    }

    async fn get_usage(&self, promo: PromoId, user: UserId) -> Result<Option<PromoCodeUsage>> {
        let tables = self.tables.read().await;
        Ok(tables.usages.get(&(promo, user)).cloned())
    }
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn commit(&self, write: SettlementWrite) -> Result<CommitOutcome> {
        let mut tables = self.tables.write().await;
        let current = tables
            .orders
            .get(&write.order.id)
            .map(|o| o.status())
            .ok_or(SettlementError::OrderNotFound(OrderRef::Id(write.order.id)))?;
        if current != write.expected_status {
            return Ok(CommitOutcome::Conflict(current));
        }

        if let Some(account) = write.account {
            tables.accounts.insert(account.user, account);
        }
        if let Some(usage) = write.promo_usage {
            tables.usages.insert((usage.promo, usage.user), usage);
        }
        tables.orders.insert(write.order.id, write.order);
        Ok(CommitOutcome::Committed)
    }
}
