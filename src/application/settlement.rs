use crate::application::locks::KeyedLocks;
use crate::domain::ledger::{Lang, UserAccount};
use crate::domain::money::{Credit, Money};
use crate::domain::notification::{
    Notification, NotificationKind, NotificationPayload, format_credit,
};
use crate::domain::order::{
    Gateway, Order, OrderEvent, OrderId, OrderRef, OrderStatus, Outcome, Transition, UserId,
};
use crate::domain::ports::{
    AccountStore, CommitOutcome, NotificationSink, OrderStore, PromoStore,
    SettlementStoreHandle, SettlementWrite,
};
use crate::domain::pricing::PricingTable;
use crate::domain::promo::{PromoCode, PromoCodeUsage, PromoId};
use crate::error::{Result, SettlementError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A request for a new pay link.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub id: OrderId,
    pub user: UserId,
    pub amount: Money,
    pub gateway: Gateway,
    pub promo: Option<PromoId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementResult {
    Settled(Outcome),
    /// The order was already terminal; nothing was changed.
    AlreadySettled(OrderStatus),
    OrderNotFound,
}

impl SettlementResult {
    /// `AlreadySettled` counts as success for callers racing each other.
    pub fn is_success(&self) -> bool {
        !matches!(self, SettlementResult::OrderNotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeResult {
    Acknowledged,
    AlreadyPending,
    AlreadySettled(OrderStatus),
    OrderNotFound,
}

/// Applies payment outcomes to orders, user ledgers and promo usage.
///
/// Every mutation of an order happens under that order's lock, and every
/// mutation of a ledger under that user's lock (always taken second). The
/// store's status guard on commit covers writers outside this process.
pub struct SettlementEngine {
    store: SettlementStoreHandle,
    pricing: PricingTable,
    notifier: Arc<dyn NotificationSink>,
    order_locks: KeyedLocks<OrderId>,
    user_locks: KeyedLocks<UserId>,
}

impl SettlementEngine {
    /// Creates a new `SettlementEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional storage for orders, ledgers and promo usage.
    /// * `pricing` - The table every credit grant is computed from.
    /// * `notifier` - Receives confirmations and cancellations after commit.
    pub fn new(
        store: SettlementStoreHandle,
        pricing: PricingTable,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            pricing,
            notifier,
            order_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &SettlementStoreHandle {
        &self.store
    }

    pub async fn register_promo(&self, promo: PromoCode) -> Result<()> {
        self.store.store_promo(promo).await
    }

    /// Creates the user's ledger if needed and records their language.
    pub async fn register_user(&self, user: UserId, lang: Lang) -> Result<UserAccount> {
        let _user_guard = self.user_locks.lock(user).await;
        let mut account = self
            .store
            .get_account(user)
            .await?
            .unwrap_or_else(|| UserAccount::new(user));
        account.lang = lang;
        self.store.store_account(account.clone()).await?;
        Ok(account)
    }

    /// Records a new order in `Created` state.
    #[instrument(skip(self, request), fields(order = request.id, user = request.user))]
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order> {
        let discount = match request.promo {
            Some(promo_id) => {
                let promo = self.store.get_promo(promo_id).await?.ok_or_else(|| {
                    SettlementError::ValidationError(format!("Unknown promo code {}", promo_id))
                })?;
                let usage = self.store.get_usage(promo_id, request.user).await?;
                promo.check_eligible(request.amount.value(), usage.as_ref())?;
                Some(promo.discount_amount)
            }
            None => None,
        };

        let order = Order::new(
            request.id,
            request.user,
            request.amount,
            request.gateway,
            request.promo,
            discount,
            Utc::now(),
        );
        self.store.insert_order(order.clone()).await?;

        {
            let _user_guard = self.user_locks.lock(request.user).await;
            if self.store.get_account(request.user).await?.is_none() {
                self.store
                    .store_account(UserAccount::new(request.user))
                    .await?;
            }
        }

        info!(
            transaction_id = %order.transaction_id,
            amount = %order.amount,
            gateway = ?order.gateway,
            "Order created"
        );
        Ok(order)
    }

    /// Status of an order, visible only to the user who owns it.
    pub async fn order_status(&self, order_ref: OrderRef, user: UserId) -> Result<OrderStatus> {
        match self.store.get_order(order_ref).await? {
            Some(order) if order.user == user => Ok(order.status()),
            _ => Err(SettlementError::OrderNotFound(order_ref)),
        }
    }

    /// The gateway accepted the transaction: `Created` becomes `Pending`.
    #[instrument(skip(self), fields(order = %order_ref))]
    pub async fn acknowledge(&self, order_ref: OrderRef) -> Result<AcknowledgeResult> {
        let Some(order) = self.store.get_order(order_ref).await? else {
            warn!("Acknowledgment for unknown order");
            return Ok(AcknowledgeResult::OrderNotFound);
        };
        let _order_guard = self.order_locks.lock(order.id).await;

        let Some(mut order) = self.store.get_order(OrderRef::Id(order.id)).await? else {
            return Ok(AcknowledgeResult::OrderNotFound);
        };
        let expected_status = order.status();
        match order.apply(OrderEvent::Acknowledge, Utc::now())? {
            Transition::Advanced { .. } => {}
            Transition::Unchanged(_) => return Ok(AcknowledgeResult::AlreadyPending),
            Transition::AlreadyTerminal(status) => {
                return Ok(AcknowledgeResult::AlreadySettled(status));
            }
        }

        let write = SettlementWrite {
            expected_status,
            order,
            account: None,
            promo_usage: None,
        };
        match self.store.commit(write).await? {
            CommitOutcome::Committed => {
                info!("Order pending at gateway");
                Ok(AcknowledgeResult::Acknowledged)
            }
            CommitOutcome::Conflict(status) if status.is_terminal() => {
                Ok(AcknowledgeResult::AlreadySettled(status))
            }
            CommitOutcome::Conflict(_) => Ok(AcknowledgeResult::AlreadyPending),
        }
    }

    /// Drives an order to its terminal state exactly once.
    ///
    /// Repeated or concurrent calls for the same order observe
    /// `AlreadySettled` and change nothing. Any error leaves the order, the
    /// ledger and promo usage exactly as they were.
    #[instrument(skip(self), fields(order = %order_ref))]
    pub async fn settle(&self, order_ref: OrderRef, outcome: Outcome) -> Result<SettlementResult> {
        let Some(order) = self.store.get_order(order_ref).await? else {
            warn!("Settlement for unknown order");
            return Ok(SettlementResult::OrderNotFound);
        };
        let order_guard = self.order_locks.lock(order.id).await;

        // Re-read under the lock; whoever got here first decided the order.
        let Some(mut order) = self.store.get_order(OrderRef::Id(order.id)).await? else {
            return Ok(SettlementResult::OrderNotFound);
        };
        if order.status().is_terminal() {
            debug!(status = ?order.status(), "Order already settled");
            return Ok(SettlementResult::AlreadySettled(order.status()));
        }

        let expected_status = order.status();
        let now = Utc::now();
        match order.apply(OrderEvent::Resolve(outcome), now)? {
            Transition::Advanced { .. } => {}
            Transition::Unchanged(status) | Transition::AlreadyTerminal(status) => {
                return Ok(SettlementResult::AlreadySettled(status));
            }
        }

        let user_guard = self.user_locks.lock(order.user).await;
        let mut account = self
            .store
            .get_account(order.user)
            .await?
            .unwrap_or_else(|| UserAccount::new(order.user));

        let (grant, account_write, promo_usage) = match outcome {
            Outcome::Paid => {
                let grant = self.pricing.credit_for(order.amount);
                account.grant(grant, order.amount)?;
                let promo_usage = match order.promo {
                    Some(promo_id) => self.next_promo_usage(promo_id, order.user).await?,
                    None => None,
                };
                (grant, Some(account.clone()), promo_usage)
            }
            Outcome::Cancelled => (Credit::ZERO, None, None),
        };

        let write = SettlementWrite {
            expected_status,
            order: order.clone(),
            account: account_write,
            promo_usage,
        };
        if let CommitOutcome::Conflict(status) = self.store.commit(write).await? {
            warn!(status = ?status, "Order settled concurrently elsewhere");
            return Ok(SettlementResult::AlreadySettled(status));
        }
        drop(user_guard);
        drop(order_guard);

        info!(outcome = ?outcome, credit = %grant, "Order settled");
        self.notifier
            .notify(self.notification(&order, &account, outcome, grant));
        Ok(SettlementResult::Settled(outcome))
    }

    /// Spends credit from a user's balance.
    #[instrument(skip(self))]
    pub async fn consume_credit(&self, user: UserId, seconds: Credit) -> Result<UserAccount> {
        let _user_guard = self.user_locks.lock(user).await;
        let mut account = self
            .store
            .get_account(user)
            .await?
            .unwrap_or_else(|| UserAccount::new(user));
        account.consume(seconds)?;
        self.store.store_account(account.clone()).await?;
        debug!(balance = %account.credit_balance, "Credit consumed");
        Ok(account)
    }

    /// Usage row to write for a paid order, or `None` when the promo is gone
    /// or exhausted. Exhaustion never blocks the payment itself.
    async fn next_promo_usage(
        &self,
        promo_id: PromoId,
        user: UserId,
    ) -> Result<Option<PromoCodeUsage>> {
        let Some(promo) = self.store.get_promo(promo_id).await? else {
            warn!(promo = promo_id, "Promo code referenced by order no longer exists");
            return Ok(None);
        };
        let mut usage = self
            .store
            .get_usage(promo_id, user)
            .await?
            .unwrap_or_else(|| PromoCodeUsage::new(promo_id, user));

        if usage.increment(promo.usage_limit)? {
            Ok(Some(usage))
        } else {
            info!(
                promo = promo_id,
                limit = promo.usage_limit,
                "Promo usage limit reached; usage not counted"
            );
            Ok(None)
        }
    }

    fn notification(
        &self,
        order: &Order,
        account: &UserAccount,
        outcome: Outcome,
        grant: Credit,
    ) -> Notification {
        let kind = match outcome {
            Outcome::Paid => NotificationKind::Confirmed,
            Outcome::Cancelled => NotificationKind::Cancelled,
        };
        Notification {
            user: order.user,
            kind,
            payload: NotificationPayload {
                order: order.id,
                amount: order.amount.value(),
                credit_grant: grant,
                credit_grant_text: format_credit(grant, account.lang),
                balance_text: format_credit(account.credit_balance, account.lang),
                settled_at: order.settled_at().unwrap_or_else(Utc::now),
            },
        }
    }
}
