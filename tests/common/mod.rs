#![allow(dead_code)]

use async_trait::async_trait;
use payledger::application::settlement::{OrderRequest, SettlementEngine};
use payledger::config::RetryPolicy;
use payledger::domain::gateway::{GatewayError, PaymentState, StatusReport};
use payledger::domain::ledger::UserAccount;
use payledger::domain::money::Money;
use payledger::domain::notification::Notification;
use payledger::domain::order::{Gateway, Order, OrderId, OrderRef, OrderStatus, UserId};
use payledger::domain::ports::{
    AccountStore, CommitOutcome, OrderStore, PaymentGateway, PromoStore, SettlementStore,
    SettlementWrite,
};
use payledger::domain::pricing::PricingTable;
use payledger::domain::promo::{PromoCode, PromoCodeUsage, PromoId};
use payledger::error::{Result, SettlementError};
use payledger::infrastructure::in_memory::InMemoryStore;
use payledger::infrastructure::notifier::ChannelNotifier;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub type Reply = std::result::Result<StatusReport, GatewayError>;

/// One scripted gateway answer, optionally after a delay.
pub struct Step {
    pub delay: Duration,
    pub reply: Reply,
}

pub fn success() -> Step {
    Step {
        delay: Duration::ZERO,
        reply: Ok(StatusReport::new(0, PaymentState::Success)),
    }
}

pub fn pending() -> Step {
    Step {
        delay: Duration::ZERO,
        reply: Ok(StatusReport::new(0, PaymentState::Pending)),
    }
}

pub fn unavailable() -> Step {
    Step {
        delay: Duration::ZERO,
        reply: Err(GatewayError::Unavailable("connection refused".to_string())),
    }
}

pub fn slow(delay: Duration) -> Step {
    Step {
        delay,
        reply: Ok(StatusReport::new(0, PaymentState::Success)),
    }
}

/// Replays a fixed list of answers; once exhausted it keeps reporting pending.
#[derive(Default)]
pub struct ScriptedGateway {
    steps: parking_lot::Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: parking_lot::Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn query_status(&self, _order: &Order) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().pop_front().unwrap_or_else(pending);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.reply
    }
}

/// Wraps a store and makes `commit` fail while `fail_commits` is set.
pub struct FaultyStore {
    inner: InMemoryStore,
    pub fail_commits: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl OrderStore for FaultyStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        self.inner.insert_order(order).await
    }

    async fn get_order(&self, order_ref: OrderRef) -> Result<Option<Order>> {
        self.inner.get_order(order_ref).await
    }

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.inner.orders_with_status(status).await
    }
}

#[async_trait]
impl AccountStore for FaultyStore {
    async fn store_account(&self, account: UserAccount) -> Result<()> {
        self.inner.store_account(account).await
    }

    async fn get_account(&self, user: UserId) -> Result<Option<UserAccount>> {
        self.inner.get_account(user).await
    }

    async fn all_accounts(&self) -> Result<Vec<UserAccount>> {
        self.inner.all_accounts().await
    }
}

#[async_trait]
impl PromoStore for FaultyStore {
    async fn store_promo(&self, promo: PromoCode) -> Result<()> {
        self.inner.store_promo(promo).await
    }

    async fn get_promo(&self, id: PromoId) -> Result<Option<PromoCode>> {
        self.inner.get_promo(id).await
    }

    async fn get_usage(&self, promo: PromoId, user: UserId) -> Result<Option<PromoCodeUsage>> {
        self.inner.get_usage(promo, user).await
    }
}

#[async_trait]
impl SettlementStore for FaultyStore {
    async fn commit(&self, write: SettlementWrite) -> Result<CommitOutcome> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(SettlementError::InternalError(Box::new(std::io::Error::other(
                "disk full",
            ))));
        }
        self.inner.commit(write).await
    }
}

pub fn engine() -> (
    Arc<SettlementEngine>,
    InMemoryStore,
    UnboundedReceiver<Notification>,
) {
    let store = InMemoryStore::new();
    let (notifier, rx) = ChannelNotifier::new();
    let engine = SettlementEngine::new(
        Arc::new(store.clone()),
        PricingTable::default(),
        Arc::new(notifier),
    );
    (Arc::new(engine), store, rx)
}

/// Millisecond-scale policy so retries finish quickly in tests.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        initial_delay_ms: 5,
        max_retries: 3,
        backoff_base_ms: 2,
        backoff_max_ms: 10,
        attempt_timeout_ms: 200,
    }
}

pub fn request(id: OrderId, user: UserId, amount: Decimal, gateway: Gateway) -> OrderRequest {
    OrderRequest {
        id,
        user,
        amount: Money::new(amount).unwrap(),
        gateway,
        promo: None,
    }
}

pub fn promo(id: PromoId, discount: Decimal, usage_limit: u32) -> PromoCode {
    PromoCode {
        id,
        name: format!("PROMO{}", id),
        min_price: Decimal::ZERO,
        discount_amount: discount,
        usage_limit,
        is_active: true,
    }
}

pub fn generate_csv(path: &Path, orders: usize) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record(["type", "order", "user", "amount", "gateway"])?;

    for i in 1..=orders {
        let id = i.to_string();
        wtr.write_record(["create", id.as_str(), "1", "36000", "push"])?;
        wtr.write_record(["ack", id.as_str()])?;
        wtr.write_record(["paid", id.as_str()])?;
    }

    wtr.flush()?;
    Ok(())
}
