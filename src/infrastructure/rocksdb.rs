use crate::domain::ledger::UserAccount;
use crate::domain::order::{Order, OrderId, OrderRef, OrderStatus, UserId};
use crate::domain::ports::{
    AccountStore, CommitOutcome, OrderStore, PromoStore, SettlementStore, SettlementWrite,
};
use crate::domain::promo::{PromoCode, PromoCodeUsage, PromoId};
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for order rows, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family mapping transaction ids to order ids.
pub const CF_ORDER_TX_INDEX: &str = "order_tx_index";
/// Column Family for user ledgers, keyed by user id.
pub const CF_ACCOUNTS: &str = "accounts";
pub const CF_PROMOS: &str = "promos";
/// Column Family for usage counters, keyed by promo id then user id.
pub const CF_PROMO_USAGES: &str = "promo_usages";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_ORDERS,
    CF_ORDER_TX_INDEX,
    CF_ACCOUNTS,
    CF_PROMOS,
    CF_PROMO_USAGES,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family as JSON. A settlement commit
/// is a single `WriteBatch`, and the status check that guards it runs under
/// `commit_lock`, so the check and the write cannot interleave with another
/// commit through this handle.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

fn usage_key(promo: PromoId, user: UserId) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..4].copy_from_slice(&promo.to_be_bytes());
    key[4..].copy_from_slice(&user.to_be_bytes());
    key
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            SettlementError::InternalError(Box::new(std::io::Error::other(format!(
                "Column family '{}' not found",
                name
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(&cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(&cf, key, bytes)?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &id.to_be_bytes())
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        let _commit = self.commit_lock.lock();
        if self.order_by_id(order.id)?.is_some() {
            return Err(SettlementError::DuplicateOrder(order.id));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_ORDERS)?,
            order.id.to_be_bytes(),
            serde_json::to_vec(&order)?,
        );
        batch.put_cf(
            self.cf(CF_ORDER_TX_INDEX)?,
            order.transaction_id.as_bytes(),
            order.id.to_be_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_order(&self, order_ref: OrderRef) -> Result<Option<Order>> {
        match order_ref {
            OrderRef::Id(id) => self.order_by_id(id),
            OrderRef::Transaction(tx) => {
                let cf = self.cf(CF_ORDER_TX_INDEX)?;
                let Some(bytes) = self.db.get_pinned_cf(&cf, tx.as_bytes())? else {
                    return Ok(None);
                };
                let id: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    SettlementError::InternalError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "Corrupt transaction index entry",
                    )))
                })?;
                self.order_by_id(OrderId::from_be_bytes(id))
            }
        }
    }

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let orders: Vec<Order> = self.scan_json(CF_ORDERS)?;
        Ok(orders.into_iter().filter(|o| o.status() == status).collect())
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn store_account(&self, account: UserAccount) -> Result<()> {
        self.put_json(CF_ACCOUNTS, &account.user.to_be_bytes(), &account)
    }

    async fn get_account(&self, user: UserId) -> Result<Option<UserAccount>> {
        self.get_json(CF_ACCOUNTS, &user.to_be_bytes())
    }

    async fn all_accounts(&self) -> Result<Vec<UserAccount>> {
        self.scan_json(CF_ACCOUNTS)
    }
}

#[async_trait]
impl PromoStore for RocksDBStore {
    async fn store_promo(&self, promo: PromoCode) -> Result<()> {
        self.put_json(CF_PROMOS, &promo.id.to_be_bytes(), &promo)
    }

    async fn get_promo(&self, id: PromoId) -> Result<Option<PromoCode>> {
        self.get_json(CF_PROMOS, &id.to_be_bytes())
    }

    async fn get_usage(&self, promo: PromoId, user: UserId) -> Result<Option<PromoCodeUsage>> {
        self.get_json(CF_PROMO_USAGES, &usage_key(promo, user))
    }
}

#[async_trait]
impl SettlementStore for RocksDBStore {
    async fn commit(&self, write: SettlementWrite) -> Result<CommitOutcome> {
        let _commit = self.commit_lock.lock();
        let current = self
            .order_by_id(write.order.id)?
            .ok_or(SettlementError::OrderNotFound(OrderRef::Id(write.order.id)))?
            .status();
        if current != write.expected_status {
            return Ok(CommitOutcome::Conflict(current));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_ORDERS)?,
            write.order.id.to_be_bytes(),
            serde_json::to_vec(&write.order)?,
        );
        if let Some(account) = &write.account {
            batch.put_cf(
                self.cf(CF_ACCOUNTS)?,
                account.user.to_be_bytes(),
                serde_json::to_vec(account)?,
            );
        }
        if let Some(usage) = &write.promo_usage {
            batch.put_cf(
                self.cf(CF_PROMO_USAGES)?,
                usage_key(usage.promo, usage.user),
                serde_json::to_vec(usage)?,
            );
        }
        self.db.write(batch)?;
        Ok(CommitOutcome::Committed)
    }
}
