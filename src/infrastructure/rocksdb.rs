use crate::domain::account::{Account, AccountKey};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{BalanceLedger, TransactionLog};
use crate::domain::transaction::Transaction;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, TransactionDB,
    TransactionDBOptions,
};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing account balances.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for the append-only transaction log.
pub const CF_TRANSACTIONS: &str = "transactions";

const KEY_SEPARATOR: char = '\u{0}';

/// A persistent store implementation using RocksDB.
///
/// Balances and transactions live in separate Column Families. Balance
/// mutations run inside a pessimistic RocksDB transaction: the row is read
/// with `get_for_update` (taking the row lock), checked, written and
/// committed, so two concurrent reserves on one account are serialized by
/// the database.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let cf_transactions = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());

        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            vec![cf_accounts, cf_transactions],
        )?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| SettlementError::Storage(format!("{} column family not found", name)))
    }

    /// Applies `mutate` to one account row atomically. The write only happens
    /// when `mutate` returns true; returns the number of rows written.
    fn update_account<F>(&self, key: &AccountKey, mutate: F) -> Result<u64>
    where
        F: FnOnce(&mut Account) -> bool,
    {
        let cf = self.cf(CF_ACCOUNTS)?;
        let txn = self.db.transaction();

        let Some(bytes) = txn.get_for_update_cf(cf, key.as_str(), true)? else {
            return Ok(0);
        };
        let mut row: Account = serde_json::from_slice(&bytes)?;
        if !mutate(&mut row) {
            return Ok(0);
        }

        txn.put_cf(cf, key.as_str(), serde_json::to_vec(&row)?)?;
        txn.commit()?;
        Ok(1)
    }

    fn insert_account_if_absent(&self, key: &AccountKey, opening: Balance) -> Result<()> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let txn = self.db.transaction();

        if txn.get_for_update_cf(cf, key.as_str(), true)?.is_none() {
            let row = Account::new(key.clone(), opening);
            txn.put_cf(cf, key.as_str(), serde_json::to_vec(&row)?)?;
            txn.commit()?;
        }
        Ok(())
    }

    fn account_prefix(key: &AccountKey) -> String {
        format!("{}{}", key.as_str(), KEY_SEPARATOR)
    }
}

#[async_trait]
impl BalanceLedger for RocksDBStore {
    async fn open_account(&self, account: &AccountKey, opening: Balance) -> Result<()> {
        self.insert_account_if_absent(account, opening)
    }

    async fn reserve(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        self.update_account(account, |row| row.reserve(amount))
    }

    async fn release(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        self.update_account(account, |row| {
            row.release(amount);
            true
        })
    }

    async fn balance(&self, account: &AccountKey) -> Result<Option<Balance>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, account.as_str())? {
            Some(bytes) => {
                let row: Account = serde_json::from_slice(&bytes)?;
                Ok(Some(row.balance))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TransactionLog for RocksDBStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        // Keys are "<account>\0<ulid>", so one account's records are contiguous
        // and in creation order.
        let key = format!("{}{}", Self::account_prefix(&tx.account), tx.id);
        let value = serde_json::to_vec(&tx)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    async fn list_by_account(&self, account: &AccountKey) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let prefix = Self::account_prefix(account);

        let mut transactions = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            transactions.push(serde_json::from_slice(&value)?);
        }

        transactions.reverse();
        Ok(transactions)
    }
}
