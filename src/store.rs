// src/store.rs
use crate::error::Error;
use crate::models::{AssetSnapshot, Holding, Transaction, User, UserId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Persistence capability used by the ledger and the API layer.
///
/// Ordering contracts: `list_holdings` returns tickers ascending,
/// `list_transactions` newest first, `list_snapshots` dates ascending.
/// `insert_user` fails with `UserExists` when the id is already taken.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<(), Error>;
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, Error>;
    async fn update_balance(&self, id: &UserId, balance: f64) -> Result<(), Error>;
    async fn update_watchlist(&self, id: &UserId, watchlist: &[String]) -> Result<(), Error>;

    async fn get_holding(&self, id: &UserId, ticker: &str) -> Result<Option<Holding>, Error>;
    async fn list_holdings(&self, id: &UserId) -> Result<Vec<Holding>, Error>;
    async fn upsert_holding(&self, holding: Holding) -> Result<(), Error>;
    async fn remove_holding(&self, id: &UserId, ticker: &str) -> Result<(), Error>;

    async fn insert_transaction(&self, tx: Transaction) -> Result<(), Error>;
    async fn list_transactions(&self, id: &UserId) -> Result<Vec<Transaction>, Error>;

    async fn upsert_snapshot(&self, snapshot: AssetSnapshot) -> Result<(), Error>;
    async fn list_snapshots(&self, id: &UserId) -> Result<Vec<AssetSnapshot>, Error>;
}

#[derive(Default)]
struct MemInner {
    users: HashMap<String, User>,
    holdings: BTreeMap<(String, String), Holding>,
    transactions: Vec<Transaction>,
    snapshots: BTreeMap<(String, String), AssetSnapshot>,
}

/// Plain in-memory store. Backs the `memory` backend and every test.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemInner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, MemInner> {
        self.inner.lock().expect("memory store poisoned")
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<(), Error> {
        let mut inner = self.locked();
        if inner.users.contains_key(&user.id.0) {
            return Err(Error::UserExists);
        }
        inner.users.insert(user.id.0.clone(), user);
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.locked().users.get(&id.0).cloned())
    }

    async fn update_balance(&self, id: &UserId, balance: f64) -> Result<(), Error> {
        let mut inner = self.locked();
        let user = inner.users.get_mut(&id.0).ok_or(Error::UserNotFound)?;
        user.balance = balance;
        Ok(())
    }

    async fn update_watchlist(&self, id: &UserId, watchlist: &[String]) -> Result<(), Error> {
        let mut inner = self.locked();
        let user = inner.users.get_mut(&id.0).ok_or(Error::UserNotFound)?;
        user.watchlist = watchlist.to_vec();
        Ok(())
    }

    async fn get_holding(&self, id: &UserId, ticker: &str) -> Result<Option<Holding>, Error> {
        Ok(self
            .locked()
            .holdings
            .get(&(id.0.clone(), ticker.to_string()))
            .cloned())
    }

    async fn list_holdings(&self, id: &UserId) -> Result<Vec<Holding>, Error> {
        // BTreeMap keys are (user, ticker), so the range is already ticker-ascending.
        Ok(self
            .locked()
            .holdings
            .values()
            .filter(|h| h.user == *id)
            .cloned()
            .collect())
    }

    async fn upsert_holding(&self, holding: Holding) -> Result<(), Error> {
        self.locked()
            .holdings
            .insert((holding.user.0.clone(), holding.ticker.clone()), holding);
        Ok(())
    }

    async fn remove_holding(&self, id: &UserId, ticker: &str) -> Result<(), Error> {
        self.locked()
            .holdings
            .remove(&(id.0.clone(), ticker.to_string()));
        Ok(())
    }

    async fn insert_transaction(&self, tx: Transaction) -> Result<(), Error> {
        self.locked().transactions.push(tx);
        Ok(())
    }

    async fn list_transactions(&self, id: &UserId) -> Result<Vec<Transaction>, Error> {
        Ok(self
            .locked()
            .transactions
            .iter()
            .rev() // newest first
            .filter(|t| t.user == *id)
            .cloned()
            .collect())
    }

    async fn upsert_snapshot(&self, snapshot: AssetSnapshot) -> Result<(), Error> {
        self.locked()
            .snapshots
            .insert((snapshot.user.0.clone(), snapshot.date.clone()), snapshot);
        Ok(())
    }

    async fn list_snapshots(&self, id: &UserId) -> Result<Vec<AssetSnapshot>, Error> {
        Ok(self
            .locked()
            .snapshots
            .values()
            .filter(|s| s.user == *id)
            .cloned()
            .collect())
    }
}

/// Read-through user cache over any `Store`, with invalidate-on-write: every
/// user mutation evicts the cached row, so a read after a write always sees the
/// written state instead of going stale indefinitely.
///
/// Each slot carries a generation counter. A backing read only populates the
/// cache if no invalidation landed while it was in flight, so a slow read that
/// resumes after a write cannot reinstate the pre-write row.
pub struct CachedStore {
    inner: Arc<dyn Store>,
    users: Mutex<HashMap<String, Slot>>,
}

#[derive(Default)]
struct Slot {
    gen: u64,
    user: Option<User>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn Store>) -> CachedStore {
        CachedStore {
            inner,
            users: Mutex::new(HashMap::new()),
        }
    }

    fn invalidate(&self, id: &UserId) {
        let mut users = self.users.lock().expect("user cache poisoned");
        let slot = users.entry(id.0.clone()).or_default();
        slot.gen += 1;
        slot.user = None;
    }
}

#[async_trait]
impl Store for CachedStore {
    async fn insert_user(&self, user: User) -> Result<(), Error> {
        let id = user.id.clone();
        let result = self.inner.insert_user(user).await;
        self.invalidate(&id);
        result
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, Error> {
        let observed_gen = {
            let mut users = self.users.lock().expect("user cache poisoned");
            let slot = users.entry(id.0.clone()).or_default();
            if let Some(user) = &slot.user {
                return Ok(Some(user.clone()));
            }
            slot.gen
        };
        let user = self.inner.get_user(id).await?;
        if let Some(ref user) = user {
            let mut users = self.users.lock().expect("user cache poisoned");
            if let Some(slot) = users.get_mut(&id.0) {
                if slot.gen == observed_gen {
                    slot.user = Some(user.clone());
                }
            }
        }
        Ok(user)
    }

    async fn update_balance(&self, id: &UserId, balance: f64) -> Result<(), Error> {
        let result = self.inner.update_balance(id, balance).await;
        self.invalidate(id);
        result
    }

    async fn update_watchlist(&self, id: &UserId, watchlist: &[String]) -> Result<(), Error> {
        let result = self.inner.update_watchlist(id, watchlist).await;
        self.invalidate(id);
        result
    }

    async fn get_holding(&self, id: &UserId, ticker: &str) -> Result<Option<Holding>, Error> {
        self.inner.get_holding(id, ticker).await
    }

    async fn list_holdings(&self, id: &UserId) -> Result<Vec<Holding>, Error> {
        self.inner.list_holdings(id).await
    }

    async fn upsert_holding(&self, holding: Holding) -> Result<(), Error> {
        self.inner.upsert_holding(holding).await
    }

    async fn remove_holding(&self, id: &UserId, ticker: &str) -> Result<(), Error> {
        self.inner.remove_holding(id, ticker).await
    }

    async fn insert_transaction(&self, tx: Transaction) -> Result<(), Error> {
        self.inner.insert_transaction(tx).await
    }

    async fn list_transactions(&self, id: &UserId) -> Result<Vec<Transaction>, Error> {
        self.inner.list_transactions(id).await
    }

    async fn upsert_snapshot(&self, snapshot: AssetSnapshot) -> Result<(), Error> {
        self.inner.upsert_snapshot(snapshot).await
    }

    async fn list_snapshots(&self, id: &UserId) -> Result<Vec<AssetSnapshot>, Error> {
        self.inner.list_snapshots(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user(id: &str, balance: f64) -> User {
        User {
            id: UserId(id.to_string()),
            password_hash: "salt$digest".to_string(),
            balance,
            watchlist: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn holdings_list_is_ticker_ascending() {
        let store = MemoryStore::new();
        let id = UserId("a@x".to_string());
        for ticker in ["MSFT", "AAPL", "GOOGL"] {
            store
                .upsert_holding(Holding {
                    user: id.clone(),
                    ticker: ticker.to_string(),
                    quantity: 1,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let tickers: Vec<String> = store
            .list_holdings(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.ticker)
            .collect();
        assert_eq!(tickers, vec!["AAPL", "GOOGL", "MSFT"]);
    }

    #[tokio::test]
    async fn inserting_an_existing_user_fails_and_preserves_the_row() {
        let store = MemoryStore::new();
        let id = UserId("a@x".to_string());
        store.insert_user(user("a@x", 250.0)).await.unwrap();

        let second = store.insert_user(user("a@x", 1.0)).await;
        assert_eq!(second, Err(Error::UserExists));
        assert_eq!(store.get_user(&id).await.unwrap().unwrap().balance, 250.0);
    }

    #[tokio::test]
    async fn transactions_with_identical_timestamps_both_persist() {
        let store = MemoryStore::new();
        let id = UserId("a@x".to_string());
        let stamp = Utc::now();
        for ticker in ["AAPL", "MSFT"] {
            store
                .insert_transaction(Transaction {
                    user: id.clone(),
                    ticker: ticker.to_string(),
                    side: crate::models::Side::Buy,
                    quantity: 1,
                    price: 10.0,
                    created_at: stamp,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.list_transactions(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transactions_list_newest_first() {
        let store = MemoryStore::new();
        let id = UserId("a@x".to_string());
        for (i, ticker) in ["AAPL", "MSFT"].iter().enumerate() {
            store
                .insert_transaction(Transaction {
                    user: id.clone(),
                    ticker: ticker.to_string(),
                    side: crate::models::Side::Buy,
                    quantity: i as i64 + 1,
                    price: 10.0,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let txs = store.list_transactions(&id).await.unwrap();
        assert_eq!(txs[0].ticker, "MSFT");
        assert_eq!(txs[1].ticker, "AAPL");
    }

    #[tokio::test]
    async fn snapshot_upsert_keeps_one_row_per_day() {
        let store = MemoryStore::new();
        let id = UserId("a@x".to_string());
        for value in [100.0, 250.0] {
            store
                .upsert_snapshot(AssetSnapshot {
                    user: id.clone(),
                    date: "2026-08-27".to_string(),
                    total_value: value,
                })
                .await
                .unwrap();
        }
        let snaps = store.list_snapshots(&id).await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].total_value, 250.0);
    }

    /// Counts `get_user` hits on the backing store so the read-through
    /// behavior of `CachedStore` is observable.
    struct CountingStore {
        inner: MemoryStore,
        user_reads: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn insert_user(&self, user: User) -> Result<(), Error> {
            self.inner.insert_user(user).await
        }
        async fn get_user(&self, id: &UserId) -> Result<Option<User>, Error> {
            self.user_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_user(id).await
        }
        async fn update_balance(&self, id: &UserId, balance: f64) -> Result<(), Error> {
            self.inner.update_balance(id, balance).await
        }
        async fn update_watchlist(&self, id: &UserId, watchlist: &[String]) -> Result<(), Error> {
            self.inner.update_watchlist(id, watchlist).await
        }
        async fn get_holding(&self, id: &UserId, ticker: &str) -> Result<Option<Holding>, Error> {
            self.inner.get_holding(id, ticker).await
        }
        async fn list_holdings(&self, id: &UserId) -> Result<Vec<Holding>, Error> {
            self.inner.list_holdings(id).await
        }
        async fn upsert_holding(&self, holding: Holding) -> Result<(), Error> {
            self.inner.upsert_holding(holding).await
        }
        async fn remove_holding(&self, id: &UserId, ticker: &str) -> Result<(), Error> {
            self.inner.remove_holding(id, ticker).await
        }
        async fn insert_transaction(&self, tx: Transaction) -> Result<(), Error> {
            self.inner.insert_transaction(tx).await
        }
        async fn list_transactions(&self, id: &UserId) -> Result<Vec<Transaction>, Error> {
            self.inner.list_transactions(id).await
        }
        async fn upsert_snapshot(&self, snapshot: AssetSnapshot) -> Result<(), Error> {
            self.inner.upsert_snapshot(snapshot).await
        }
        async fn list_snapshots(&self, id: &UserId) -> Result<Vec<AssetSnapshot>, Error> {
            self.inner.list_snapshots(id).await
        }
    }

    #[tokio::test]
    async fn cached_store_serves_repeat_reads_from_cache() {
        let counting = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            user_reads: AtomicUsize::new(0),
        });
        let cached = CachedStore::new(counting.clone());
        let id = UserId("a@x".to_string());
        cached.insert_user(user("a@x", 100.0)).await.unwrap();

        cached.get_user(&id).await.unwrap();
        cached.get_user(&id).await.unwrap();
        assert_eq!(counting.user_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_store_invalidates_on_write() {
        let store = CachedStore::new(Arc::new(MemoryStore::new()));
        let id = UserId("a@x".to_string());
        store.insert_user(user("a@x", 100.0)).await.unwrap();

        // Prime the cache, then mutate through the wrapper.
        assert_eq!(store.get_user(&id).await.unwrap().unwrap().balance, 100.0);
        store.update_balance(&id, 42.5).await.unwrap();
        assert_eq!(store.get_user(&id).await.unwrap().unwrap().balance, 42.5);

        store
            .update_watchlist(&id, &["AAPL".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.get_user(&id).await.unwrap().unwrap().watchlist,
            vec!["AAPL"]
        );
    }

    /// Backing store whose next `get_user` parks until released, so a write
    /// can be interleaved with an in-flight read-through.
    struct GatedStore {
        inner: MemoryStore,
        armed: std::sync::atomic::AtomicBool,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl GatedStore {
        fn new() -> GatedStore {
            GatedStore {
                inner: MemoryStore::new(),
                armed: std::sync::atomic::AtomicBool::new(false),
                entered: tokio::sync::Notify::new(),
                release: tokio::sync::Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Store for GatedStore {
        async fn insert_user(&self, user: User) -> Result<(), Error> {
            self.inner.insert_user(user).await
        }
        async fn get_user(&self, id: &UserId) -> Result<Option<User>, Error> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.get_user(id).await
        }
        async fn update_balance(&self, id: &UserId, balance: f64) -> Result<(), Error> {
            self.inner.update_balance(id, balance).await
        }
        async fn update_watchlist(&self, id: &UserId, watchlist: &[String]) -> Result<(), Error> {
            self.inner.update_watchlist(id, watchlist).await
        }
        async fn get_holding(&self, id: &UserId, ticker: &str) -> Result<Option<Holding>, Error> {
            self.inner.get_holding(id, ticker).await
        }
        async fn list_holdings(&self, id: &UserId) -> Result<Vec<Holding>, Error> {
            self.inner.list_holdings(id).await
        }
        async fn upsert_holding(&self, holding: Holding) -> Result<(), Error> {
            self.inner.upsert_holding(holding).await
        }
        async fn remove_holding(&self, id: &UserId, ticker: &str) -> Result<(), Error> {
            self.inner.remove_holding(id, ticker).await
        }
        async fn insert_transaction(&self, tx: Transaction) -> Result<(), Error> {
            self.inner.insert_transaction(tx).await
        }
        async fn list_transactions(&self, id: &UserId) -> Result<Vec<Transaction>, Error> {
            self.inner.list_transactions(id).await
        }
        async fn upsert_snapshot(&self, snapshot: AssetSnapshot) -> Result<(), Error> {
            self.inner.upsert_snapshot(snapshot).await
        }
        async fn list_snapshots(&self, id: &UserId) -> Result<Vec<AssetSnapshot>, Error> {
            self.inner.list_snapshots(id).await
        }
    }

    #[tokio::test]
    async fn stale_read_through_cannot_clobber_a_concurrent_write() {
        let gated = Arc::new(GatedStore::new());
        let cached = Arc::new(CachedStore::new(gated.clone()));
        let id = UserId("a@x".to_string());
        cached.insert_user(user("a@x", 100.0)).await.unwrap();

        // Park the next backing read mid-flight.
        gated.armed.store(true, Ordering::SeqCst);
        let reader = tokio::spawn({
            let cached = cached.clone();
            let id = id.clone();
            async move { cached.get_user(&id).await }
        });
        gated.entered.notified().await;

        // The write lands while the read is still holding the old row.
        cached.update_balance(&id, 150.0).await.unwrap();
        gated.release.notify_one();
        reader.await.unwrap().unwrap();

        // The resumed read must not leave its pre-write row in the cache.
        assert_eq!(cached.get_user(&id).await.unwrap().unwrap().balance, 150.0);
    }
}
