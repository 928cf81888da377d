// src/ledger.rs
use crate::cache::QuoteCache;
use crate::error::Error;
use crate::models::{AssetSnapshot, Holding, Side, Transaction, UserId};
use crate::store::Store;
use crate::valuation;
use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Owns every mutation of balance, holdings and the transaction log.
///
/// Each operation runs under a per-user async mutex: quote fetch, balance check
/// and the resulting writes form one unit, so two concurrent buys can never both
/// pass the balance check against the same stale balance. Operations on
/// different users share nothing and never block each other.
pub struct Ledger {
    store: Arc<dyn Store>,
    cache: Arc<QuoteCache>,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, cache: Arc<QuoteCache>) -> Ledger {
        Ledger {
            store,
            cache,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, id: &UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().expect("lock table poisoned");
        locks
            .entry(id.0.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Buys `quantity` shares of `ticker` at the current quote. Returns the
    /// executed price. Fails hard when the quote is unavailable; no state is
    /// touched on any failed check.
    pub async fn buy(&self, id: &UserId, ticker: &str, quantity: i64) -> Result<f64, Error> {
        require_positive_quantity(quantity)?;
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        let quote = self.cache.get(ticker).await?;
        let cost = valuation::position_value(quantity, quote.price);
        if user.balance < cost {
            return Err(Error::InsufficientFunds);
        }

        let now = Utc::now();
        self.store
            .insert_transaction(Transaction {
                user: id.clone(),
                ticker: ticker.to_string(),
                side: Side::Buy,
                quantity,
                price: quote.price,
                created_at: now,
            })
            .await?;
        let holding = match self.store.get_holding(id, ticker).await? {
            Some(existing) => Holding {
                quantity: existing.quantity + quantity,
                updated_at: now,
                ..existing
            },
            None => Holding {
                user: id.clone(),
                ticker: ticker.to_string(),
                quantity,
                created_at: now,
                updated_at: now,
            },
        };
        self.store.upsert_holding(holding).await?;
        self.store.update_balance(id, user.balance - cost).await?;

        info!("{} bought {} {} at {}", id, quantity, ticker, quote.price);
        Ok(quote.price)
    }

    /// Sells `quantity` shares. A full-quantity sell deletes the holding row
    /// rather than leaving a zero row behind. Returns the executed price.
    pub async fn sell(&self, id: &UserId, ticker: &str, quantity: i64) -> Result<f64, Error> {
        require_positive_quantity(quantity)?;
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        let holding = self
            .store
            .get_holding(id, ticker)
            .await?
            .ok_or(Error::InsufficientHoldings)?;
        if holding.quantity < quantity {
            return Err(Error::InsufficientHoldings);
        }
        let quote = self.cache.get(ticker).await?;
        let proceeds = valuation::position_value(quantity, quote.price);

        let now = Utc::now();
        self.store
            .insert_transaction(Transaction {
                user: id.clone(),
                ticker: ticker.to_string(),
                side: Side::Sell,
                quantity,
                price: quote.price,
                created_at: now,
            })
            .await?;
        let remaining = holding.quantity - quantity;
        if remaining == 0 {
            self.store.remove_holding(id, ticker).await?;
        } else {
            self.store
                .upsert_holding(Holding {
                    quantity: remaining,
                    updated_at: now,
                    ..holding
                })
                .await?;
        }
        self.store
            .update_balance(id, user.balance + proceeds)
            .await?;

        info!("{} sold {} {} at {}", id, quantity, ticker, quote.price);
        Ok(quote.price)
    }

    /// Credits the cash balance. Returns the new balance.
    pub async fn deposit(&self, id: &UserId, amount: f64) -> Result<f64, Error> {
        require_positive_amount(amount)?;
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        let balance = user.balance + amount;
        self.store.update_balance(id, balance).await?;
        Ok(balance)
    }

    /// Debits the cash balance; `InsufficientFunds` when `amount > balance`.
    pub async fn withdraw(&self, id: &UserId, amount: f64) -> Result<f64, Error> {
        require_positive_amount(amount)?;
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        if amount > user.balance {
            return Err(Error::InsufficientFunds);
        }
        let balance = user.balance - amount;
        self.store.update_balance(id, balance).await?;
        Ok(balance)
    }

    /// Adds a symbol to the watchlist; already-present symbols are a no-op.
    pub async fn add_to_watchlist(&self, id: &UserId, symbol: &str) -> Result<(), Error> {
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        if user.watchlist.iter().any(|s| s == symbol) {
            return Ok(());
        }
        let mut watchlist = user.watchlist;
        watchlist.push(symbol.to_string());
        self.store.update_watchlist(id, &watchlist).await
    }

    /// Removes a symbol from the watchlist; absent symbols are a no-op.
    pub async fn remove_from_watchlist(&self, id: &UserId, symbol: &str) -> Result<(), Error> {
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        if !user.watchlist.iter().any(|s| s == symbol) {
            return Ok(());
        }
        let watchlist: Vec<String> = user
            .watchlist
            .into_iter()
            .filter(|s| s != symbol)
            .collect();
        self.store.update_watchlist(id, &watchlist).await
    }

    /// Cash balance plus the market value of every priceable holding, valued
    /// through the cache's batch path. Holdings the upstream cannot price
    /// contribute nothing here; the portfolio view surfaces them as "N/A".
    pub async fn net_worth(&self, id: &UserId) -> Result<f64, Error> {
        let user = self.store.get_user(id).await?.ok_or(Error::UserNotFound)?;
        let holdings = self.store.list_holdings(id).await?;
        let tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
        let quotes = self.cache.get_many(&tickers).await?;
        let priced: HashMap<&str, f64> = quotes
            .iter()
            .map(|(t, q)| (t.as_str(), q.price))
            .collect();
        let positions: Vec<(i64, f64)> = holdings
            .iter()
            .filter_map(|h| priced.get(h.ticker.as_str()).map(|p| (h.quantity, *p)))
            .collect();
        Ok(valuation::net_worth(user.balance, &positions))
    }

    /// Upserts today's net-worth snapshot, computed server-side.
    pub async fn record_snapshot(&self, id: &UserId) -> Result<AssetSnapshot, Error> {
        let total_value = self.net_worth(id).await?;
        let snapshot = AssetSnapshot {
            user: id.clone(),
            date: Utc::now().format("%Y-%m-%d").to_string(),
            total_value,
        };
        self.store.upsert_snapshot(snapshot.clone()).await?;
        Ok(snapshot)
    }
}

fn require_positive_quantity(quantity: i64) -> Result<(), Error> {
    if quantity < 1 {
        return Err(Error::BadRequest("Quantity must be a positive integer".to_string()));
    }
    Ok(())
}

fn require_positive_amount(amount: f64) -> Result<(), Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::BadRequest("Amount must be positive".to_string()));
    }
    Ok(())
}
