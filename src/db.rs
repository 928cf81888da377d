// src/db.rs
use crate::error::Error;
use crate::models::{AssetSnapshot, Holding, Side, Transaction, User, UserId};
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use rand::RngCore;
use scylla::frame::response::result::{CqlValue, Row};
use scylla::{query::Query, Session, SessionBuilder};

/// ScyllaDB-backed store. Watchlists are stored as a JSON text column;
/// timestamps as epoch-millis TIMESTAMP columns.
pub struct ScyllaStore {
    session: Session,
}

impl ScyllaStore {
    /// Connects and creates the keyspace and tables if they don't exist.
    pub async fn init(node: &str) -> Result<ScyllaStore, Error> {
        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(store_err)?;

        session.query("CREATE KEYSPACE IF NOT EXISTS paper_trader WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await.map_err(store_err)?;
        session.query("CREATE TABLE IF NOT EXISTS paper_trader.users (user_id TEXT PRIMARY KEY, password_hash TEXT, balance DOUBLE, watchlist TEXT, created_at TIMESTAMP)", &[]).await.map_err(store_err)?;
        session.query("CREATE TABLE IF NOT EXISTS paper_trader.holdings (user_id TEXT, ticker TEXT, quantity BIGINT, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (user_id, ticker))", &[]).await.map_err(store_err)?;
        session.query("CREATE TABLE IF NOT EXISTS paper_trader.transactions (user_id TEXT, created_at TIMESTAMP, tx_id TEXT, ticker TEXT, side TEXT, quantity BIGINT, price DOUBLE, PRIMARY KEY (user_id, created_at, tx_id)) WITH CLUSTERING ORDER BY (created_at DESC, tx_id DESC)", &[]).await.map_err(store_err)?;
        session.query("CREATE TABLE IF NOT EXISTS paper_trader.asset_history (user_id TEXT, date TEXT, total_value DOUBLE, PRIMARY KEY (user_id, date))", &[]).await.map_err(store_err)?;

        info!("Successfully connected to ScyllaDB.");
        Ok(ScyllaStore { session })
    }
}

#[async_trait]
impl Store for ScyllaStore {
    async fn insert_user(&self, user: User) -> Result<(), Error> {
        let watchlist_json = serde_json::to_string(&user.watchlist).map_err(store_err)?;
        // Lightweight transaction: the id must not already be taken, even when
        // two signups race.
        let query = Query::new("INSERT INTO paper_trader.users (user_id, password_hash, balance, watchlist, created_at) VALUES (?, ?, ?, ?, ?) IF NOT EXISTS");
        let result = self
            .session
            .query(
                query,
                (
                    user.id.0,
                    user.password_hash,
                    user.balance,
                    watchlist_json,
                    user.created_at.timestamp_millis(),
                ),
            )
            .await
            .map_err(store_err)?;
        let applied = result
            .rows
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|row| row.columns.into_iter().next().flatten())
            .map(|v| matches!(v, CqlValue::Boolean(true)))
            .unwrap_or(false);
        if !applied {
            return Err(Error::UserExists);
        }
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, Error> {
        let query = Query::new("SELECT password_hash, balance, watchlist, created_at FROM paper_trader.users WHERE user_id = ?");
        let result = self
            .session
            .query(query, (id.as_str(),))
            .await
            .map_err(store_err)?;
        let row = match result.rows.unwrap_or_default().into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        };
        let watchlist: Vec<String> =
            serde_json::from_str(&text_col(&row, 2)?).map_err(store_err)?;
        Ok(Some(User {
            id: id.clone(),
            password_hash: text_col(&row, 0)?,
            balance: double_col(&row, 1)?,
            watchlist,
            created_at: timestamp_col(&row, 3)?,
        }))
    }

    async fn update_balance(&self, id: &UserId, balance: f64) -> Result<(), Error> {
        let query = Query::new("UPDATE paper_trader.users SET balance = ? WHERE user_id = ?");
        self.session
            .query(query, (balance, id.as_str()))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn update_watchlist(&self, id: &UserId, watchlist: &[String]) -> Result<(), Error> {
        let watchlist_json = serde_json::to_string(watchlist).map_err(store_err)?;
        let query = Query::new("UPDATE paper_trader.users SET watchlist = ? WHERE user_id = ?");
        self.session
            .query(query, (watchlist_json, id.as_str()))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn get_holding(&self, id: &UserId, ticker: &str) -> Result<Option<Holding>, Error> {
        let query = Query::new("SELECT quantity, created_at, updated_at FROM paper_trader.holdings WHERE user_id = ? AND ticker = ?");
        let result = self
            .session
            .query(query, (id.as_str(), ticker))
            .await
            .map_err(store_err)?;
        match result.rows.unwrap_or_default().into_iter().next() {
            Some(row) => Ok(Some(Holding {
                user: id.clone(),
                ticker: ticker.to_string(),
                quantity: bigint_col(&row, 0)?,
                created_at: timestamp_col(&row, 1)?,
                updated_at: timestamp_col(&row, 2)?,
            })),
            None => Ok(None),
        }
    }

    async fn list_holdings(&self, id: &UserId) -> Result<Vec<Holding>, Error> {
        let query = Query::new("SELECT ticker, quantity, created_at, updated_at FROM paper_trader.holdings WHERE user_id = ?");
        let result = self
            .session
            .query(query, (id.as_str(),))
            .await
            .map_err(store_err)?;
        // Clustering on ticker keeps the rows ticker-ascending.
        result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                Ok(Holding {
                    user: id.clone(),
                    ticker: text_col(&row, 0)?,
                    quantity: bigint_col(&row, 1)?,
                    created_at: timestamp_col(&row, 2)?,
                    updated_at: timestamp_col(&row, 3)?,
                })
            })
            .collect()
    }

    async fn upsert_holding(&self, holding: Holding) -> Result<(), Error> {
        let query = Query::new("INSERT INTO paper_trader.holdings (user_id, ticker, quantity, created_at, updated_at) VALUES (?, ?, ?, ?, ?)");
        self.session
            .query(
                query,
                (
                    holding.user.0,
                    holding.ticker,
                    holding.quantity,
                    holding.created_at.timestamp_millis(),
                    holding.updated_at.timestamp_millis(),
                ),
            )
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn remove_holding(&self, id: &UserId, ticker: &str) -> Result<(), Error> {
        let query =
            Query::new("DELETE FROM paper_trader.holdings WHERE user_id = ? AND ticker = ?");
        self.session
            .query(query, (id.as_str(), ticker))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn insert_transaction(&self, tx: Transaction) -> Result<(), Error> {
        // created_at has millisecond resolution; tx_id keeps trades that land
        // on the same tick as distinct rows instead of overwriting each other.
        let mut tie = [0u8; 16];
        rand::rng().fill_bytes(&mut tie);
        let query = Query::new("INSERT INTO paper_trader.transactions (user_id, created_at, tx_id, ticker, side, quantity, price) VALUES (?, ?, ?, ?, ?, ?, ?)");
        self.session
            .query(
                query,
                (
                    tx.user.0,
                    tx.created_at.timestamp_millis(),
                    hex::encode(tie),
                    tx.ticker,
                    tx.side.as_str(),
                    tx.quantity,
                    tx.price,
                ),
            )
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn list_transactions(&self, id: &UserId) -> Result<Vec<Transaction>, Error> {
        let query = Query::new("SELECT created_at, ticker, side, quantity, price FROM paper_trader.transactions WHERE user_id = ?");
        let result = self
            .session
            .query(query, (id.as_str(),))
            .await
            .map_err(store_err)?;
        // Clustering order is created_at DESC, newest first.
        result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                let side_text = text_col(&row, 2)?;
                let side = Side::parse(&side_text)
                    .ok_or_else(|| Error::Store(format!("Unknown side: {}", side_text)))?;
                Ok(Transaction {
                    user: id.clone(),
                    created_at: timestamp_col(&row, 0)?,
                    ticker: text_col(&row, 1)?,
                    side,
                    quantity: bigint_col(&row, 3)?,
                    price: double_col(&row, 4)?,
                })
            })
            .collect()
    }

    async fn upsert_snapshot(&self, snapshot: AssetSnapshot) -> Result<(), Error> {
        let query = Query::new("INSERT INTO paper_trader.asset_history (user_id, date, total_value) VALUES (?, ?, ?)");
        self.session
            .query(
                query,
                (snapshot.user.0, snapshot.date, snapshot.total_value),
            )
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn list_snapshots(&self, id: &UserId) -> Result<Vec<AssetSnapshot>, Error> {
        let query = Query::new(
            "SELECT date, total_value FROM paper_trader.asset_history WHERE user_id = ?",
        );
        let result = self
            .session
            .query(query, (id.as_str(),))
            .await
            .map_err(store_err)?;
        // Clustering on date keeps the rows date-ascending.
        result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                Ok(AssetSnapshot {
                    user: id.clone(),
                    date: text_col(&row, 0)?,
                    total_value: double_col(&row, 1)?,
                })
            })
            .collect()
    }
}

fn store_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Store(e.to_string())
}

fn column<'a>(row: &'a Row, idx: usize) -> Result<&'a CqlValue, Error> {
    row.columns
        .get(idx)
        .and_then(|c| c.as_ref())
        .ok_or_else(|| Error::Store(format!("Missing column {}", idx)))
}

fn text_col(row: &Row, idx: usize) -> Result<String, Error> {
    column(row, idx)?
        .as_text()
        .cloned()
        .ok_or_else(|| Error::Store(format!("Column {} is not text", idx)))
}

fn double_col(row: &Row, idx: usize) -> Result<f64, Error> {
    column(row, idx)?
        .as_double()
        .ok_or_else(|| Error::Store(format!("Column {} is not a double", idx)))
}

fn bigint_col(row: &Row, idx: usize) -> Result<i64, Error> {
    column(row, idx)?
        .as_bigint()
        .ok_or_else(|| Error::Store(format!("Column {} is not a bigint", idx)))
}

fn timestamp_col(row: &Row, idx: usize) -> Result<DateTime<Utc>, Error> {
    match column(row, idx)? {
        CqlValue::Timestamp(ts) => DateTime::<Utc>::from_timestamp_millis(ts.num_milliseconds())
            .ok_or_else(|| Error::Store(format!("Column {} is out of range", idx))),
        _ => Err(Error::Store(format!("Column {} is not a timestamp", idx))),
    }
}
