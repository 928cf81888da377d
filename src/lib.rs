// src/lib.rs
//! Paper-trading backend: simulated buy/sell against live quotes, with cash
//! balance, holdings, transaction history, daily net-worth snapshots and a
//! watchlist. The quote cache and the ledger carry the interesting invariants;
//! the HTTP layer in `api` is thin glue around them.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod quotes;
pub mod store;
pub mod valuation;
