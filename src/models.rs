// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identity, as verified by the auth layer. Passed by value and used
/// as the only cross-table key; storage row ids never leak out of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// New accounts start with simulated cash.
pub const STARTING_BALANCE: f64 = 10_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub password_hash: String,
    pub balance: f64,
    pub watchlist: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate position of one ticker for one user. Deleted when quantity hits zero,
/// never kept as a zero row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub user: UserId,
    pub ticker: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable trade record. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub user: UserId,
    pub ticker: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// One net-worth data point per user per calendar day, upserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub user: UserId,
    /// Calendar date, "YYYY-MM-DD".
    pub date: String,
    pub total_value: f64,
}

/// Pagination envelope shared by the list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Slices `items` to the requested page. `total_pages = ceil(total / per_page)`.
    pub fn slice(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = items.len();
        let start = (page - 1).saturating_mul(per_page);
        let data: Vec<T> = items
            .into_iter()
            .skip(start)
            .take(per_page)
            .collect();
        Page {
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
            data,
        }
    }
}

/// Serializes an optional monetary figure, rounding to cents, or the "N/A"
/// sentinel when the value is genuinely unavailable (distinct from a real zero).
pub mod maybe_money {
    use crate::valuation::round2;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_f64(round2(*v)),
            None => s.serialize_str("N/A"),
        }
    }
}

/// Serializes an optional count (e.g. volume), falling back to "N/A".
pub mod maybe_count {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_i64(*v),
            None => s.serialize_str("N/A"),
        }
    }
}

/// Serializes an optional text field, falling back to "N/A".
pub mod maybe_text {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(v),
            None => s.serialize_str("N/A"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math_matches_ceil() {
        let page = Page::slice((0..25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data, vec![20, 21, 22, 23, 24]);

        let empty = Page::slice(Vec::<i32>::new(), 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.data.is_empty());
    }

    #[test]
    fn page_clamps_bad_parameters() {
        let page = Page::slice(vec![1, 2, 3], 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.data, vec![1]);
    }

    #[test]
    fn side_round_trips_wire_names() {
        assert_eq!(Side::parse("BUY"), Some(Side::Buy));
        assert_eq!(Side::parse("SELL"), Some(Side::Sell));
        assert_eq!(Side::parse("HOLD"), None);
        assert_eq!(Side::Buy.as_str(), "BUY");
    }
}
