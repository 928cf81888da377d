// src/error.rs
use std::fmt;
use warp::reject::Reject;

/// Error taxonomy for the trading core. Read-only endpoints degrade a
/// `QuoteUnavailable` into "N/A" fields; buy/sell treat it as a hard failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Upstream quote fetch failed, timed out, or returned no data.
    QuoteUnavailable(String),
    InsufficientFunds,
    InsufficientHoldings,
    UserNotFound,
    UserExists,
    InvalidCredentials,
    Unauthorized,
    BadRequest(String),
    Store(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::QuoteUnavailable(ticker) => write!(f, "No quote available for {}", ticker),
            Error::InsufficientFunds => write!(f, "Not enough balance"),
            Error::InsufficientHoldings => write!(f, "Not enough stock to sell"),
            Error::UserNotFound => write!(f, "User does not exist!"),
            Error::UserExists => write!(f, "User already exists!"),
            Error::InvalidCredentials => write!(f, "Invalid password!"),
            Error::Unauthorized => write!(f, "Missing or invalid token"),
            Error::BadRequest(msg) => write!(f, "{}", msg),
            Error::Store(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Reject for Error {}
