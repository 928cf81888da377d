// src/config.rs
use std::env;
use std::time::Duration;

/// Which `Store` implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Scylla,
    Memory,
}

/// Which quote source feeds the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteBackend {
    AlphaVantage,
    /// Offline fixture prices, for demos and local runs without an API key.
    Fixed,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub scylla_node: String,
    pub store_backend: StoreBackend,
    pub quote_backend: QuoteBackend,
    pub api_key: String,
    pub jwt_secret: String,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub upstream_timeout: Duration,
}

impl Config {
    /// Reads configuration from the environment, falling back to local-dev defaults.
    pub fn from_env() -> Config {
        Config {
            port: parse_var("PORT", 3030),
            scylla_node: env::var("SCYLLA_NODE").unwrap_or_else(|_| "127.0.0.1:9042".to_string()),
            store_backend: match env::var("STORE").as_deref() {
                Ok("memory") => StoreBackend::Memory,
                _ => StoreBackend::Scylla,
            },
            quote_backend: match env::var("QUOTE_SOURCE").as_deref() {
                Ok("fixed") => QuoteBackend::Fixed,
                _ => QuoteBackend::AlphaVantage,
            },
            api_key: env::var("ALPHAVANTAGE_API_KEY").unwrap_or_else(|_| "demo".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "super-secret-key".to_string()),
            // TTL of 5 minutes and at most 100 cached tickers.
            cache_ttl: Duration::from_secs(parse_var("QUOTE_CACHE_TTL_SECS", 300)),
            cache_capacity: parse_var("QUOTE_CACHE_CAPACITY", 100),
            upstream_timeout: Duration::from_secs(parse_var("QUOTE_TIMEOUT_SECS", 10)),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
