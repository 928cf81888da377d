// src/quotes.rs
use crate::error::Error;
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One upstream quote. `previous_close`, `volume` and `long_name` are optional
/// because not every provider response carries them; callers render "N/A".
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub volume: Option<i64>,
    pub long_name: Option<String>,
}

/// Upstream market-data capability. Used exclusively by the quote cache on miss.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_one(&self, ticker: &str) -> Result<Quote, Error>;

    /// Batched fetch. Tickers the upstream cannot price are simply absent from
    /// the result; `Err` is reserved for wholesale transport failure.
    async fn fetch_many(&self, tickers: &[String]) -> Result<Vec<Quote>, Error>;
}

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: Option<GlobalQuote>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
}

/// Alpha Vantage GLOBAL_QUOTE source. The free API has no batch endpoint, so
/// `fetch_many` loops and drops the tickers that fail.
pub struct AlphaVantageSource {
    client: Client,
    api_key: String,
    timeout: Duration,
}

impl AlphaVantageSource {
    pub fn new(api_key: String, timeout: Duration) -> AlphaVantageSource {
        AlphaVantageSource {
            client: Client::new(),
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageSource {
    async fn fetch_one(&self, ticker: &str) -> Result<Quote, Error> {
        let url = format!(
            "https://www.alphavantage.co/query?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            ticker, self.api_key
        );
        let unavailable = || Error::QuoteUnavailable(ticker.to_string());

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|_| unavailable())?;
        if !response.status().is_success() {
            return Err(unavailable());
        }
        let body: GlobalQuoteResponse = response.json().await.map_err(|_| unavailable())?;
        let quote = body.quote.ok_or_else(unavailable)?;
        let price: f64 = quote
            .price
            .as_deref()
            .and_then(|p| p.parse().ok())
            .ok_or_else(unavailable)?;

        Ok(Quote {
            ticker: quote.symbol.unwrap_or_else(|| ticker.to_string()),
            price,
            previous_close: quote.previous_close.as_deref().and_then(|p| p.parse().ok()),
            volume: quote.volume.as_deref().and_then(|v| v.parse().ok()),
            // GLOBAL_QUOTE carries no company name.
            long_name: None,
        })
    }

    async fn fetch_many(&self, tickers: &[String]) -> Result<Vec<Quote>, Error> {
        let mut quotes = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match self.fetch_one(ticker).await {
                Ok(quote) => quotes.push(quote),
                Err(e) => warn!("Dropping {} from batch: {}", ticker, e),
            }
        }
        Ok(quotes)
    }
}

/// In-process quote table. Serves offline runs and every cache/ledger test; the
/// counters let tests assert exactly how often the upstream was hit.
pub struct FixedQuoteSource {
    quotes: Mutex<HashMap<String, Quote>>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FixedQuoteSource {
    pub fn new() -> FixedQuoteSource {
        FixedQuoteSource {
            quotes: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// A small fixture universe for offline demo runs.
    pub fn with_demo_universe() -> FixedQuoteSource {
        let source = FixedQuoteSource::new();
        for (ticker, price, prev, name) in [
            ("AAPL", 232.5, 229.1, "Apple Inc."),
            ("GOOGL", 201.4, 203.0, "Alphabet Inc."),
            ("MSFT", 512.3, 508.7, "Microsoft Corporation"),
            ("ABNB", 131.9, 131.9, "Airbnb, Inc."),
            ("ADBE", 349.2, 352.8, "Adobe Inc."),
        ] {
            source.insert(Quote {
                ticker: ticker.to_string(),
                price,
                previous_close: Some(prev),
                volume: Some(1_000_000),
                long_name: Some(name.to_string()),
            });
        }
        source
    }

    pub fn insert(&self, quote: Quote) {
        self.quotes
            .lock()
            .expect("quote table poisoned")
            .insert(quote.ticker.clone(), quote);
    }

    pub fn set_price(&self, ticker: &str, price: f64, previous_close: Option<f64>) {
        self.insert(Quote {
            ticker: ticker.to_string(),
            price,
            previous_close,
            volume: None,
            long_name: None,
        });
    }

    /// Total number of tickers the upstream has been asked for, across both
    /// single and batched fetches.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every ticker requested so far, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("request log poisoned").clone()
    }

    fn record(&self, ticker: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .expect("request log poisoned")
            .push(ticker.to_string());
    }
}

impl Default for FixedQuoteSource {
    fn default() -> Self {
        FixedQuoteSource::new()
    }
}

#[async_trait]
impl QuoteSource for FixedQuoteSource {
    async fn fetch_one(&self, ticker: &str) -> Result<Quote, Error> {
        self.record(ticker);
        self.quotes
            .lock()
            .expect("quote table poisoned")
            .get(ticker)
            .cloned()
            .ok_or_else(|| Error::QuoteUnavailable(ticker.to_string()))
    }

    async fn fetch_many(&self, tickers: &[String]) -> Result<Vec<Quote>, Error> {
        let table = self.quotes.lock().expect("quote table poisoned");
        let mut quotes = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            self.record(ticker);
            if let Some(quote) = table.get(ticker) {
                quotes.push(quote.clone());
            }
        }
        Ok(quotes)
    }
}
