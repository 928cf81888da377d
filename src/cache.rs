// src/cache.rs
use crate::error::Error;
use crate::quotes::{Quote, QuoteSource};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry {
    quote: Quote,
    fetched_at: Instant,
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Tickers in insertion order; the front is evicted first when full.
    order: VecDeque<String>,
}

/// Bounded, TTL-expiring read-through cache over a `QuoteSource`.
///
/// The lock is never held across an upstream fetch, so two concurrent misses on
/// the same ticker may both hit upstream; that wastes one call but a torn entry
/// can never be observed.
pub struct QuoteCache {
    source: Arc<dyn QuoteSource>,
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl QuoteCache {
    pub fn new(source: Arc<dyn QuoteSource>, ttl: Duration, capacity: usize) -> QuoteCache {
        QuoteCache {
            source,
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns the cached quote when fresh, otherwise fetches, stores and
    /// returns it. Upstream failure propagates and caches nothing.
    pub async fn get(&self, ticker: &str) -> Result<Quote, Error> {
        {
            let inner = self.inner.lock().await;
            if let Some(entry) = inner.entries.get(ticker) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.quote.clone());
                }
            }
        }

        debug!("Quote cache miss for {}", ticker);
        let quote = self.source.fetch_one(ticker).await?;
        let mut inner = self.inner.lock().await;
        self.store(&mut inner, quote.clone());
        Ok(quote)
    }

    /// Batch lookup: hits come from the cache, the remaining subset goes
    /// upstream in a single `fetch_many`, and the merged result preserves the
    /// input ticker order. Tickers the upstream could not price are absent.
    pub async fn get_many(&self, tickers: &[String]) -> Result<Vec<(String, Quote)>, Error> {
        let mut found: HashMap<String, Quote> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        {
            let inner = self.inner.lock().await;
            for ticker in tickers {
                if found.contains_key(ticker) || misses.contains(ticker) {
                    continue;
                }
                match inner.entries.get(ticker) {
                    Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                        found.insert(ticker.clone(), entry.quote.clone());
                    }
                    _ => misses.push(ticker.clone()),
                }
            }
        }

        if !misses.is_empty() {
            debug!("Quote cache batch miss for {:?}", misses);
            let fetched = self.source.fetch_many(&misses).await?;
            let mut inner = self.inner.lock().await;
            for quote in fetched {
                found.insert(quote.ticker.clone(), quote.clone());
                self.store(&mut inner, quote);
            }
        }

        Ok(tickers
            .iter()
            .filter_map(|t| found.get(t).map(|q| (t.clone(), q.clone())))
            .collect())
    }

    fn store(&self, inner: &mut Inner, quote: Quote) {
        let ticker = quote.ticker.clone();
        if inner.entries.contains_key(&ticker) {
            // Refreshed entries move to the back of the eviction queue.
            inner.order.retain(|t| t != &ticker);
        } else if inner.entries.len() >= self.capacity {
            self.evict(inner);
        }
        inner.order.push_back(ticker.clone());
        inner.entries.insert(
            ticker,
            Entry {
                quote,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drops expired entries first; falls back to the least-recently-inserted.
    fn evict(&self, inner: &mut Inner) {
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.fetched_at.elapsed() >= self.ttl)
            .map(|(t, _)| t.clone())
            .collect();
        if !expired.is_empty() {
            for ticker in &expired {
                inner.entries.remove(ticker);
            }
            inner.order.retain(|t| !expired.contains(t));
            return;
        }
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}
