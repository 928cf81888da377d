// src/main.rs
use env_logger::Builder;
use log::{error, info, LevelFilter};
use paper_trader::api::{self, Ctx};
use paper_trader::cache::QuoteCache;
use paper_trader::config::{Config, QuoteBackend, StoreBackend};
use paper_trader::db::ScyllaStore;
use paper_trader::ledger::Ledger;
use paper_trader::quotes::{AlphaVantageSource, FixedQuoteSource, QuoteSource};
use paper_trader::store::{CachedStore, MemoryStore, Store};
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_secs()
        .init();
    let config = Config::from_env();

    let source: Arc<dyn QuoteSource> = match config.quote_backend {
        QuoteBackend::AlphaVantage => Arc::new(AlphaVantageSource::new(
            config.api_key.clone(),
            config.upstream_timeout,
        )),
        QuoteBackend::Fixed => {
            info!("Using fixed offline quotes");
            Arc::new(FixedQuoteSource::with_demo_universe())
        }
    };
    let cache = Arc::new(QuoteCache::new(
        source,
        config.cache_ttl,
        config.cache_capacity,
    ));

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Scylla => match ScyllaStore::init(&config.scylla_node).await {
            Ok(scylla) => Arc::new(CachedStore::new(Arc::new(scylla))),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                return;
            }
        },
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Arc::new(CachedStore::new(Arc::new(MemoryStore::new())))
        }
    };
    info!("Connected to database...");

    let ledger = Arc::new(Ledger::new(store.clone(), cache.clone()));
    let ctx = Ctx {
        store,
        cache,
        ledger,
        jwt_secret: Arc::new(config.jwt_secret.clone()),
    };

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["authorization", "content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);
    let api = api::routes(ctx).recover(api::handle_rejection).with(cors);

    info!("Server running on http://127.0.0.1:{}", config.port);
    warp::serve(api).run(([127, 0, 0, 1], config.port)).await;
}
