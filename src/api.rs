// src/api.rs
use crate::auth;
use crate::cache::QuoteCache;
use crate::error::Error;
use crate::ledger::Ledger;
use crate::models::{Page, User, UserId, STARTING_BALANCE};
use crate::store::Store;
use crate::valuation::{self, round2};
use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct Ctx {
    pub store: Arc<dyn Store>,
    pub cache: Arc<QuoteCache>,
    pub ledger: Arc<Ledger>,
    pub jwt_secret: Arc<String>,
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct TradeRequest {
    ticker: String,
    quantity: i64,
}

#[derive(Deserialize)]
struct AmountRequest {
    amount: f64,
}

#[derive(Deserialize)]
struct SymbolBody {
    symbol: String,
}

#[derive(Deserialize)]
struct SymbolQuery {
    symbol: String,
}

#[derive(Deserialize)]
struct StockQuery {
    stock: String,
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    10
}

#[derive(Serialize)]
struct PositionView {
    ticker: String,
    #[serde(serialize_with = "crate::models::maybe_text::serialize")]
    company_name: Option<String>,
    /// Date part of the holding's last update.
    timestamp: String,
    quantity: i64,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    day_change: Option<f64>,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    day_change_percent: Option<f64>,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    price: Option<f64>,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    total_value: Option<f64>,
}

#[derive(Serialize)]
struct TransactionView {
    ticker: String,
    action: &'static str,
    quantity: i64,
    price: f64,
    created_at: String,
}

#[derive(Serialize)]
struct StockView {
    ticker: String,
    #[serde(serialize_with = "crate::models::maybe_text::serialize")]
    company_name: Option<String>,
    current_price: f64,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    day_change: Option<f64>,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    day_change_percent: Option<f64>,
    #[serde(serialize_with = "crate::models::maybe_count::serialize")]
    volume: Option<i64>,
}

#[derive(Serialize)]
struct WatchItemView {
    symbol: String,
    #[serde(serialize_with = "crate::models::maybe_money::serialize")]
    price: Option<f64>,
}

#[derive(Serialize)]
struct ConstituentView {
    name: String,
    value: f64,
}

pub fn routes(ctx: Ctx) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let signup = warp::path!("signup")
        .and(warp::post())
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(signup_handler);

    let login = warp::path!("login")
        .and(warp::post())
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(login_handler);

    let stock = warp::path!("stock")
        .and(warp::get())
        .and(warp::query::<StockQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(stock_handler);

    let list_by_symbol = warp::path!("listBySymbol")
        .and(warp::get())
        .and(warp::query::<SymbolQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(list_by_symbol_handler);

    let portfolio = warp::path!("portfolio")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(portfolio_handler);

    let transactions = warp::path!("transactions")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(transactions_handler);

    let buy = warp::path!("buy")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(buy_handler);

    let sell = warp::path!("sell")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(sell_handler);

    let balance = warp::path!("balance")
        .and(warp::get())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(balance_handler);

    let deposit = warp::path!("deposit")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(deposit_handler);

    let withdraw = warp::path!("withdraw")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(withdraw_handler);

    let asset = warp::path!("asset")
        .and(warp::get())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(asset_handler);

    let snapshot = warp::path!("asset" / "snapshot")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(snapshot_handler);

    let constituents = warp::path!("assetConstituents")
        .and(warp::get())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(constituents_handler);

    let watchlist_get = warp::path!("watchlist")
        .and(warp::get())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and_then(watchlist_get_handler);

    let watchlist_add = warp::path!("watchlist")
        .and(warp::post())
        .and(with_auth(ctx.clone()))
        .and(with_ctx(ctx.clone()))
        .and(warp::body::json())
        .and_then(watchlist_add_handler);

    let watchlist_remove = warp::path!("watchlist")
        .and(warp::delete())
        .and(with_auth(ctx.clone()))
        .and(warp::query::<SymbolQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(watchlist_remove_handler);

    signup
        .or(login)
        .or(stock)
        .or(list_by_symbol)
        .or(portfolio)
        .or(transactions)
        .or(buy)
        .or(sell)
        .or(balance)
        .or(deposit)
        .or(withdraw)
        .or(snapshot)
        .or(asset)
        .or(constituents)
        .or(watchlist_get)
        .or(watchlist_add)
        .or(watchlist_remove)
}

fn with_ctx(ctx: Ctx) -> impl Filter<Extract = (Ctx,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Verifies the bearer token and extracts the caller's identity. Everything
/// downstream trusts this identity; no further credential checks happen.
fn with_auth(ctx: Ctx) -> impl Filter<Extract = (UserId,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let secret = ctx.jwt_secret.clone();
        async move { authorize(&header, &secret).map_err(warp::reject::custom) }
    })
}

fn authorize(header: &str, secret: &str) -> Result<UserId, Error> {
    let token = header.strip_prefix("Bearer ").ok_or(Error::Unauthorized)?;
    Ok(UserId(auth::verify_token(token, secret)?))
}

async fn signup_handler(ctx: Ctx, creds: Credentials) -> Result<impl Reply, Rejection> {
    let id = UserId(creds.email.clone());
    if ctx.store.get_user(&id).await.map_err(warp::reject::custom)?.is_some() {
        return Err(warp::reject::custom(Error::UserExists));
    }
    let user = User {
        id: id.clone(),
        password_hash: auth::hash_password(&creds.password),
        balance: STARTING_BALANCE,
        watchlist: Vec::new(),
        created_at: Utc::now(),
    };
    ctx.store.insert_user(user).await.map_err(warp::reject::custom)?;
    let token = auth::create_token(id.as_str(), &ctx.jwt_secret).map_err(warp::reject::custom)?;
    info!("Created user {}", id);
    Ok(warp::reply::json(&json!({ "access_token": token })))
}

async fn login_handler(ctx: Ctx, creds: Credentials) -> Result<impl Reply, Rejection> {
    let id = UserId(creds.email.clone());
    let user = ctx
        .store
        .get_user(&id)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| warp::reject::custom(Error::UserNotFound))?;
    if !auth::verify_password(&creds.password, &user.password_hash) {
        return Err(warp::reject::custom(Error::InvalidCredentials));
    }
    let token = auth::create_token(id.as_str(), &ctx.jwt_secret).map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&json!({
        "access_token": token,
        "email": creds.email,
    })))
}

async fn stock_handler(query: StockQuery, ctx: Ctx) -> Result<impl Reply, Rejection> {
    // Read-only endpoint: an unavailable quote degrades to "N/A", not an error.
    let body = match ctx.cache.get(&query.stock).await {
        Ok(quote) => json!({ "ticker": query.stock, "price": round2(quote.price) }),
        Err(Error::QuoteUnavailable(_)) => json!({ "ticker": query.stock, "price": "N/A" }),
        Err(e) => return Err(warp::reject::custom(e)),
    };
    Ok(warp::reply::json(&body))
}

async fn list_by_symbol_handler(query: SymbolQuery, ctx: Ctx) -> Result<impl Reply, Rejection> {
    let quote = match ctx.cache.get(&query.symbol).await {
        Ok(quote) => quote,
        Err(Error::QuoteUnavailable(_)) => {
            let empty = json!({ "total": 0, "page": 1, "per_page": 10, "total_pages": 1 });
            return Ok(warp::reply::json(&empty));
        }
        Err(e) => return Err(warp::reject::custom(e)),
    };
    let data = StockView {
        ticker: query.symbol,
        company_name: quote.long_name.clone(),
        current_price: round2(quote.price),
        day_change: valuation::day_change(quote.price, quote.previous_close),
        day_change_percent: valuation::day_change_percent(quote.price, quote.previous_close),
        volume: quote.volume,
    };
    Ok(warp::reply::json(&json!({
        "total": 1,
        "page": 1,
        "per_page": 10,
        "total_pages": 1,
        "data": data,
    })))
}

async fn portfolio_handler(
    page: PageQuery,
    user: UserId,
    ctx: Ctx,
) -> Result<impl Reply, Rejection> {
    let holdings = ctx
        .store
        .list_holdings(&user)
        .await
        .map_err(warp::reject::custom)?;
    let paged = Page::slice(holdings, page.page, page.per_page);

    // One batched quote lookup for the page; only uncached tickers go upstream.
    let tickers: Vec<String> = paged.data.iter().map(|h| h.ticker.clone()).collect();
    let quotes: HashMap<String, _> = ctx
        .cache
        .get_many(&tickers)
        .await
        .map_err(warp::reject::custom)?
        .into_iter()
        .collect();

    let data: Vec<PositionView> = paged
        .data
        .iter()
        .map(|holding| {
            let quote = quotes.get(&holding.ticker);
            PositionView {
                ticker: holding.ticker.clone(),
                company_name: quote.and_then(|q| q.long_name.clone()),
                timestamp: holding.updated_at.format("%Y-%m-%d").to_string(),
                quantity: holding.quantity,
                day_change: quote
                    .and_then(|q| valuation::day_change(q.price, q.previous_close)),
                day_change_percent: quote
                    .and_then(|q| valuation::day_change_percent(q.price, q.previous_close)),
                price: quote.map(|q| q.price),
                total_value: quote.map(|q| valuation::position_value(holding.quantity, q.price)),
            }
        })
        .collect();

    Ok(warp::reply::json(&Page {
        total: paged.total,
        page: paged.page,
        per_page: paged.per_page,
        total_pages: paged.total_pages,
        data,
    }))
}

async fn transactions_handler(
    page: PageQuery,
    user: UserId,
    ctx: Ctx,
) -> Result<impl Reply, Rejection> {
    let transactions = ctx
        .store
        .list_transactions(&user)
        .await
        .map_err(warp::reject::custom)?;
    let paged = Page::slice(transactions, page.page, page.per_page);
    let data: Vec<TransactionView> = paged
        .data
        .iter()
        .map(|tx| TransactionView {
            ticker: tx.ticker.clone(),
            action: tx.side.as_str(),
            quantity: tx.quantity,
            price: round2(tx.price),
            created_at: tx.created_at.format("%Y-%m-%d").to_string(),
        })
        .collect();
    Ok(warp::reply::json(&Page {
        total: paged.total,
        page: paged.page,
        per_page: paged.per_page,
        total_pages: paged.total_pages,
        data,
    }))
}

async fn buy_handler(user: UserId, ctx: Ctx, body: TradeRequest) -> Result<impl Reply, Rejection> {
    match ctx.ledger.buy(&user, &body.ticker, body.quantity).await {
        Ok(_) => Ok(warp::reply::json(
            &json!({ "message": "Stock purchased successfully!" }),
        )),
        Err(e) => {
            error!("Buy failed for {}: {}", user, e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn sell_handler(user: UserId, ctx: Ctx, body: TradeRequest) -> Result<impl Reply, Rejection> {
    match ctx.ledger.sell(&user, &body.ticker, body.quantity).await {
        Ok(_) => Ok(warp::reply::json(
            &json!({ "message": "Stock sold successfully!" }),
        )),
        Err(e) => {
            error!("Sell failed for {}: {}", user, e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn balance_handler(user: UserId, ctx: Ctx) -> Result<impl Reply, Rejection> {
    let user = ctx
        .store
        .get_user(&user)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| warp::reject::custom(Error::UserNotFound))?;
    Ok(warp::reply::json(&json!({ "balance": round2(user.balance) })))
}

async fn deposit_handler(
    user: UserId,
    ctx: Ctx,
    body: AmountRequest,
) -> Result<impl Reply, Rejection> {
    ctx.ledger
        .deposit(&user, body.amount)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&json!({ "message": "Deposit successful!" })))
}

async fn withdraw_handler(
    user: UserId,
    ctx: Ctx,
    body: AmountRequest,
) -> Result<impl Reply, Rejection> {
    match ctx.ledger.withdraw(&user, body.amount).await {
        Ok(_) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "message": "Withdrawal successful!" })),
            StatusCode::OK,
        )),
        // A shortfall on withdraw reports under "error"; buy and sell use
        // "message" for the same condition.
        Err(Error::InsufficientFunds) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": Error::InsufficientFunds.to_string() })),
            StatusCode::BAD_REQUEST,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// Net-worth history: one label/value pair per stored snapshot, plus today's
/// live valuation appended at the end.
async fn asset_handler(user: UserId, ctx: Ctx) -> Result<impl Reply, Rejection> {
    let snapshots = ctx
        .store
        .list_snapshots(&user)
        .await
        .map_err(warp::reject::custom)?;
    let mut labels: Vec<String> = snapshots.iter().map(|s| s.date.clone()).collect();
    let mut values: Vec<f64> = snapshots.iter().map(|s| round2(s.total_value)).collect();

    let worth = ctx
        .ledger
        .net_worth(&user)
        .await
        .map_err(warp::reject::custom)?;
    labels.push(Utc::now().format("%Y-%m-%d").to_string());
    values.push(round2(worth));

    Ok(warp::reply::json(&json!({ "labels": labels, "values": values })))
}

async fn snapshot_handler(user: UserId, ctx: Ctx) -> Result<impl Reply, Rejection> {
    let snapshot = ctx
        .ledger
        .record_snapshot(&user)
        .await
        .map_err(warp::reject::custom)?;
    info!("Recorded snapshot for {} on {}", user, snapshot.date);
    Ok(warp::reply::json(
        &json!({ "message": "Portfolio snapshot recorded!" }),
    ))
}

async fn constituents_handler(user: UserId, ctx: Ctx) -> Result<impl Reply, Rejection> {
    let account = ctx
        .store
        .get_user(&user)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| warp::reject::custom(Error::UserNotFound))?;
    let holdings = ctx
        .store
        .list_holdings(&user)
        .await
        .map_err(warp::reject::custom)?;
    let tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
    let quotes: HashMap<String, _> = ctx
        .cache
        .get_many(&tickers)
        .await
        .map_err(warp::reject::custom)?
        .into_iter()
        .collect();

    let mut result = vec![ConstituentView {
        name: "balance".to_string(),
        value: round2(account.balance),
    }];
    for holding in &holdings {
        if let Some(quote) = quotes.get(&holding.ticker) {
            result.push(ConstituentView {
                name: holding.ticker.clone(),
                value: round2(valuation::position_value(holding.quantity, quote.price)),
            });
        }
    }
    Ok(warp::reply::json(&result))
}

async fn watchlist_get_handler(user: UserId, ctx: Ctx) -> Result<impl Reply, Rejection> {
    let account = ctx
        .store
        .get_user(&user)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| warp::reject::custom(Error::UserNotFound))?;
    let quotes: HashMap<String, _> = ctx
        .cache
        .get_many(&account.watchlist)
        .await
        .map_err(warp::reject::custom)?
        .into_iter()
        .collect();
    let result: Vec<WatchItemView> = account
        .watchlist
        .iter()
        .map(|symbol| WatchItemView {
            symbol: symbol.clone(),
            price: quotes.get(symbol).map(|q| q.price),
        })
        .collect();
    Ok(warp::reply::json(&result))
}

async fn watchlist_add_handler(
    user: UserId,
    ctx: Ctx,
    body: SymbolBody,
) -> Result<impl Reply, Rejection> {
    ctx.ledger
        .add_to_watchlist(&user, &body.symbol)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(
        &json!({ "message": "Stock added to watchlist!" }),
    ))
}

async fn watchlist_remove_handler(
    user: UserId,
    query: SymbolQuery,
    ctx: Ctx,
) -> Result<impl Reply, Rejection> {
    ctx.ledger
        .remove_from_watchlist(&user, &query.symbol)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(
        &json!({ "message": "Stock removed from watchlist!" }),
    ))
}

/// Maps the error taxonomy onto HTTP statuses. Buy/sell-style user errors keep
/// the original "message" key; everything else reports under "error".
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(e) = err.find::<Error>() {
        match e {
            Error::InsufficientFunds | Error::InsufficientHoldings => (
                StatusCode::BAD_REQUEST,
                json!({ "message": e.to_string() }),
            ),
            Error::UserExists | Error::InvalidCredentials | Error::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
            }
            Error::UserNotFound => (StatusCode::NOT_FOUND, json!({ "error": e.to_string() })),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": e.to_string() })),
            Error::QuoteUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, json!({ "error": e.to_string() }))
            }
            Error::Store(_) => {
                error!("Storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        }
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "error": "Not found" }))
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            json!({ "error": Error::Unauthorized.to_string() }),
        )
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Internal server error" }),
        )
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::FixedQuoteSource;
    use crate::store::MemoryStore;
    use std::time::Duration;

    const SECRET: &str = "test-secret";

    /// Context with one funded user and an authorization header for them.
    async fn ctx_with_user(balance: f64, prices: &[(&str, f64)]) -> (Ctx, String) {
        let source = Arc::new(FixedQuoteSource::new());
        for (ticker, price) in prices {
            source.set_price(ticker, *price, Some(*price));
        }
        let cache = Arc::new(QuoteCache::new(
            source,
            Duration::from_secs(60),
            100,
        ));
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store
            .insert_user(User {
                id: UserId("trader@example.com".to_string()),
                password_hash: "salt$digest".to_string(),
                balance,
                watchlist: Vec::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let ledger = Arc::new(Ledger::new(store.clone(), cache.clone()));
        let ctx = Ctx {
            store,
            cache,
            ledger,
            jwt_secret: Arc::new(SECRET.to_string()),
        };
        let token = auth::create_token("trader@example.com", SECRET).unwrap();
        (ctx, format!("Bearer {}", token))
    }

    #[tokio::test]
    async fn withdraw_shortfall_reports_under_the_error_key() {
        let (ctx, auth_header) = ctx_with_user(100.0, &[]).await;
        let api = routes(ctx).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/withdraw")
            .header("authorization", &auth_header)
            .json(&json!({ "amount": 500.0 }))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "Not enough balance");
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn unaffordable_buy_reports_under_the_message_key() {
        let (ctx, auth_header) = ctx_with_user(100.0, &[("AAPL", 100.0)]).await;
        let api = routes(ctx).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/buy")
            .header("authorization", &auth_header)
            .json(&json!({ "ticker": "AAPL", "quantity": 5 }))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["message"], "Not enough balance");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected_and_keeps_the_first_account() {
        let (ctx, _) = ctx_with_user(250.0, &[]).await;
        let store = ctx.store.clone();
        let api = routes(ctx).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/signup")
            .json(&json!({ "email": "trader@example.com", "password": "hunter2" }))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "User already exists!");
        let id = UserId("trader@example.com".to_string());
        assert_eq!(store.get_user(&id).await.unwrap().unwrap().balance, 250.0);
    }
}
