//! Polymarket API clients: public endpoints, no authentication required
//!
//! - CLOB (`clob.polymarket.com`): price history, quotes, order books
//! - Gamma (`gamma-api.polymarket.com`): event and market listings
//! - Data API (`data-api.polymarket.com`): trades, positions, leaderboard

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{LeaderboardEntry, PriceHistorySource, TradeTapeSource};
use crate::tape::json_f64;
use crate::types::PricePoint;

pub const DEFAULT_CLOB_API_BASE: &str = "https://clob.polymarket.com";
pub const DEFAULT_GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";
pub const DEFAULT_DATA_API_BASE: &str = "https://data-api.polymarket.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_http_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .default_headers({
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT,
                reqwest::header::HeaderValue::from_static("application/json"),
            );
            headers
        })
        .build()?)
}

/// GET `url` and decode the body as JSON, failing on non-2xx statuses
async fn get_json(client: &Client, url: &str, what: &str) -> Result<Value> {
    debug!(url, "Fetching {}", what);

    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Polymarket {} error {}: {}", what, status, body);
    }

    Ok(resp.json().await?)
}

/// Accept either a bare JSON list or a wrapper object holding the list under `key`
fn unwrap_list(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Decode a prices-history payload into chronological points
pub fn parse_price_history(value: Value) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = unwrap_list(value, "history")
        .iter()
        .map(|point| PricePoint {
            timestamp: point.get("t").and_then(json_f64).unwrap_or(0.0) as i64,
            price: point.get("p").and_then(json_f64).unwrap_or(0.0),
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

// ---------------------------------------------------------------------------
// CLOB
// ---------------------------------------------------------------------------

/// CLOB API client
#[derive(Clone)]
pub struct ClobClient {
    client: Client,
    base_url: String,
}

impl ClobClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GET /prices-history?market={token_id}
    pub async fn get_prices_history(
        &self,
        token_id: &str,
        interval: &str,
        fidelity: u32,
    ) -> Result<Vec<PricePoint>> {
        let url = format!(
            "{}/prices-history?market={}&interval={}&fidelity={}",
            self.base_url, token_id, interval, fidelity
        );
        let body = get_json(&self.client, &url, "prices-history").await?;
        let points = parse_price_history(body);
        debug!(token_id, count = points.len(), "Price history fetched");
        Ok(points)
    }

    /// GET /price?token_id={token_id}
    pub async fn get_price(&self, token_id: &str) -> Result<Value> {
        let url = format!("{}/price?token_id={}", self.base_url, token_id);
        get_json(&self.client, &url, "price").await
    }

    /// GET /book?token_id={token_id}
    pub async fn get_orderbook(&self, token_id: &str) -> Result<Value> {
        let url = format!("{}/book?token_id={}", self.base_url, token_id);
        get_json(&self.client, &url, "orderbook").await
    }

    /// GET /midpoint?token_id={token_id}
    pub async fn get_midpoint(&self, token_id: &str) -> Result<Value> {
        let url = format!("{}/midpoint?token_id={}", self.base_url, token_id);
        get_json(&self.client, &url, "midpoint").await
    }
}

#[async_trait]
impl PriceHistorySource for ClobClient {
    async fn prices_history(
        &self,
        token_id: &str,
        interval: &str,
        fidelity: u32,
    ) -> Result<Vec<PricePoint>> {
        self.get_prices_history(token_id, interval, fidelity).await
    }
}

// ---------------------------------------------------------------------------
// Gamma
// ---------------------------------------------------------------------------

/// Gamma API client for market discovery
#[derive(Clone)]
pub struct GammaClient {
    client: Client,
    base_url: String,
}

impl GammaClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GET /markets — listing ordered by 24h volume
    pub async fn get_markets(&self, limit: usize, offset: usize, active: bool) -> Result<Vec<Value>> {
        let url = format!(
            "{}/markets?limit={}&offset={}&active={}&order=volume24hr&ascending=false",
            self.base_url, limit, offset, active
        );
        let body = get_json(&self.client, &url, "markets").await?;
        Ok(unwrap_list(body, "data"))
    }

    fn events_url(&self, limit: usize, offset: usize, active: bool, slug: Option<&str>) -> String {
        let mut url = format!(
            "{}/events?limit={}&offset={}&active={}",
            self.base_url, limit, offset, active
        );
        if let Some(slug) = slug {
            url.push_str(&format!("&slug={}", slug));
        }
        url
    }

    /// GET /events, optionally narrowed to one slug
    pub async fn get_events(
        &self,
        limit: usize,
        offset: usize,
        active: bool,
        slug: Option<&str>,
    ) -> Result<Vec<Value>> {
        let url = self.events_url(limit, offset, active, slug);
        let body = get_json(&self.client, &url, "events").await?;
        Ok(unwrap_list(body, "data"))
    }

    /// GET /markets/{condition_id}
    pub async fn get_market(&self, condition_id: &str) -> Result<Value> {
        let url = format!("{}/markets/{}", self.base_url, condition_id);
        get_json(&self.client, &url, "market").await
    }
}

// ---------------------------------------------------------------------------
// Data API
// ---------------------------------------------------------------------------

/// Polymarket Data API client
#[derive(Clone)]
pub struct PolymarketDataClient {
    client: Client,
    base_url: String,
}

impl PolymarketDataClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GET /trades?user={address} — one page of trade history
    pub async fn get_trades(&self, address: &str, limit: usize, offset: usize) -> Result<Vec<Value>> {
        let url = format!(
            "{}/trades?user={}&limit={}&offset={}&takerOnly=false",
            self.base_url, address, limit, offset
        );
        let body = get_json(&self.client, &url, "trades").await?;
        let trades = unwrap_list(body, "data");
        debug!(address, count = trades.len(), "Trades fetched");
        Ok(trades)
    }

    fn market_trades_url(&self, market: Option<&str>, limit: usize) -> String {
        let mut url = format!("{}/trades?limit={}", self.base_url, limit);
        if let Some(market) = market {
            url.push_str(&format!("&market={}", market));
        }
        url
    }

    /// GET /trades?limit={limit}: recent fills across users, optionally for one market
    pub async fn get_market_trades(&self, market: Option<&str>, limit: usize) -> Result<Vec<Value>> {
        let url = self.market_trades_url(market, limit);
        let body = get_json(&self.client, &url, "trades").await?;
        Ok(unwrap_list(body, "data"))
    }

    /// GET /positions?user={address} — open positions
    pub async fn get_positions(&self, address: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/positions?user={}&sortBy=CASHPNL&sortDirection=DESC&limit=100&sizeThreshold=0",
            self.base_url, address
        );
        let body = get_json(&self.client, &url, "positions").await?;
        let positions = unwrap_list(body, "data");
        debug!(address, count = positions.len(), "Positions fetched");
        Ok(positions)
    }

    /// GET /v1/leaderboard — top traders by PnL
    pub async fn get_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let url = format!(
            "{}/v1/leaderboard?category=OVERALL&timePeriod=ALL&orderBy=PNL&limit={}",
            self.base_url, limit
        );
        let body = get_json(&self.client, &url, "leaderboard").await?;
        let entries: Vec<LeaderboardEntry> = unwrap_list(body, "leaderboard")
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, record)| LeaderboardEntry::from_record(i, record))
            .collect();
        debug!(count = entries.len(), "Leaderboard fetched");
        Ok(entries)
    }
}

#[async_trait]
impl TradeTapeSource for PolymarketDataClient {
    async fn trades_page(&self, address: &str, limit: usize, offset: usize) -> Result<Vec<Value>> {
        self.get_trades(address, limit, offset).await
    }

    async fn positions(&self, address: &str) -> Result<Vec<Value>> {
        self.get_positions(address).await
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        self.get_leaderboard(limit).await
    }
}
