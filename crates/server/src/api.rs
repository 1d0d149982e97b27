//! HTTP API under `/api`: strategies, backtests, markets, portfolio and traders

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use engine::sandbox::{self, templates};
use engine::trader::{build_profile, MAX_COMPARE_ADDRESSES};
use engine::{
    classify, reconcile, run_backtest, BacktestRequest, BacktestResult, ClobClient, EngineError,
    GammaClient, Metrics, PolymarketDataClient, PricePoint, SimTrade, TraderAnalyzer,
};
use persistence::repository::{
    BacktestRecord, BacktestRepository, BacktestSummary, NewStrategy, StrategyRecord,
    StrategyRepository, StrategyUpdate, TrackedTraderRecord, TrackedTraderRepository,
    TraderSnapshot,
};
use persistence::{Database, DbError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::portfolio::{self, PortfolioSummary};
use crate::APP_VERSION;

const MAX_PAGE_LIMIT: i64 = 500;
const MAX_TRADES_PER_PAGE: usize = 200;
const MAX_LEADERBOARD_LIMIT: usize = 100;
const MAX_MARKET_TRADES: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    pub clob: Arc<ClobClient>,
    pub gamma: Arc<GammaClient>,
    pub data: Arc<PolymarketDataClient>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database) -> anyhow::Result<Self> {
        Ok(Self {
            clob: Arc::new(ClobClient::new(&config.clob_api_base)?),
            gamma: Arc::new(GammaClient::new(&config.gamma_api_base)?),
            data: Arc::new(PolymarketDataClient::new(&config.data_api_base)?),
            config: Arc::new(config),
            db: Arc::new(db),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        // Strategies
        .route("/strategies", get(list_strategies).post(create_strategy))
        .route("/strategies/templates", get(list_templates))
        .route("/strategies/validate", post(validate_strategy))
        .route(
            "/strategies/:id",
            get(get_strategy).put(update_strategy).delete(delete_strategy),
        )
        // Backtests
        .route("/backtests", get(list_backtests))
        .route("/backtests/run", post(run_backtest_endpoint))
        .route("/backtests/:id", get(get_backtest).delete(delete_backtest))
        // Markets
        .route("/markets", get(list_markets))
        .route("/markets/:condition_id", get(get_market))
        .route("/markets/events", get(list_events))
        .route("/markets/trades", get(market_trades))
        .route("/markets/prices-history/:token_id", get(prices_history))
        .route("/markets/price/:token_id", get(token_price))
        .route("/markets/orderbook/:token_id", get(token_orderbook))
        .route("/markets/midpoint/:token_id", get(token_midpoint))
        // Portfolio
        .route("/portfolio/summary", get(portfolio_summary))
        .route("/portfolio/equity-curve", get(portfolio_equity_curve))
        // Traders
        .route("/traders/leaderboard", get(leaderboard))
        .route("/traders/compare", get(compare_traders))
        .route("/traders/tracked", get(list_tracked).post(track_trader))
        .route("/traders/tracked/:address", axum::routing::delete(untrack_trader))
        .route("/traders/tracked/:address/refresh", post(refresh_tracked))
        .route("/traders/tracked/:address/favorite", put(set_favorite))
        .route("/traders/:address/profile", get(trader_profile))
        .route("/traders/:address/trades", get(trader_trades))
        .route("/traders/:address/performance", get(trader_performance))
        .route("/traders/:address/strategy", get(trader_strategy))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// Error body is `{"detail": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Unavailable(m)
            | Self::Internal(m) => m,
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidStrategy(_)
            | EngineError::InsufficientData(..)
            | EngineError::InvalidConfig(_) => Self::BadRequest(e.to_string()),
            EngineError::UpstreamFetch(_) => Self::Unavailable(e.to_string()),
            EngineError::Simulation(_) => {
                error!(error = %e, "Backtest simulation failed");
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(_) => Self::NotFound(e.to_string()),
            DbError::Conflict(msg) => Self::Conflict(msg),
            other => {
                error!(error = %other, "Storage failure");
                Self::Internal(format!("Storage failure: {}", other))
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        error!(error = %e, "Stored record is not valid JSON");
        Self::Internal(format!("Corrupt stored record: {}", e))
    }
}

fn upstream(e: anyhow::Error) -> ApiError {
    ApiError::Unavailable(format!("Upstream fetch failed: {:#}", e))
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Shared query types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_page_limit")]
    limit: i64,
}

fn default_page_limit() -> i64 {
    50
}

impl Pagination {
    fn bounds(&self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(1, MAX_PAGE_LIMIT))
    }
}

/// GET /api/health
async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "polystrat",
        "version": APP_VERSION,
    }))
}

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StrategyResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub code: String,
    pub params: Value,
    pub template_key: Option<String>,
    pub is_active: bool,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl From<StrategyRecord> for StrategyResponse {
    fn from(record: StrategyRecord) -> Self {
        Self {
            params: record.params_json(),
            id: record.id,
            name: record.name,
            description: record.description,
            code: record.code,
            template_key: record.template_key,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn check_code(code: &str) -> ApiResult<()> {
    sandbox::compile(code)
        .map(|_| ())
        .map_err(|e| EngineError::InvalidStrategy(e.to_string()).into())
}

/// GET /api/strategies/templates
async fn list_templates() -> Json<Vec<templates::StrategyTemplate>> {
    Json(templates::all())
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    code: String,
}

/// POST /api/strategies/validate — compile without saving
async fn validate_strategy(Json(body): Json<ValidateBody>) -> Json<Value> {
    match sandbox::compile(&body.code) {
        Ok(_) => Json(json!({ "valid": true, "error": null })),
        Err(e) => Json(json!({ "valid": false, "error": e.to_string() })),
    }
}

/// GET /api/strategies?skip=&limit=
async fn list_strategies(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<StrategyResponse>>> {
    let (skip, limit) = page.bounds();
    let records = StrategyRepository::new(state.db.pool()).list(skip, limit).await?;
    Ok(Json(records.into_iter().map(StrategyResponse::from).collect()))
}

/// POST /api/strategies
async fn create_strategy(
    State(state): State<AppState>,
    Json(body): Json<NewStrategy>,
) -> ApiResult<(StatusCode, Json<StrategyResponse>)> {
    check_code(&body.code)?;
    let record = StrategyRepository::new(state.db.pool()).create(&body).await?;
    info!(id = record.id, name = %record.name, "Strategy created");
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /api/strategies/:id
async fn get_strategy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StrategyResponse>> {
    let record = StrategyRepository::new(state.db.pool()).get(id).await?;
    Ok(Json(record.into()))
}

/// PUT /api/strategies/:id
async fn update_strategy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StrategyUpdate>,
) -> ApiResult<Json<StrategyResponse>> {
    if let Some(code) = &body.code {
        check_code(code)?;
    }
    let record = StrategyRepository::new(state.db.pool()).update(id, &body).await?;
    Ok(Json(record.into()))
}

/// DELETE /api/strategies/:id
async fn delete_strategy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    StrategyRepository::new(state.db.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Backtests
// ============================================================================

#[derive(Debug, Deserialize)]
struct RunBacktestBody {
    strategy_id: i64,
    token_id: String,
    #[serde(default)]
    market_name: String,
    initial_capital: Option<f64>,
    fee_rate: Option<f64>,
    interval: Option<String>,
    fidelity: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct BacktestResponse {
    pub id: i64,
    pub strategy_id: i64,
    pub token_id: String,
    pub market_name: String,
    pub strategy_hash: String,
    pub created_at: Option<i64>,
    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
    pub prices: Vec<f64>,
    pub trades: Vec<SimTrade>,
    pub metrics: Metrics,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub data_points: i64,
    pub duration_seconds: f64,
}

impl TryFrom<BacktestRecord> for BacktestResponse {
    type Error = serde_json::Error;

    fn try_from(r: BacktestRecord) -> Result<Self, Self::Error> {
        let metrics = Metrics {
            total_pnl: r.total_pnl,
            roi_pct: r.roi_pct,
            sharpe_ratio: r.sharpe_ratio,
            max_drawdown_pct: r.max_drawdown_pct,
            win_rate_pct: r.win_rate_pct,
            total_trades: r.total_trades as u32,
            winning_trades: r.winning_trades as u32,
            losing_trades: r.losing_trades as u32,
            avg_win: r.avg_win,
            avg_loss: r.avg_loss,
            profit_factor: r.profit_factor,
            max_consecutive_wins: r.max_consecutive_wins as u32,
            max_consecutive_losses: r.max_consecutive_losses as u32,
        };
        Ok(Self {
            equity_curve: serde_json::from_str(&r.equity_curve)?,
            timestamps: serde_json::from_str(&r.timestamps)?,
            prices: serde_json::from_str(&r.prices)?,
            trades: serde_json::from_str(&r.trades)?,
            metrics,
            id: r.id,
            strategy_id: r.strategy_id,
            token_id: r.token_id,
            market_name: r.market_name,
            strategy_hash: r.strategy_hash,
            created_at: r.created_at,
            initial_capital: r.initial_capital,
            final_equity: r.final_equity,
            data_points: r.data_points,
            duration_seconds: r.duration_seconds,
        })
    }
}

/// Flatten a finished run into a storable record
pub fn backtest_record(
    strategy_id: i64,
    market_name: &str,
    request: &BacktestRequest,
    result: &BacktestResult,
) -> Result<BacktestRecord, serde_json::Error> {
    let m = &result.metrics;
    Ok(BacktestRecord {
        id: 0,
        strategy_id,
        token_id: request.token_id.clone(),
        market_name: market_name.to_string(),
        strategy_hash: request.strategy_hash(),
        equity_curve: serde_json::to_string(&result.equity_curve)?,
        timestamps: serde_json::to_string(&result.timestamps)?,
        prices: serde_json::to_string(&result.prices)?,
        trades: serde_json::to_string(&result.trades)?,
        initial_capital: result.initial_capital,
        final_equity: result.final_equity,
        total_pnl: m.total_pnl,
        roi_pct: m.roi_pct,
        sharpe_ratio: m.sharpe_ratio,
        max_drawdown_pct: m.max_drawdown_pct,
        win_rate_pct: m.win_rate_pct,
        total_trades: m.total_trades as i64,
        winning_trades: m.winning_trades as i64,
        losing_trades: m.losing_trades as i64,
        avg_win: m.avg_win,
        avg_loss: m.avg_loss,
        profit_factor: m.profit_factor,
        max_consecutive_wins: m.max_consecutive_wins as i64,
        max_consecutive_losses: m.max_consecutive_losses as i64,
        data_points: result.data_points as i64,
        duration_seconds: result.duration_seconds,
        created_at: None,
    })
}

/// POST /api/backtests/run — run a stored strategy against a market and save the result
async fn run_backtest_endpoint(
    State(state): State<AppState>,
    Json(body): Json<RunBacktestBody>,
) -> ApiResult<(StatusCode, Json<BacktestResponse>)> {
    let strategy = StrategyRepository::new(state.db.pool())
        .get(body.strategy_id)
        .await?;

    let mut request = BacktestRequest::new(&body.token_id, &strategy.code);
    request.params = strategy.params_json();
    request.initial_capital = body
        .initial_capital
        .unwrap_or(state.config.default_initial_capital);
    request.fee_rate = body.fee_rate.unwrap_or(state.config.backtest_fee_rate);
    if let Some(interval) = body.interval {
        request.interval = interval;
    }
    if let Some(fidelity) = body.fidelity {
        request.fidelity = fidelity;
    }

    info!(
        strategy_id = strategy.id,
        token_id = %request.token_id,
        "Running backtest"
    );
    let result = run_backtest(state.clob.as_ref(), &request).await?;

    let record = backtest_record(strategy.id, &body.market_name, &request, &result)?;
    let saved = BacktestRepository::new(state.db.pool()).save(&record).await?;
    info!(
        id = saved.id,
        pnl = saved.total_pnl,
        trades = saved.total_trades,
        "Backtest saved"
    );

    Ok((StatusCode::CREATED, Json(saved.try_into()?)))
}

#[derive(Debug, Deserialize)]
struct BacktestListQuery {
    strategy_id: Option<i64>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_page_limit")]
    limit: i64,
}

/// GET /api/backtests?strategy_id=&skip=&limit=
async fn list_backtests(
    State(state): State<AppState>,
    Query(query): Query<BacktestListQuery>,
) -> ApiResult<Json<Vec<BacktestSummary>>> {
    let page = Pagination {
        skip: query.skip,
        limit: query.limit,
    };
    let (skip, limit) = page.bounds();
    let rows = BacktestRepository::new(state.db.pool())
        .list(query.strategy_id, skip, limit)
        .await?;
    Ok(Json(rows))
}

/// GET /api/backtests/:id
async fn get_backtest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<BacktestResponse>> {
    let record = BacktestRepository::new(state.db.pool()).get(id).await?;
    Ok(Json(record.try_into()?))
}

/// DELETE /api/backtests/:id
async fn delete_backtest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    BacktestRepository::new(state.db.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Markets
// ============================================================================

#[derive(Debug, Deserialize)]
struct MarketListQuery {
    #[serde(default = "default_market_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_market_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

/// GET /api/markets?limit=&offset=&active=
async fn list_markets(
    State(state): State<AppState>,
    Query(query): Query<MarketListQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let markets = state
        .gamma
        .get_markets(query.limit.clamp(1, 100), query.offset, query.active)
        .await
        .map_err(upstream)?;
    Ok(Json(markets))
}

/// GET /api/markets/:condition_id
async fn get_market(
    State(state): State<AppState>,
    Path(condition_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let market = state
        .gamma
        .get_market(&condition_id)
        .await
        .map_err(upstream)?;
    Ok(Json(market))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    interval: Option<String>,
    fidelity: Option<u32>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    token_id: String,
    history: Vec<PricePoint>,
}

/// GET /api/markets/prices-history/:token_id?interval=&fidelity=
async fn prices_history(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let interval = query
        .interval
        .unwrap_or_else(|| engine::engine::DEFAULT_INTERVAL.to_string());
    let fidelity = query.fidelity.unwrap_or(engine::engine::DEFAULT_FIDELITY);
    let history = state
        .clob
        .get_prices_history(&token_id, &interval, fidelity)
        .await
        .map_err(upstream)?;
    Ok(Json(HistoryResponse { token_id, history }))
}

#[derive(Debug, Deserialize)]
struct EventListQuery {
    #[serde(default = "default_market_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_true")]
    active: bool,
    slug: Option<String>,
}

/// GET /api/markets/events?limit=&offset=&active=&slug=
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let events = state
        .gamma
        .get_events(
            query.limit.clamp(1, 100),
            query.offset,
            query.active,
            query.slug.as_deref(),
        )
        .await
        .map_err(upstream)?;
    Ok(Json(events))
}

/// GET /api/markets/price/:token_id
async fn token_price(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let price = state.clob.get_price(&token_id).await.map_err(upstream)?;
    Ok(Json(price))
}

/// GET /api/markets/orderbook/:token_id
async fn token_orderbook(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let book = state.clob.get_orderbook(&token_id).await.map_err(upstream)?;
    Ok(Json(book))
}

/// GET /api/markets/midpoint/:token_id
async fn token_midpoint(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let midpoint = state.clob.get_midpoint(&token_id).await.map_err(upstream)?;
    Ok(Json(midpoint))
}

#[derive(Debug, Deserialize)]
struct MarketTradesQuery {
    market: Option<String>,
    #[serde(default = "default_market_trades_limit")]
    limit: usize,
}

fn default_market_trades_limit() -> usize {
    100
}

/// GET /api/markets/trades?market=&limit=
async fn market_trades(
    State(state): State<AppState>,
    Query(query): Query<MarketTradesQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    if !(1..=MAX_MARKET_TRADES).contains(&query.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_MARKET_TRADES
        )));
    }
    let trades = state
        .data
        .get_market_trades(query.market.as_deref(), query.limit)
        .await
        .map_err(upstream)?;
    Ok(Json(trades))
}

// ============================================================================
// Portfolio
// ============================================================================

/// GET /api/portfolio/summary
async fn portfolio_summary(State(state): State<AppState>) -> ApiResult<Json<PortfolioSummary>> {
    let backtests = BacktestRepository::new(state.db.pool()).all().await?;
    Ok(Json(portfolio::summarize(&backtests)))
}

/// GET /api/portfolio/equity-curve: newest curve of each strategy
async fn portfolio_equity_curve(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let latest = BacktestRepository::new(state.db.pool()).latest_curves().await?;
    Ok(Json(json!({ "curves": portfolio::decode_curves(latest) })))
}

// ============================================================================
// Traders
// ============================================================================

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    limit: usize,
}

fn default_leaderboard_limit() -> usize {
    20
}

/// GET /api/traders/leaderboard?limit=
async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<engine::Leaderboard>> {
    if !(1..=MAX_LEADERBOARD_LIMIT).contains(&query.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LEADERBOARD_LIMIT
        )));
    }
    let board = TraderAnalyzer::new(state.data.as_ref())
        .leaderboard(query.limit)
        .await?;
    Ok(Json(board))
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    #[serde(default)]
    addresses: String,
}

/// Split a comma-separated address list, dropping blanks
fn parse_addresses(raw: &str) -> ApiResult<Vec<String>> {
    let addresses: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if addresses.is_empty() {
        return Err(ApiError::BadRequest("No addresses provided".to_string()));
    }
    if addresses.len() > MAX_COMPARE_ADDRESSES {
        return Err(ApiError::BadRequest(format!(
            "Maximum {} addresses for comparison",
            MAX_COMPARE_ADDRESSES
        )));
    }
    Ok(addresses)
}

/// GET /api/traders/compare?addresses=a,b,c
async fn compare_traders(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<Value>> {
    let addresses = parse_addresses(&query.addresses)?;
    let traders = TraderAnalyzer::new(state.data.as_ref())
        .compare(&addresses)
        .await?;
    Ok(Json(json!({ "traders": traders })))
}

/// GET /api/traders/tracked?skip=&limit=
async fn list_tracked(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<TrackedTraderRecord>>> {
    let (skip, limit) = page.bounds();
    let rows = TrackedTraderRepository::new(state.db.pool())
        .list(skip, limit)
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct TrackBody {
    address: String,
    #[serde(default)]
    alias: String,
    #[serde(default)]
    notes: String,
}

/// POST /api/traders/tracked
async fn track_trader(
    State(state): State<AppState>,
    Json(body): Json<TrackBody>,
) -> ApiResult<(StatusCode, Json<TrackedTraderRecord>)> {
    let address = body.address.trim();
    if address.is_empty() {
        return Err(ApiError::BadRequest("address is required".to_string()));
    }
    let record = TrackedTraderRepository::new(state.db.pool())
        .track(address, &body.alias, &body.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /api/traders/tracked/:address
async fn untrack_trader(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<StatusCode> {
    TrackedTraderRepository::new(state.db.pool())
        .untrack(&address)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct FavoriteBody {
    is_favorite: bool,
}

/// PUT /api/traders/tracked/:address/favorite
async fn set_favorite(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(body): Json<FavoriteBody>,
) -> ApiResult<Json<TrackedTraderRecord>> {
    let record = TrackedTraderRepository::new(state.db.pool())
        .set_favorite(&address, body.is_favorite)
        .await?;
    Ok(Json(record))
}

/// POST /api/traders/tracked/:address/refresh — re-analyze and store the snapshot
async fn refresh_tracked(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<TrackedTraderRecord>> {
    let repo = TrackedTraderRepository::new(state.db.pool());
    repo.get(&address).await?;

    let analyzer = TraderAnalyzer::new(state.data.as_ref());
    let trades = analyzer.tape(&address).await;
    let reconciliation = reconcile(&trades);
    let profile = build_profile(&address, &trades, &reconciliation, 0);
    let classification = classify(&trades, &reconciliation);

    let snapshot = TraderSnapshot {
        total_trades: profile.total_trades as i64,
        total_pnl: profile.total_pnl,
        win_rate: profile.win_rate_pct,
        avg_position_size: profile.avg_position_size,
        detected_strategy: classification.primary_strategy.to_string(),
    };
    let record = repo.update_snapshot(&address, &snapshot).await?;
    info!(address = %record.address, strategy = %record.detected_strategy, "Tracked trader refreshed");
    Ok(Json(record))
}

/// GET /api/traders/:address/profile
async fn trader_profile(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<engine::TraderProfile> {
    Json(TraderAnalyzer::new(state.data.as_ref()).profile(&address).await)
}

#[derive(Debug, Deserialize)]
struct TradesQuery {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    50
}

/// GET /api/traders/:address/trades?page=&per_page=
async fn trader_trades(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<TradesQuery>,
) -> ApiResult<Json<Value>> {
    if query.page < 1 || !(1..=MAX_TRADES_PER_PAGE).contains(&query.per_page) {
        return Err(ApiError::BadRequest(format!(
            "page must be >= 1 and per_page between 1 and {}",
            MAX_TRADES_PER_PAGE
        )));
    }
    let offset = (query.page - 1) * query.per_page;
    let trades = TraderAnalyzer::new(state.data.as_ref())
        .trades(&address, query.per_page, offset)
        .await;
    Ok(Json(json!({
        "address": address.to_lowercase(),
        "total": trades.len(),
        "trades": trades,
        "page": query.page,
        "per_page": query.per_page,
    })))
}

/// GET /api/traders/:address/performance
async fn trader_performance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<engine::TraderPerformance> {
    Json(TraderAnalyzer::new(state.data.as_ref()).performance(&address).await)
}

/// GET /api/traders/:address/strategy
async fn trader_strategy(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<engine::StrategyReport> {
    Json(
        TraderAnalyzer::new(state.data.as_ref())
            .detect_strategy(&address)
            .await,
    )
}
