//! Bar-by-bar backtesting engine

use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::api::PriceHistorySource;
use crate::error::{EngineError, EngineResult};
use crate::metrics::calculate_metrics;
use crate::sandbox::{self, SignalSandbox};
use crate::types::*;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1000.0;
pub const DEFAULT_FEE_RATE: f64 = 0.002;
pub const DEFAULT_INTERVAL: &str = "max";
pub const DEFAULT_FIDELITY: u32 = 60;

/// Stack of the simulation thread; strategy evaluation recurses on it
const SIMULATION_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Capital and fee settings of one simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub fee_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(EngineError::InvalidConfig(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        Ok(())
    }
}

/// A request to backtest one strategy against one market token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub token_id: String,
    pub code: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_fidelity")]
    pub fidelity: u32,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}
fn default_capital() -> f64 {
    DEFAULT_INITIAL_CAPITAL
}
fn default_fee_rate() -> f64 {
    DEFAULT_FEE_RATE
}
fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}
fn default_fidelity() -> u32 {
    DEFAULT_FIDELITY
}

impl BacktestRequest {
    pub fn new(token_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            code: code.into(),
            params: empty_params(),
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            fee_rate: DEFAULT_FEE_RATE,
            interval: default_interval(),
            fidelity: DEFAULT_FIDELITY,
        }
    }

    pub fn config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.initial_capital,
            fee_rate: self.fee_rate,
        }
    }

    pub fn strategy_hash(&self) -> String {
        strategy_hash(&self.code, &self.params)
    }
}

/// SHA-256 of the code followed by the params as canonical (key-sorted) JSON
pub fn strategy_hash(code: &str, params: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(params.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Complete output of a backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
    pub prices: Vec<f64>,
    pub trades: Vec<SimTrade>,
    pub metrics: Metrics,
    pub data_points: usize,
    pub duration_seconds: f64,
    pub initial_capital: f64,
    pub final_equity: f64,
}

/// Capital and position state during simulation
///
/// `position` is signed: positive shares are long, negative are short.
/// Opening a position consumes all capital and closing it returns the
/// proceeds, so capital and position are never both nonzero.
struct SimulationState {
    capital: f64,
    position: f64,
    entry_price: f64,
    fee_rate: f64,
    trades: Vec<SimTrade>,
}

impl SimulationState {
    fn new(config: &BacktestConfig) -> Self {
        Self {
            capital: config.initial_capital,
            position: 0.0,
            entry_price: 0.0,
            fee_rate: config.fee_rate,
            trades: Vec::new(),
        }
    }

    fn record(&mut self, kind: TradeKind, timestamp: i64, price: f64, size: f64, pnl: f64, fee: f64) {
        debug!(?kind, timestamp, price, size, pnl, fee, "Trade");
        self.trades.push(SimTrade {
            kind,
            timestamp,
            price,
            size: round_to(size, 4),
            pnl: round_to(pnl, 4),
            fee: round_to(fee, 4),
        });
    }

    fn close_long(&mut self, timestamp: i64, price: f64) {
        let size = self.position;
        let fee = size * price * self.fee_rate;
        let pnl = (price - self.entry_price) * size - fee;
        self.capital += size * price - fee;
        self.position = 0.0;
        self.record(TradeKind::CloseLong, timestamp, price, size, pnl, fee);
    }

    /// Settles the short at the symmetric mark `(2 * entry - price) * size`
    fn close_short(&mut self, timestamp: i64, price: f64) {
        let size = self.position.abs();
        let fee = size * price * self.fee_rate;
        let pnl = (self.entry_price - price) * size - fee;
        self.capital += (2.0 * self.entry_price - price) * size - fee;
        self.position = 0.0;
        self.record(TradeKind::CloseShort, timestamp, price, size, pnl, fee);
    }

    /// Open a position of either sign with all available capital, net of one fee
    fn open(&mut self, kind: TradeKind, timestamp: i64, price: f64) {
        if price <= 0.0 || self.capital <= 0.0 {
            debug!(price, capital = self.capital, "Skipping open: nothing to fund it");
            return;
        }
        let fee = self.capital * self.fee_rate;
        let shares = (self.capital - fee) / price;
        self.capital = 0.0;
        self.entry_price = price;
        self.position = match kind {
            TradeKind::SellShort => -shares,
            _ => shares,
        };
        self.record(kind, timestamp, price, shares, 0.0, fee);
    }

    fn apply(&mut self, signal: Signal, timestamp: i64, price: f64) {
        match signal {
            Signal::Buy if self.position <= 0.0 => {
                if self.position < 0.0 {
                    self.close_short(timestamp, price);
                }
                self.open(TradeKind::Buy, timestamp, price);
            }
            Signal::Sell if self.position >= 0.0 => {
                if self.position > 0.0 {
                    self.close_long(timestamp, price);
                }
                self.open(TradeKind::SellShort, timestamp, price);
            }
            _ => {}
        }
    }

    fn liquidate(&mut self, timestamp: i64, price: f64) {
        if self.position > 0.0 {
            self.close_long(timestamp, price);
        } else if self.position < 0.0 {
            self.close_short(timestamp, price);
        }
    }

    fn mark_to_market(&self, price: f64) -> f64 {
        if self.position > 0.0 {
            self.capital + self.position * price
        } else if self.position < 0.0 {
            self.capital + (2.0 * self.entry_price - price) * self.position.abs()
        } else {
            self.capital
        }
    }
}

/// Backtesting engine that simulates bar-by-bar execution
pub struct BacktestEngine;

impl BacktestEngine {
    /// Simulate `sandbox` over `history`.
    ///
    /// A sandbox failure on a single bar counts as HOLD for that bar.
    pub fn run<S: SignalSandbox + ?Sized>(
        config: &BacktestConfig,
        history: &[PricePoint],
        sandbox: &mut S,
    ) -> EngineResult<BacktestResult> {
        config.validate()?;
        if history.len() < MIN_PRICE_POINTS {
            return Err(EngineError::InsufficientData(history.len(), MIN_PRICE_POINTS));
        }

        let started = Instant::now();
        let timestamps: Vec<i64> = history.iter().map(|p| p.timestamp).collect();
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();

        info!(
            bars = prices.len(),
            capital = config.initial_capital,
            fee_rate = config.fee_rate,
            "Starting backtest"
        );

        let mut state = SimulationState::new(config);
        let mut equity_curve = Vec::with_capacity(prices.len());
        equity_curve.push(config.initial_capital);
        let mut signal_failures = 0usize;

        for i in 1..prices.len() {
            let price = prices[i];
            let signal = match sandbox.signal(&prices[..=i], state.position) {
                Ok(signal) => signal,
                Err(e) => {
                    signal_failures += 1;
                    debug!(bar = i, error = %e, "Signal evaluation failed, holding");
                    Signal::Hold
                }
            };

            state.apply(signal, timestamps[i], price);
            equity_curve.push(round_to(state.mark_to_market(price), 4));
        }

        let last = prices.len() - 1;
        state.liquidate(timestamps[last], prices[last]);
        equity_curve[last] = round_to(state.capital, 4);

        if signal_failures > 0 {
            warn!(
                failures = signal_failures,
                bars = prices.len() - 1,
                "Strategy failed on some bars; treated as HOLD"
            );
        }

        let metrics = calculate_metrics(
            &equity_curve,
            &state.trades,
            config.initial_capital,
            HOURLY_PERIODS_PER_YEAR,
        );
        let final_equity = equity_curve[last];

        info!(
            total_trades = metrics.total_trades,
            win_rate = metrics.win_rate_pct,
            total_pnl = metrics.total_pnl,
            max_drawdown_pct = metrics.max_drawdown_pct,
            "Backtest complete"
        );

        Ok(BacktestResult {
            data_points: prices.len(),
            duration_seconds: round_to(started.elapsed().as_secs_f64(), 2),
            initial_capital: config.initial_capital,
            final_equity,
            equity_curve,
            timestamps,
            prices,
            trades: state.trades,
            metrics,
        })
    }
}

/// Compile, fetch history, then simulate.
///
/// The strategy is compiled before any network access so that invalid
/// code fails fast without touching the data source.
pub async fn run_backtest<P: PriceHistorySource + ?Sized>(
    source: &P,
    request: &BacktestRequest,
) -> EngineResult<BacktestResult> {
    let config = request.config();
    config.validate()?;

    let strategy =
        sandbox::compile(&request.code).map_err(|e| EngineError::InvalidStrategy(e.to_string()))?;

    let history = source
        .prices_history(&request.token_id, &request.interval, request.fidelity)
        .await
        .map_err(|e| EngineError::UpstreamFetch(format!("{:#}", e)))?;

    info!(
        token_id = %request.token_id,
        points = history.len(),
        interval = %request.interval,
        fidelity = request.fidelity,
        "Fetched price history"
    );

    // The simulation is CPU-bound; keep it off the async workers
    let params = request.params.clone();
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name("backtest-sim".into())
        .stack_size(SIMULATION_STACK_SIZE)
        .spawn(move || {
            let mut bound = strategy.bind(&params);
            let _ = tx.send(BacktestEngine::run(&config, &history, &mut bound));
        })
        .map_err(|e| EngineError::Simulation(format!("failed to start simulation thread: {}", e)))?;

    rx.await
        .map_err(|_| EngineError::Simulation("simulation thread exited without a result".into()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_history(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                timestamp: 1_700_000_000 + (i as i64) * 3600,
                price,
            })
            .collect()
    }

    /// Emits a fixed signal on chosen bars, HOLD elsewhere
    fn scripted(script: Vec<(usize, Signal)>) -> impl FnMut(&[f64], f64) -> Result<Signal, SandboxError> {
        move |window: &[f64], _position: f64| {
            let bar = window.len() - 1;
            Ok(script
                .iter()
                .find(|(b, _)| *b == bar)
                .map(|(_, s)| *s)
                .unwrap_or(Signal::Hold))
        }
    }

    fn zero_fee() -> BacktestConfig {
        BacktestConfig {
            initial_capital: 1000.0,
            fee_rate: 0.0,
        }
    }

    #[test]
    fn test_insufficient_data() {
        let mut hold = scripted(vec![]);
        let err = BacktestEngine::run(&zero_fee(), &make_history(&[0.5; 9]), &mut hold).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(9, 10)));
    }

    #[test]
    fn test_invalid_config() {
        let mut hold = scripted(vec![]);
        let history = make_history(&[0.5; 10]);
        let bad_fee = BacktestConfig {
            initial_capital: 1000.0,
            fee_rate: 1.0,
        };
        assert!(matches!(
            BacktestEngine::run(&bad_fee, &history, &mut hold),
            Err(EngineError::InvalidConfig(_))
        ));
        let bad_capital = BacktestConfig {
            initial_capital: 0.0,
            fee_rate: 0.0,
        };
        assert!(matches!(
            BacktestEngine::run(&bad_capital, &history, &mut hold),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_always_hold_is_flat() {
        let history = make_history(&[0.5, 0.6, 0.4, 0.55, 0.7, 0.3, 0.5, 0.52, 0.48, 0.5, 0.51]);
        let mut hold = scripted(vec![]);
        let result = BacktestEngine::run(&BacktestConfig::default(), &history, &mut hold).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), history.len());
        assert!(result.equity_curve.iter().all(|&e| e == 1000.0));
        assert_eq!(result.final_equity, 1000.0);
        assert_eq!(result.metrics.total_pnl, 0.0);
    }

    #[test]
    fn test_long_round_trip_with_forced_close() {
        // Buy at 0.5 on bar 1, never sell: liquidated at 0.8 on the last bar
        let mut prices = vec![0.5; 9];
        prices.push(0.8);
        let history = make_history(&prices);
        let mut strategy = scripted(vec![(1, Signal::Buy)]);
        let result = BacktestEngine::run(&zero_fee(), &history, &mut strategy).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].kind, TradeKind::Buy);
        assert_eq!(result.trades[0].size, 2000.0);
        assert_eq!(result.trades[0].pnl, 0.0);
        assert_eq!(result.trades[1].kind, TradeKind::CloseLong);
        assert_eq!(result.trades[1].timestamp, history[9].timestamp);
        assert_eq!(result.trades[1].pnl, 600.0);

        assert_eq!(result.equity_curve.len(), 10);
        assert_eq!(result.equity_curve[0], 1000.0);
        assert_eq!(result.equity_curve[5], 1000.0);
        assert_eq!(result.final_equity, 1600.0);
        assert_eq!(*result.equity_curve.last().unwrap(), 1600.0);
        assert_eq!(result.metrics.roi_pct, 60.0);
    }

    #[test]
    fn test_short_settles_into_capital() {
        // Short at 0.5, price falls to 0.4, buy signal closes short and goes long
        let prices = vec![0.5, 0.5, 0.5, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4];
        let history = make_history(&prices);
        let mut strategy = scripted(vec![(1, Signal::Sell), (3, Signal::Buy)]);
        let result = BacktestEngine::run(&zero_fee(), &history, &mut strategy).unwrap();

        let kinds: Vec<TradeKind> = result.trades.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TradeKind::SellShort,
                TradeKind::CloseShort,
                TradeKind::Buy,
                TradeKind::CloseLong
            ]
        );
        // 2000 shares short from 0.5 to 0.4 realizes 200
        assert_eq!(result.trades[1].pnl, 200.0);
        // Short mark at bar 2 equals capital; at bar 3 the proceeds are reinvested
        assert_eq!(result.equity_curve[2], 1000.0);
        assert_eq!(result.equity_curve[3], 1200.0);
        assert_eq!(result.final_equity, 1200.0);
    }

    #[test]
    fn test_open_short_is_marked_to_market() {
        // Short at 0.5 and never cover: marked as 2 * entry - price, covered at 0.3 on the last bar
        let prices = vec![0.5, 0.5, 0.5, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.3];
        let history = make_history(&prices);
        let mut strategy = scripted(vec![(1, Signal::Sell)]);
        let result = BacktestEngine::run(&zero_fee(), &history, &mut strategy).unwrap();

        let kinds: Vec<TradeKind> = result.trades.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TradeKind::SellShort, TradeKind::CloseShort]);
        assert_eq!(result.trades[0].size, 2000.0);

        assert_eq!(result.equity_curve[1], 1000.0);
        assert_eq!(result.equity_curve[2], 1000.0);
        // (2 * 0.5 - 0.4) * 2000
        assert_eq!(result.equity_curve[3], 1200.0);
        assert_eq!(result.equity_curve[8], 1200.0);

        let cover = &result.trades[1];
        assert_eq!(cover.timestamp, history[9].timestamp);
        assert_eq!(cover.price, 0.3);
        assert_eq!(cover.pnl, 400.0);
        assert_eq!(result.final_equity, 1400.0);
        assert_eq!(result.equity_curve[9], 1400.0);
    }

    #[test]
    fn test_fees_are_charged_on_each_leg() {
        let prices = vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let history = make_history(&prices);
        let config = BacktestConfig {
            initial_capital: 1000.0,
            fee_rate: 0.01,
        };
        let mut strategy = scripted(vec![(1, Signal::Buy), (2, Signal::Sell)]);
        let result = BacktestEngine::run(&config, &history, &mut strategy).unwrap();

        // buy: fee 10, 990 shares; close_long: fee 9.9; sell_short on 980.1: fee 9.801
        assert_eq!(result.trades[0].fee, 10.0);
        assert_eq!(result.trades[0].size, 990.0);
        assert_eq!(result.trades[1].kind, TradeKind::CloseLong);
        assert_eq!(result.trades[1].fee, 9.9);
        assert_eq!(result.trades[1].pnl, -9.9);
        assert_eq!(result.trades[2].kind, TradeKind::SellShort);
        assert_eq!(result.trades[2].fee, 9.801);
        assert!(result.trades.iter().all(|t| t.size >= 0.0 && t.fee >= 0.0));
    }

    #[test]
    fn test_repeated_signal_does_not_pyramid() {
        let history = make_history(&[0.5; 12]);
        let mut always_buy = |_: &[f64], _: f64| Ok::<_, SandboxError>(Signal::Buy);
        let result = BacktestEngine::run(&zero_fee(), &history, &mut always_buy).unwrap();
        assert_eq!(result.trades.len(), 2);
    }

    #[test]
    fn test_signal_errors_degrade_to_hold() {
        let history = make_history(&[0.5; 10]);
        let calls = AtomicUsize::new(0);
        let mut flaky = |window: &[f64], _: f64| {
            calls.fetch_add(1, Ordering::SeqCst);
            if window.len() == 3 {
                Ok(Signal::Buy)
            } else {
                Err(SandboxError::Runtime {
                    line: 1,
                    message: "boom".into(),
                })
            }
        };
        let result = BacktestEngine::run(&zero_fee(), &history, &mut flaky).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 9);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].timestamp, history[2].timestamp);
    }

    #[test]
    fn test_determinism() {
        let prices: Vec<f64> = (0..50).map(|i| 0.5 + 0.1 * ((i as f64) / 3.0).sin()).collect();
        let history = make_history(&prices);
        let template = sandbox::templates::get("mean_reversion").unwrap();
        let strategy = sandbox::compile(template.code).unwrap();

        let first = BacktestEngine::run(&BacktestConfig::default(), &history, &mut strategy.bind(&template.params)).unwrap();
        let second = BacktestEngine::run(&BacktestConfig::default(), &history, &mut strategy.bind(&template.params)).unwrap();
        assert_eq!(first.trades, second.trades);
        assert_eq!(first.equity_curve, second.equity_curve);
        assert_eq!(first.final_equity, *first.equity_curve.last().unwrap());
    }

    struct MockHistory {
        points: Vec<PricePoint>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceHistorySource for MockHistory {
        async fn prices_history(
            &self,
            _token_id: &str,
            _interval: &str,
            _fidelity: u32,
        ) -> anyhow::Result<Vec<PricePoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.points.clone())
        }
    }

    fn mock(points: Vec<PricePoint>, fail: bool) -> MockHistory {
        MockHistory {
            points,
            fail,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_run_backtest_compiles_before_fetching() {
        let source = mock(make_history(&[0.5; 20]), false);
        let request = BacktestRequest::new("token", "fn signal(prices) { return 1; }");
        let err = run_backtest(&source, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidStrategy(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_backtest_upstream_failure() {
        let source = mock(vec![], true);
        let request = BacktestRequest::new("token", "fn signal(prices, position, params) { return 0; }");
        let err = run_backtest(&source, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::UpstreamFetch(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_run_backtest_empty_history() {
        let source = mock(vec![], false);
        let request = BacktestRequest::new("token", "fn signal(prices, position, params) { return 0; }");
        let err = run_backtest(&source, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(0, 10)));
    }

    #[tokio::test]
    async fn test_run_backtest_end_to_end() {
        let prices: Vec<f64> = (0..60).map(|i| 0.5 + 0.05 * ((i as f64) / 4.0).sin()).collect();
        let source = mock(make_history(&prices), false);
        let template = sandbox::templates::get("momentum_breakout").unwrap();
        let mut request = BacktestRequest::new("token", template.code);
        request.params = template.params.clone();

        let result = run_backtest(&source, &request).await.unwrap();
        assert_eq!(result.data_points, 60);
        assert_eq!(result.equity_curve.len(), 60);
        assert_eq!(result.timestamps.len(), 60);
        assert_eq!(result.initial_capital, DEFAULT_INITIAL_CAPITAL);
        assert_eq!(result.final_equity, *result.equity_curve.last().unwrap());
    }

    #[tokio::test]
    async fn test_run_backtest_survives_deep_recursion() {
        let code = r#"
fn deep(n) {
    if n <= 0 {
        return 0;
    }
    return deep(n - 1) + 0;
}
fn signal(prices, position, params) {
    return deep(100000);
}"#;
        let source = mock(make_history(&[0.5; 12]), false);
        let result = run_backtest(&source, &BacktestRequest::new("token", code))
            .await
            .unwrap();
        assert!(result.trades.is_empty());
        assert!(result.equity_curve.iter().all(|&e| e == DEFAULT_INITIAL_CAPITAL));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_run_backtest_does_not_block_the_runtime() {
        // A busy strategy on a single-threaded runtime; the ticker still gets polled
        let code = "fn signal(prices, position, params) { let i = 0; while i < 20000 { i += 1; } return 0; }";
        let source = mock(make_history(&[0.5; 40]), false);
        let request = BacktestRequest::new("token", code);

        let ticks = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = tokio::spawn(async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });

        let result = run_backtest(&source, &request).await.unwrap();
        ticker.abort();
        assert_eq!(result.data_points, 40);
        assert!(ticks.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: BacktestRequest =
            serde_json::from_value(serde_json::json!({"token_id": "t", "code": "x"})).unwrap();
        assert_eq!(request.initial_capital, 1000.0);
        assert_eq!(request.fee_rate, 0.002);
        assert_eq!(request.interval, "max");
        assert_eq!(request.fidelity, 60);
        assert!(request.params.is_object());
    }

    #[test]
    fn test_strategy_hash_is_stable_over_key_order() {
        let a = serde_json::json!({"lookback": 20, "threshold": 0.05});
        let b: serde_json::Value =
            serde_json::from_str(r#"{"threshold": 0.05, "lookback": 20}"#).unwrap();
        assert_eq!(strategy_hash("code", &a), strategy_hash("code", &b));
        assert_eq!(strategy_hash("code", &a).len(), 64);
        assert_ne!(strategy_hash("code", &a), strategy_hash("code2", &a));
    }
}
