//! Polystrat Engine — strategy backtesting and trader analytics
//!
//! Provides:
//! - A sandboxed strategy language with resource limits and built-in templates
//! - Bar-by-bar backtest simulator with long/short positions and fees
//! - Performance metrics (Sharpe, drawdown, profit factor, streaks)
//! - FIFO trade reconciliation and trading-style classification
//! - Polymarket CLOB, Gamma and Data API clients behind injectable traits

pub mod api;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod sandbox;
pub mod tape;
pub mod trader;
pub mod types;

// Re-exports for convenience
pub use api::{
    ClobClient, GammaClient, LeaderboardEntry, PolymarketDataClient, PriceHistorySource,
    TradeTapeSource,
};
pub use classifier::{classify, Classification, StrategyLabel};
pub use engine::{
    run_backtest, strategy_hash, BacktestConfig, BacktestEngine, BacktestRequest, BacktestResult,
};
pub use error::{EngineError, EngineResult};
pub use metrics::calculate_metrics;
pub use reconcile::{reconcile, Reconciliation};
pub use sandbox::{compile, CompiledStrategy, SandboxError, SandboxLimits, SignalSandbox};
pub use tape::{fetch_tape, normalize_tape};
pub use trader::{
    Leaderboard, StrategyReport, TraderAnalyzer, TraderComparison, TraderPerformance,
    TraderProfile,
};
pub use types::*;
