//! Types shared by the simulator, the metrics engine and the trader pipeline

use serde::{Deserialize, Serialize};

/// Minimum number of price points required for a backtest
pub const MIN_PRICE_POINTS: usize = 10;

/// Annualization constant for hourly bars (strategy backtests)
pub const HOURLY_PERIODS_PER_YEAR: f64 = 8760.0;

/// Annualization constant for the trader-performance path
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// A single point of a market's price history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "p")]
    pub price: f64,
}

/// Discrete decision produced by a strategy for one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Sell,
    Hold,
    Buy,
}

impl Signal {
    pub fn as_i8(&self) -> i8 {
        match self {
            Self::Sell => -1,
            Self::Hold => 0,
            Self::Buy => 1,
        }
    }

    /// Any value outside {-1, 0, 1} collapses to Hold
    pub fn from_number(n: f64) -> Self {
        if n == 1.0 {
            Self::Buy
        } else if n == -1.0 {
            Self::Sell
        } else {
            Self::Hold
        }
    }
}

/// Kind of a simulated trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Buy,
    SellShort,
    CloseLong,
    CloseShort,
}

/// A trade emitted by the backtest simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTrade {
    #[serde(rename = "type")]
    pub kind: TradeKind,
    pub timestamp: i64,
    pub price: f64,
    pub size: f64,
    pub pnl: f64,
    pub fee: f64,
}

/// Side of a trade on a raw tape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One normalized record of an address's trade tape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub market_id: String,
    pub side: TradeSide,
    pub price: f64,
    pub size: f64,
    /// Epoch seconds, 0 when the record carried no usable timestamp
    pub timestamp: i64,
}

/// A matched buy/sell pair produced by the reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub market_id: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub open_time: i64,
    pub close_time: i64,
    pub duration_seconds: i64,
}

/// Aggregate performance statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
}

/// Anything carrying a realized PnL that the metrics engine can score
pub trait Pnl {
    fn pnl(&self) -> f64;
}

impl Pnl for SimTrade {
    fn pnl(&self) -> f64 {
        self.pnl
    }
}

impl Pnl for RoundTrip {
    fn pnl(&self) -> f64 {
        self.pnl
    }
}

/// Round to a fixed number of decimals for recorded values
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
