//! Portfolio roll-ups over stored backtests

use engine::round_to;
use persistence::repository::{BacktestSummary, LatestCurve};
use serde::Serialize;
use tracing::warn;

/// Backtests listed under `recent_backtests`
const RECENT_BACKTESTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_backtests: usize,
    pub total_pnl: f64,
    pub avg_roi_pct: f64,
    pub avg_sharpe: f64,
    pub avg_win_rate: f64,
    pub best_strategy: Option<StrategyPick>,
    pub worst_strategy: Option<StrategyPick>,
    pub recent_backtests: Vec<RecentBacktest>,
}

/// The backtest behind a best/worst ROI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyPick {
    pub backtest_id: i64,
    pub strategy_id: i64,
    pub market: String,
    pub roi_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentBacktest {
    pub id: i64,
    pub strategy_id: i64,
    pub market_name: String,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub sharpe_ratio: f64,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyCurve {
    pub strategy_id: i64,
    pub market_name: String,
    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
}

impl From<&BacktestSummary> for StrategyPick {
    fn from(b: &BacktestSummary) -> Self {
        Self {
            backtest_id: b.id,
            strategy_id: b.strategy_id,
            market: b.market_name.clone(),
            roi_pct: b.roi_pct,
        }
    }
}

/// Aggregate `backtests`, which must be ordered newest first.
///
/// Ties for best or worst ROI go to the newer backtest.
pub fn summarize(backtests: &[BacktestSummary]) -> PortfolioSummary {
    let count = backtests.len();
    let mean = |total: f64| if count == 0 { 0.0 } else { total / count as f64 };

    let best = backtests
        .iter()
        .reduce(|best, b| if b.roi_pct > best.roi_pct { b } else { best });
    let worst = backtests
        .iter()
        .reduce(|worst, b| if b.roi_pct < worst.roi_pct { b } else { worst });

    PortfolioSummary {
        total_backtests: count,
        total_pnl: round_to(backtests.iter().map(|b| b.total_pnl).sum(), 2),
        avg_roi_pct: round_to(mean(backtests.iter().map(|b| b.roi_pct).sum()), 2),
        avg_sharpe: round_to(mean(backtests.iter().map(|b| b.sharpe_ratio).sum()), 4),
        avg_win_rate: round_to(mean(backtests.iter().map(|b| b.win_rate_pct).sum()), 2),
        best_strategy: best.map(StrategyPick::from),
        worst_strategy: worst.map(StrategyPick::from),
        recent_backtests: backtests
            .iter()
            .take(RECENT_BACKTESTS)
            .map(|b| RecentBacktest {
                id: b.id,
                strategy_id: b.strategy_id,
                market_name: b.market_name.clone(),
                total_pnl: b.total_pnl,
                roi_pct: b.roi_pct,
                sharpe_ratio: b.sharpe_ratio,
                created_at: b.created_at,
            })
            .collect(),
    }
}

/// Decode stored curves; a malformed column becomes an empty series
pub fn decode_curves(latest: Vec<LatestCurve>) -> Vec<StrategyCurve> {
    latest
        .into_iter()
        .map(|row| StrategyCurve {
            equity_curve: decode_series(&row.equity_curve, row.strategy_id),
            timestamps: decode_series(&row.timestamps, row.strategy_id),
            strategy_id: row.strategy_id,
            market_name: row.market_name,
        })
        .collect()
}

fn decode_series<T: serde::de::DeserializeOwned>(text: &str, strategy_id: i64) -> Vec<T> {
    serde_json::from_str(text).unwrap_or_else(|e| {
        warn!(strategy_id, error = %e, "Stored series is not valid JSON");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64, strategy_id: i64, pnl: f64, roi: f64, sharpe: f64, win: f64) -> BacktestSummary {
        BacktestSummary {
            id,
            strategy_id,
            token_id: "tok".to_string(),
            market_name: format!("market {}", id),
            total_pnl: pnl,
            roi_pct: roi,
            sharpe_ratio: sharpe,
            max_drawdown_pct: 0.0,
            win_rate_pct: win,
            total_trades: 4,
            created_at: Some(1_700_000_000 + id),
        }
    }

    #[test]
    fn test_empty_portfolio() {
        let s = summarize(&[]);
        assert_eq!(s.total_backtests, 0);
        assert_eq!(s.total_pnl, 0.0);
        assert_eq!(s.avg_roi_pct, 0.0);
        assert!(s.best_strategy.is_none());
        assert!(s.worst_strategy.is_none());
        assert!(s.recent_backtests.is_empty());
    }

    #[test]
    fn test_summary_aggregates() {
        let rows = vec![
            summary(3, 1, 10.004, 1.0, 0.5, 50.0),
            summary(2, 2, -5.0, -0.5, 0.25, 40.0),
            summary(1, 1, 20.0, 2.0, 0.3333, 75.0),
        ];
        let s = summarize(&rows);
        assert_eq!(s.total_backtests, 3);
        assert_eq!(s.total_pnl, 25.0);
        assert_eq!(s.avg_roi_pct, 0.83);
        assert_eq!(s.avg_sharpe, 0.3611);
        assert_eq!(s.avg_win_rate, 55.0);

        let best = s.best_strategy.unwrap();
        assert_eq!((best.backtest_id, best.strategy_id), (1, 1));
        assert_eq!(best.market, "market 1");
        assert_eq!(s.worst_strategy.unwrap().backtest_id, 2);
        assert_eq!(s.recent_backtests[0].id, 3);
    }

    #[test]
    fn test_roi_ties_keep_the_newest() {
        let rows = vec![summary(2, 1, 0.0, 1.0, 0.0, 0.0), summary(1, 1, 0.0, 1.0, 0.0, 0.0)];
        let s = summarize(&rows);
        assert_eq!(s.best_strategy.unwrap().backtest_id, 2);
        assert_eq!(s.worst_strategy.unwrap().backtest_id, 2);
    }

    #[test]
    fn test_recent_is_capped() {
        let rows: Vec<_> = (0..15).rev().map(|i| summary(i, 1, 1.0, 0.0, 0.0, 0.0)).collect();
        let s = summarize(&rows);
        assert_eq!(s.total_backtests, 15);
        assert_eq!(s.recent_backtests.len(), RECENT_BACKTESTS);
        assert_eq!(s.recent_backtests[0].id, 14);
    }

    #[test]
    fn test_decode_curves_tolerates_bad_json() {
        let rows = vec![
            LatestCurve {
                strategy_id: 1,
                market_name: "m".to_string(),
                equity_curve: "[1000.0,1010.5]".to_string(),
                timestamps: "[1,2]".to_string(),
            },
            LatestCurve {
                strategy_id: 2,
                market_name: String::new(),
                equity_curve: "not json".to_string(),
                timestamps: "[3]".to_string(),
            },
        ];
        let curves = decode_curves(rows);
        assert_eq!(curves[0].equity_curve, vec![1000.0, 1010.5]);
        assert_eq!(curves[0].timestamps, vec![1, 2]);
        assert!(curves[1].equity_curve.is_empty());
        assert_eq!(curves[1].timestamps, vec![3]);
    }
}
