//! Performance statistics over an equity curve and a trade list

use crate::types::{round_to, Metrics, Pnl};

/// Profit factor reported when there are profits but no losses
pub const PROFIT_FACTOR_SENTINEL: f64 = 999.99;

/// Compute aggregate metrics.
///
/// `periods_per_year` annualizes the Sharpe ratio and depends on the bar
/// frequency of `equity_curve` (8760 for hourly backtests, 252 for daily
/// trader performance). Curves shorter than two points yield zeroed metrics.
pub fn calculate_metrics<T: Pnl>(
    equity_curve: &[f64],
    trades: &[T],
    initial_capital: f64,
    periods_per_year: f64,
) -> Metrics {
    if equity_curve.len() < 2 {
        return Metrics::default();
    }

    let final_equity = equity_curve[equity_curve.len() - 1];
    let total_pnl = final_equity - initial_capital;
    let roi_pct = if initial_capital > 0.0 {
        total_pnl / initial_capital * 100.0
    } else {
        0.0
    };

    let sharpe_ratio = sharpe(equity_curve, periods_per_year);
    let max_drawdown = max_drawdown(equity_curve);

    let total_trades = trades.len() as u32;
    let mut winning_trades = 0u32;
    let mut losing_trades = 0u32;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;

    let mut current_wins = 0u32;
    let mut current_losses = 0u32;
    let mut max_consecutive_wins = 0u32;
    let mut max_consecutive_losses = 0u32;

    for trade in trades {
        let pnl = trade.pnl();
        if pnl > 0.0 {
            winning_trades += 1;
            gross_profit += pnl;
            current_wins += 1;
            current_losses = 0;
            max_consecutive_wins = max_consecutive_wins.max(current_wins);
        } else if pnl < 0.0 {
            losing_trades += 1;
            gross_loss += pnl.abs();
            current_losses += 1;
            current_wins = 0;
            max_consecutive_losses = max_consecutive_losses.max(current_losses);
        } else {
            current_wins = 0;
            current_losses = 0;
        }
    }

    let win_rate_pct = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };
    let avg_win = if winning_trades > 0 {
        gross_profit / winning_trades as f64
    } else {
        0.0
    };
    let avg_loss = if losing_trades > 0 {
        -gross_loss / losing_trades as f64
    } else {
        0.0
    };

    let profit_factor = if gross_loss > 0.0 {
        round_to(gross_profit / gross_loss, 4)
    } else if gross_profit > 0.0 {
        PROFIT_FACTOR_SENTINEL
    } else {
        0.0
    };

    Metrics {
        total_pnl: round_to(total_pnl, 4),
        roi_pct: round_to(roi_pct, 2),
        sharpe_ratio: round_to(sharpe_ratio, 4),
        max_drawdown_pct: round_to(max_drawdown * 100.0, 2),
        win_rate_pct: round_to(win_rate_pct, 2),
        total_trades,
        winning_trades,
        losing_trades,
        avg_win: round_to(avg_win, 4),
        avg_loss: round_to(avg_loss, 4),
        profit_factor,
        max_consecutive_wins,
        max_consecutive_losses,
    }
}

/// Annualized Sharpe ratio of per-bar simple returns
fn sharpe(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len().saturating_sub(1).max(1)) as f64;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        mean / std_dev * periods_per_year.sqrt()
    } else {
        0.0
    }
}

/// Largest peak-to-trough decline as a fraction of the running peak
fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = equity_curve[0];
    let mut max_drawdown = 0.0;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        let drawdown = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }
    max_drawdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HOURLY_PERIODS_PER_YEAR;

    struct P(f64);

    impl Pnl for P {
        fn pnl(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_degenerate_curve_is_zeroed() {
        let metrics = calculate_metrics::<P>(&[1000.0], &[], 1000.0, 252.0);
        assert_eq!(metrics, Metrics::default());
        let metrics = calculate_metrics::<P>(&[], &[P(5.0)], 1000.0, 252.0);
        assert_eq!(metrics.total_trades, 0);
    }

    #[test]
    fn test_roi_and_drawdown() {
        let curve = [1000.0, 1100.0, 1000.0, 1210.0];
        let metrics = calculate_metrics::<P>(&curve, &[], 1000.0, HOURLY_PERIODS_PER_YEAR);
        assert_eq!(metrics.total_pnl, 210.0);
        assert_eq!(metrics.roi_pct, 21.0);
        assert_eq!(metrics.max_drawdown_pct, 9.09);
        assert!(metrics.sharpe_ratio > 0.0);
    }

    #[test]
    fn test_profit_factor_sentinel() {
        let trades = [P(60.0), P(40.0)];
        let metrics = calculate_metrics(&[1000.0, 1100.0], &trades, 1000.0, 252.0);
        assert_eq!(metrics.profit_factor, PROFIT_FACTOR_SENTINEL);
        assert!(metrics.profit_factor.is_finite());
        assert_eq!(metrics.win_rate_pct, 100.0);
        assert_eq!(metrics.avg_win, 50.0);
    }

    #[test]
    fn test_profit_factor_without_trades_is_zero() {
        let metrics = calculate_metrics::<P>(&[1000.0, 1000.0], &[], 1000.0, 252.0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_win_loss_stats_and_streaks() {
        let trades = [
            P(10.0),
            P(20.0),
            P(0.0),
            P(5.0),
            P(-4.0),
            P(-6.0),
            P(-2.0),
            P(3.0),
        ];
        let metrics = calculate_metrics(&[1000.0, 1026.0], &trades, 1000.0, 252.0);
        assert_eq!(metrics.total_trades, 8);
        assert_eq!(metrics.winning_trades, 4);
        assert_eq!(metrics.losing_trades, 3);
        assert_eq!(metrics.win_rate_pct, 50.0);
        assert_eq!(metrics.avg_win, 9.5);
        assert_eq!(metrics.avg_loss, -4.0);
        assert_eq!(metrics.profit_factor, round_to(38.0 / 12.0, 4));
        // zero-pnl trade breaks the first winning streak
        assert_eq!(metrics.max_consecutive_wins, 2);
        assert_eq!(metrics.max_consecutive_losses, 3);
    }

    #[test]
    fn test_zero_initial_capital() {
        let metrics = calculate_metrics::<P>(&[0.0, 10.0], &[], 0.0, 252.0);
        assert_eq!(metrics.roi_pct, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.max_drawdown_pct, 0.0);
    }
}
