//! FIFO reconciliation of a raw trade tape into round trips

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{round_to, RawTrade, RoundTrip};

/// Remaining size at or below this is treated as fully consumed
pub const SIZE_EPSILON: f64 = 1e-4;

/// Round trips of one tape plus their aggregate PnL and win rate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub round_trips: Vec<RoundTrip>,
    pub total_pnl: f64,
    pub win_rate_pct: f64,
}

/// A queued trade and how much of it is still unmatched
struct Lot<'a> {
    trade: &'a RawTrade,
    remaining: f64,
}

impl<'a> Lot<'a> {
    fn new(trade: &'a RawTrade) -> Self {
        Self {
            trade,
            remaining: trade.size,
        }
    }
}

/// Match buys against sells per market, oldest first.
///
/// The input is never mutated; unmatched remainders are open positions and
/// simply produce no round trip.
pub fn reconcile(trades: &[RawTrade]) -> Reconciliation {
    let mut round_trips = Vec::new();
    for (market_id, mut market_trades) in group_by_market(trades) {
        market_trades.sort_by_key(|t| t.timestamp);
        match_market(market_id, &market_trades, &mut round_trips);
    }

    round_trips.sort_by_key(|rt| rt.close_time);

    let total = round_trips.len();
    let wins = round_trips.iter().filter(|rt| rt.pnl > 0.0).count();
    let total_pnl: f64 = round_trips.iter().map(|rt| rt.pnl).sum();
    let win_rate_pct = if total > 0 {
        wins as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    Reconciliation {
        round_trips,
        total_pnl: round_to(total_pnl, 4),
        win_rate_pct: round_to(win_rate_pct, 2),
    }
}

/// Markets in first-seen order, each with its trades in tape order
fn group_by_market(trades: &[RawTrade]) -> Vec<(&str, Vec<&RawTrade>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&RawTrade>)> = Vec::new();
    for trade in trades {
        let slot = *index.entry(trade.market_id.as_str()).or_insert_with(|| {
            groups.push((trade.market_id.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(trade);
    }
    groups
}

fn match_market(market_id: &str, trades: &[&RawTrade], out: &mut Vec<RoundTrip>) {
    let (buys, sells): (Vec<&RawTrade>, Vec<&RawTrade>) =
        trades.iter().copied().partition(|t| t.is_buy());
    let mut buys: Vec<Lot> = buys.into_iter().map(Lot::new).collect();
    let mut sells: Vec<Lot> = sells.into_iter().map(Lot::new).collect();

    let (mut bi, mut si) = (0, 0);
    while bi < buys.len() && si < sells.len() {
        let buy = &mut buys[bi];
        let sell = &mut sells[si];
        let matched = buy.remaining.min(sell.remaining);

        if matched > 0.0 {
            out.push(round_trip(market_id, buy.trade, sell.trade, matched));
            buy.remaining -= matched;
            sell.remaining -= matched;
        }

        // A non-positive match means at least one side is already empty
        if buy.remaining <= SIZE_EPSILON {
            bi += 1;
        }
        if sell.remaining <= SIZE_EPSILON {
            si += 1;
        }
    }
}

fn round_trip(market_id: &str, buy: &RawTrade, sell: &RawTrade, size: f64) -> RoundTrip {
    let duration_seconds = if buy.timestamp > 0 && sell.timestamp > 0 {
        (sell.timestamp - buy.timestamp).abs()
    } else {
        0
    };
    RoundTrip {
        market_id: market_id.to_string(),
        buy_price: buy.price,
        sell_price: sell.price,
        size,
        pnl: round_to((sell.price - buy.price) * size, 4),
        open_time: buy.timestamp,
        close_time: sell.timestamp,
        duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeSide;

    fn trade(market: &str, side: TradeSide, price: f64, size: f64, ts: i64) -> RawTrade {
        RawTrade {
            market_id: market.to_string(),
            side,
            price,
            size,
            timestamp: ts,
        }
    }

    #[test]
    fn test_single_round_trip() {
        let tape = vec![
            trade("m", TradeSide::Buy, 1.0, 10.0, 100),
            trade("m", TradeSide::Sell, 1.5, 10.0, 400),
        ];
        let result = reconcile(&tape);
        assert_eq!(result.round_trips.len(), 1);
        let rt = &result.round_trips[0];
        assert_eq!(rt.pnl, 5.0);
        assert_eq!(rt.size, 10.0);
        assert_eq!(rt.duration_seconds, 300);
        assert_eq!(result.total_pnl, 5.0);
        assert_eq!(result.win_rate_pct, 100.0);
    }

    #[test]
    fn test_fifo_partial_fills() {
        let tape = vec![
            trade("m", TradeSide::Buy, 1.0, 5.0, 1),
            trade("m", TradeSide::Buy, 2.0, 5.0, 2),
            trade("m", TradeSide::Sell, 3.0, 10.0, 3),
        ];
        let trips = reconcile(&tape).round_trips;
        assert_eq!(trips.len(), 2);
        assert_eq!((trips[0].buy_price, trips[0].size, trips[0].pnl), (1.0, 5.0, 10.0));
        assert_eq!((trips[1].buy_price, trips[1].size, trips[1].pnl), (2.0, 5.0, 5.0));
    }

    #[test]
    fn test_unsorted_tape_is_matched_chronologically() {
        // Provider tapes arrive newest first
        let tape = vec![
            trade("m", TradeSide::Sell, 0.8, 4.0, 30),
            trade("m", TradeSide::Buy, 0.6, 4.0, 20),
            trade("m", TradeSide::Buy, 0.4, 4.0, 10),
        ];
        let trips = reconcile(&tape).round_trips;
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].buy_price, 0.4);
        assert_eq!(trips[0].open_time, 10);
    }

    #[test]
    fn test_open_remainder_and_other_markets() {
        let tape = vec![
            trade("a", TradeSide::Buy, 0.5, 10.0, 1),
            trade("b", TradeSide::Buy, 0.2, 1.0, 2),
            trade("a", TradeSide::Sell, 0.4, 4.0, 5),
            trade("b", TradeSide::Sell, 0.3, 1.0, 3),
        ];
        let result = reconcile(&tape);
        // sorted by close time across markets
        let markets: Vec<&str> = result.round_trips.iter().map(|r| r.market_id.as_str()).collect();
        assert_eq!(markets, vec!["b", "a"]);
        assert_eq!(result.round_trips[1].size, 4.0);
        assert_eq!(result.round_trips[1].pnl, -0.4);
        assert_eq!(result.total_pnl, round_to(0.1 - 0.4, 4));
        assert_eq!(result.win_rate_pct, 50.0);
    }

    #[test]
    fn test_zero_size_entries_are_skipped() {
        let tape = vec![
            trade("m", TradeSide::Buy, 0.5, 0.0, 1),
            trade("m", TradeSide::Buy, 0.5, 2.0, 2),
            trade("m", TradeSide::Sell, 0.7, 2.0, 3),
        ];
        let trips = reconcile(&tape).round_trips;
        // the empty buy must not consume the sell
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].size, 2.0);
        assert_eq!(trips[0].pnl, 0.4);
    }

    #[test]
    fn test_missing_timestamps_give_zero_duration() {
        let tape = vec![
            trade("m", TradeSide::Buy, 0.5, 1.0, 0),
            trade("m", TradeSide::Sell, 0.6, 1.0, 1_700_000_000),
        ];
        assert_eq!(reconcile(&tape).round_trips[0].duration_seconds, 0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let tape = vec![
            trade("x", TradeSide::Sell, 0.9, 3.0, 9),
            trade("x", TradeSide::Buy, 0.1, 2.0, 1),
            trade("y", TradeSide::Buy, 0.3, 7.0, 4),
            trade("x", TradeSide::Buy, 0.2, 2.0, 2),
            trade("y", TradeSide::Sell, 0.25, 7.0, 8),
        ];
        let snapshot = tape.clone();
        let first = reconcile(&tape);
        let second = reconcile(&tape);
        assert_eq!(first, second);
        assert_eq!(tape, snapshot);
    }

    #[test]
    fn test_empty_tape() {
        assert_eq!(reconcile(&[]), Reconciliation::default());
    }
}
