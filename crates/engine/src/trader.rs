//! Trader analytics: profile, performance, style detection and comparison
//!
//! Everything is computed from the address's trade tape fetched through an
//! injected [`TradeTapeSource`]. A failing or empty tape never errors; it
//! yields the empty shapes below. Only the leaderboard propagates upstream
//! failures.

use std::collections::{BTreeMap, HashMap};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{LeaderboardEntry, TradeTapeSource};
use crate::classifier::{classify, Classification, StrategyLabel};
use crate::error::{EngineError, EngineResult};
use crate::metrics::calculate_metrics;
use crate::reconcile::{reconcile, Reconciliation};
use crate::tape::{fetch_tape, normalize_tape};
use crate::types::{round_to, Metrics, RawTrade, TRADING_DAYS_PER_YEAR};

/// Records fetched per analysis
pub const TAPE_LIMIT: usize = 1000;
pub const MAX_COMPARE_ADDRESSES: usize = 10;
/// Starting value of the normalized trader equity curve
pub const NORMALIZED_EQUITY: f64 = 1000.0;
const TOP_MARKETS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBreakdown {
    pub market_id: String,
    pub trades: u32,
    pub volume: f64,
    pub buys: u32,
    pub sells: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderProfile {
    pub address: String,
    pub total_trades: u32,
    pub total_volume: f64,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub avg_position_size: f64,
    pub unique_markets: u32,
    pub first_trade: Option<i64>,
    pub last_trade: Option<i64>,
    pub active_positions: u32,
    pub markets_breakdown: Vec<MarketBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub month: String,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPerformance {
    pub market_id: String,
    pub trades: u32,
    pub pnl: f64,
    pub wins: u32,
    pub losses: u32,
    /// PnL per round trip, as a percentage
    pub roi_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderPerformance {
    pub address: String,
    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
    pub cumulative_pnl: Vec<f64>,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub market_performance: Vec<MarketPerformance>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub address: String,
    #[serde(flatten)]
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderComparison {
    pub address: String,
    pub total_trades: u32,
    pub total_volume: f64,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub avg_position_size: f64,
    pub unique_markets: u32,
    pub active_positions: u32,
    pub primary_strategy: StrategyLabel,
    pub strategy_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    pub total: usize,
}

/// Profile headline numbers from a normalized tape
pub fn build_profile(
    address: &str,
    trades: &[RawTrade],
    reconciliation: &Reconciliation,
    active_positions: u32,
) -> TraderProfile {
    let mut breakdown: Vec<MarketBreakdown> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut total_volume = 0.0;

    for trade in trades {
        let volume = trade.volume();
        total_volume += volume;

        let slot = *index.entry(trade.market_id.as_str()).or_insert_with(|| {
            breakdown.push(MarketBreakdown {
                market_id: trade.market_id.clone(),
                trades: 0,
                volume: 0.0,
                buys: 0,
                sells: 0,
            });
            breakdown.len() - 1
        });
        let market = &mut breakdown[slot];
        market.trades += 1;
        market.volume += volume;
        if trade.is_buy() {
            market.buys += 1;
        } else {
            market.sells += 1;
        }
    }

    let unique_markets = breakdown.len() as u32;
    breakdown.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    breakdown.truncate(TOP_MARKETS);
    for market in &mut breakdown {
        market.volume = round_to(market.volume, 4);
    }

    let total_pnl = reconciliation.total_pnl;
    let invested = if total_volume > 0.0 { total_volume / 2.0 } else { 1.0 };
    let avg_position_size = if trades.is_empty() {
        0.0
    } else {
        total_volume / trades.len() as f64
    };

    let dated = trades.iter().map(|t| t.timestamp).filter(|ts| *ts > 0);

    TraderProfile {
        address: address.to_lowercase(),
        total_trades: trades.len() as u32,
        total_volume: round_to(total_volume, 2),
        total_pnl: round_to(total_pnl, 2),
        roi_pct: round_to(total_pnl / invested * 100.0, 2),
        win_rate_pct: round_to(reconciliation.win_rate_pct, 2),
        avg_position_size: round_to(avg_position_size, 2),
        unique_markets,
        first_trade: dated.clone().min(),
        last_trade: dated.max(),
        active_positions,
        markets_breakdown: breakdown,
    }
}

/// Normalized equity curve and per-period breakdowns from round trips
pub fn build_performance(address: &str, reconciliation: &Reconciliation) -> TraderPerformance {
    let round_trips = &reconciliation.round_trips;

    let mut equity = NORMALIZED_EQUITY;
    let mut running = 0.0;
    let mut equity_curve = vec![equity];
    let mut cumulative_pnl = vec![0.0];
    let mut timestamps = vec![0];
    let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
    let mut markets: Vec<MarketPerformance> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rt in round_trips {
        equity += rt.pnl;
        running += rt.pnl;
        equity_curve.push(round_to(equity, 4));
        cumulative_pnl.push(round_to(running, 4));
        timestamps.push(rt.close_time);

        let month = DateTime::from_timestamp(rt.close_time, 0)
            .filter(|_| rt.close_time > 0)
            .map(|dt| dt.format("%Y-%m").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        *monthly.entry(month).or_default() += rt.pnl;

        let slot = *index.entry(rt.market_id.as_str()).or_insert_with(|| {
            markets.push(MarketPerformance {
                market_id: rt.market_id.clone(),
                trades: 0,
                pnl: 0.0,
                wins: 0,
                losses: 0,
                roi_pct: 0.0,
            });
            markets.len() - 1
        });
        let market = &mut markets[slot];
        market.trades += 1;
        market.pnl += rt.pnl;
        if rt.pnl > 0.0 {
            market.wins += 1;
        } else if rt.pnl < 0.0 {
            market.losses += 1;
        }
    }

    for market in &mut markets {
        market.roi_pct = round_to(market.pnl / market.trades.max(1) as f64 * 100.0, 2);
        market.pnl = round_to(market.pnl, 2);
    }
    markets.sort_by(|a, b| b.pnl.total_cmp(&a.pnl));
    markets.truncate(TOP_MARKETS);

    let metrics = calculate_metrics(
        &equity_curve,
        round_trips,
        NORMALIZED_EQUITY,
        TRADING_DAYS_PER_YEAR,
    );

    TraderPerformance {
        address: address.to_lowercase(),
        equity_curve,
        timestamps,
        cumulative_pnl,
        monthly_returns: monthly
            .into_iter()
            .map(|(month, pnl)| MonthlyReturn {
                month,
                pnl: round_to(pnl, 2),
            })
            .collect(),
        market_performance: markets,
        metrics,
    }
}

impl TraderPerformance {
    /// Shape returned for an address with no trades
    pub fn empty(address: &str) -> Self {
        Self {
            address: address.to_lowercase(),
            equity_curve: Vec::new(),
            timestamps: Vec::new(),
            cumulative_pnl: Vec::new(),
            monthly_returns: Vec::new(),
            market_performance: Vec::new(),
            metrics: Metrics::default(),
        }
    }
}

/// Trader analytics over an injected tape source
pub struct TraderAnalyzer<'a, S: TradeTapeSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: TradeTapeSource + ?Sized> TraderAnalyzer<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Fetch and normalize the tape of `address`
    pub async fn tape(&self, address: &str) -> Vec<RawTrade> {
        normalize_tape(&fetch_tape(self.source, address, TAPE_LIMIT, 0).await)
    }

    /// One page of raw trade records, unnormalized, for display
    pub async fn trades(&self, address: &str, limit: usize, offset: usize) -> Vec<Value> {
        fetch_tape(self.source, address, limit, offset).await
    }

    async fn active_positions(&self, address: &str) -> u32 {
        match self.source.positions(&address.to_lowercase()).await {
            Ok(positions) => positions.len() as u32,
            Err(e) => {
                warn!(address, error = %e, "Positions fetch failed, reporting none");
                0
            }
        }
    }

    pub async fn profile(&self, address: &str) -> TraderProfile {
        let trades = self.tape(address).await;
        let positions = self.active_positions(address).await;
        let reconciliation = reconcile(&trades);
        let profile = build_profile(address, &trades, &reconciliation, positions);
        info!(
            address = %profile.address,
            trades = profile.total_trades,
            pnl = profile.total_pnl,
            "Trader profile built"
        );
        profile
    }

    pub async fn performance(&self, address: &str) -> TraderPerformance {
        let trades = self.tape(address).await;
        if trades.is_empty() {
            return TraderPerformance::empty(address);
        }
        let reconciliation = reconcile(&trades);
        let performance = build_performance(address, &reconciliation);
        info!(
            address = %performance.address,
            round_trips = reconciliation.round_trips.len(),
            sharpe = performance.metrics.sharpe_ratio,
            "Trader performance computed"
        );
        performance
    }

    pub async fn detect_strategy(&self, address: &str) -> StrategyReport {
        let trades = self.tape(address).await;
        let classification = classify(&trades, &reconcile(&trades));
        info!(
            address,
            strategy = %classification.primary_strategy,
            confidence = classification.confidence,
            "Trader strategy detected"
        );
        StrategyReport {
            address: address.to_lowercase(),
            classification,
        }
    }

    /// Side-by-side headline numbers; one tape fetch per address
    pub async fn compare(&self, addresses: &[String]) -> EngineResult<Vec<TraderComparison>> {
        if addresses.is_empty() || addresses.len() > MAX_COMPARE_ADDRESSES {
            return Err(EngineError::InvalidConfig(format!(
                "compare accepts 1 to {} addresses, got {}",
                MAX_COMPARE_ADDRESSES,
                addresses.len()
            )));
        }

        let mut results = Vec::with_capacity(addresses.len());
        for address in addresses {
            let trades = self.tape(address).await;
            let positions = self.active_positions(address).await;
            let reconciliation = reconcile(&trades);
            let profile = build_profile(address, &trades, &reconciliation, positions);
            let classification = classify(&trades, &reconciliation);
            results.push(TraderComparison {
                address: profile.address,
                total_trades: profile.total_trades,
                total_volume: profile.total_volume,
                total_pnl: profile.total_pnl,
                roi_pct: profile.roi_pct,
                win_rate_pct: profile.win_rate_pct,
                avg_position_size: profile.avg_position_size,
                unique_markets: profile.unique_markets,
                active_positions: profile.active_positions,
                primary_strategy: classification.primary_strategy,
                strategy_confidence: classification.confidence,
            });
        }
        Ok(results)
    }

    pub async fn leaderboard(&self, limit: usize) -> EngineResult<Leaderboard> {
        let entries = self
            .source
            .leaderboard(limit)
            .await
            .map_err(|e| EngineError::UpstreamFetch(format!("{:#}", e)))?;
        Ok(Leaderboard {
            total: entries.len(),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::INSUFFICIENT_DATA_SUMMARY;
    use crate::types::TradeSide;
    use async_trait::async_trait;
    use serde_json::json;

    struct MockTape {
        records: Vec<Value>,
        positions: Option<usize>,
        leaderboard_ok: bool,
    }

    impl MockTape {
        fn new(records: Vec<Value>) -> Self {
            Self {
                records,
                positions: Some(2),
                leaderboard_ok: true,
            }
        }
    }

    #[async_trait]
    impl TradeTapeSource for MockTape {
        async fn trades_page(
            &self,
            _address: &str,
            limit: usize,
            offset: usize,
        ) -> anyhow::Result<Vec<Value>> {
            Ok(self.records.iter().skip(offset).take(limit).cloned().collect())
        }

        async fn positions(&self, _address: &str) -> anyhow::Result<Vec<Value>> {
            match self.positions {
                Some(n) => Ok(vec![json!({}); n]),
                None => anyhow::bail!("positions unavailable"),
            }
        }

        async fn leaderboard(&self, limit: usize) -> anyhow::Result<Vec<LeaderboardEntry>> {
            if !self.leaderboard_ok {
                anyhow::bail!("Polymarket leaderboard error 502 Bad Gateway");
            }
            Ok((0..limit)
                .map(|i| LeaderboardEntry::from_record(i, &json!({"proxyWallet": format!("0x{}", i)})))
                .collect())
        }
    }

    fn record(market: &str, side: &str, price: f64, size: f64, ts: i64) -> Value {
        json!({"market": market, "side": side, "price": price, "size": size, "timestamp": ts})
    }

    // Jan 2024 and Feb 2024 closes
    fn sample_tape() -> Vec<Value> {
        vec![
            record("a", "BUY", 0.40, 100.0, 1_704_067_200),
            record("a", "SELL", 0.50, 100.0, 1_704_153_600),
            record("b", "BUY", 0.60, 50.0, 1_704_240_000),
            record("b", "SELL", 0.50, 50.0, 1_706_745_600),
            record("b", "BUY", 0.30, 10.0, 1_706_832_000),
        ]
    }

    #[tokio::test]
    async fn test_profile() {
        let source = MockTape::new(sample_tape());
        let profile = TraderAnalyzer::new(&source).profile("0xABC").await;

        assert_eq!(profile.address, "0xabc");
        assert_eq!(profile.total_trades, 5);
        // 40 + 50 + 30 + 25 + 3
        assert_eq!(profile.total_volume, 148.0);
        // +10 on a, -5 on b
        assert_eq!(profile.total_pnl, 5.0);
        assert_eq!(profile.win_rate_pct, 50.0);
        assert_eq!(profile.roi_pct, round_to(5.0 / 74.0 * 100.0, 2));
        assert_eq!(profile.unique_markets, 2);
        assert_eq!(profile.active_positions, 2);
        assert_eq!(profile.first_trade, Some(1_704_067_200));
        assert_eq!(profile.last_trade, Some(1_706_832_000));

        let top = &profile.markets_breakdown[0];
        assert_eq!(top.market_id, "a");
        assert_eq!((top.trades, top.buys, top.sells), (2, 1, 1));
        assert_eq!(profile.markets_breakdown[1].buys, 2);
    }

    #[tokio::test]
    async fn test_profile_empty_tape_and_missing_positions() {
        let mut source = MockTape::new(vec![]);
        source.positions = None;
        let profile = TraderAnalyzer::new(&source).profile("0xabc").await;
        assert_eq!(profile.total_trades, 0);
        assert_eq!(profile.roi_pct, 0.0);
        assert_eq!(profile.active_positions, 0);
        assert!(profile.first_trade.is_none());
        assert!(profile.markets_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_performance() {
        let source = MockTape::new(sample_tape());
        let perf = TraderAnalyzer::new(&source).performance("0xabc").await;

        assert_eq!(perf.equity_curve, vec![1000.0, 1010.0, 1005.0]);
        assert_eq!(perf.cumulative_pnl, vec![0.0, 10.0, 5.0]);
        assert_eq!(perf.timestamps, vec![0, 1_704_153_600, 1_706_745_600]);
        assert_eq!(
            perf.monthly_returns,
            vec![
                MonthlyReturn { month: "2024-01".into(), pnl: 10.0 },
                MonthlyReturn { month: "2024-02".into(), pnl: -5.0 },
            ]
        );
        assert_eq!(perf.market_performance[0].market_id, "a");
        assert_eq!(perf.market_performance[0].roi_pct, 1000.0);
        assert_eq!(perf.market_performance[1].losses, 1);
        assert_eq!(perf.metrics.total_trades, 2);
        assert_eq!(perf.metrics.total_pnl, 5.0);
        assert_eq!(perf.metrics.roi_pct, 0.5);
    }

    #[test]
    fn test_performance_unknown_month() {
        let trades = vec![
            RawTrade {
                market_id: "m".into(),
                side: TradeSide::Buy,
                price: 0.5,
                size: 2.0,
                timestamp: 0,
            },
            RawTrade {
                market_id: "m".into(),
                side: TradeSide::Sell,
                price: 0.6,
                size: 2.0,
                timestamp: 0,
            },
        ];
        let perf = build_performance("0xabc", &reconcile(&trades));
        assert_eq!(perf.monthly_returns[0].month, "unknown");
    }

    #[tokio::test]
    async fn test_performance_empty_tape() {
        let source = MockTape::new(vec![]);
        let perf = TraderAnalyzer::new(&source).performance("0xabc").await;
        assert_eq!(perf, TraderPerformance::empty("0xabc"));
    }

    #[tokio::test]
    async fn test_detect_strategy_empty_tape() {
        let source = MockTape::new(vec![]);
        let report = TraderAnalyzer::new(&source).detect_strategy("0xAbC").await;
        assert_eq!(report.address, "0xabc");
        assert_eq!(report.classification.primary_strategy, StrategyLabel::Unknown);
        assert_eq!(report.classification.summary, INSUFFICIENT_DATA_SUMMARY);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["primary_strategy"], "unknown");
        assert_eq!(json["confidence"], 0.0);
    }

    #[tokio::test]
    async fn test_compare_bounds() {
        let source = MockTape::new(sample_tape());
        let analyzer = TraderAnalyzer::new(&source);

        let err = analyzer.compare(&[]).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));

        let many: Vec<String> = (0..11).map(|i| format!("0x{}", i)).collect();
        assert!(analyzer.compare(&many).await.is_err());

        let rows = analyzer
            .compare(&["0xA".to_string(), "0xB".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, "0xa");
        assert_eq!(rows[0].total_pnl, 5.0);
        assert_ne!(rows[0].primary_strategy, StrategyLabel::Unknown);
    }

    #[tokio::test]
    async fn test_leaderboard() {
        let mut source = MockTape::new(vec![]);
        let board = TraderAnalyzer::new(&source).leaderboard(3).await.unwrap();
        assert_eq!(board.total, 3);
        assert_eq!(board.entries[2].rank, 3);

        source.leaderboard_ok = false;
        let err = TraderAnalyzer::new(&source).leaderboard(3).await.unwrap_err();
        assert!(matches!(err, EngineError::UpstreamFetch(msg) if msg.contains("502")));
    }
}
