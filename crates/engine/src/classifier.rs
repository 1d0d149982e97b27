//! Trading-style classification of an address from its tape and round trips
//!
//! Every hypothesis gets a score from fixed weights over a handful of tape
//! features. The highest score wins; on a tie the hypothesis declared first
//! in [`StrategyLabel::CANDIDATES`] is kept, so results are reproducible.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::reconcile::Reconciliation;
use crate::types::{round_to, RawTrade};

/// Relative price move a trade must follow or fade to count as directional
const DIRECTIONAL_THRESHOLD: f64 = 0.01;

const HOUR: f64 = 3600.0;
const DAY: f64 = 86_400.0;
const WEEK: f64 = 604_800.0;

const MARKET_MAKING_MIN_TRADES: usize = 50;
const MARKET_MAKING_MAX_MARKETS: usize = 5;
const EVENT_DRIVEN_CONCENTRATION: f64 = 0.5;
const GATED_SCORE: f64 = 0.3;
const CONFIDENCE_BONUS: f64 = 0.2;

const CATEGORY_FOCUS_LEN: usize = 5;
const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub const INSUFFICIENT_DATA_SUMMARY: &str = "Insufficient trade data for analysis.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyLabel {
    Momentum,
    MeanReversion,
    TrendFollowing,
    MarketMaking,
    EventDriven,
    Unknown,
}

impl StrategyLabel {
    /// Scored hypotheses in tie-break order
    pub const CANDIDATES: [StrategyLabel; 5] = [
        Self::Momentum,
        Self::MeanReversion,
        Self::TrendFollowing,
        Self::MarketMaking,
        Self::EventDriven,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Momentum => "momentum",
            Self::MeanReversion => "mean_reversion",
            Self::TrendFollowing => "trend_following",
            Self::MarketMaking => "market_making",
            Self::EventDriven => "event_driven",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingStyle {
    Scalper,
    DayTrader,
    SwingTrader,
    PositionTrader,
}

impl HoldingStyle {
    pub fn from_seconds(avg_holding: f64) -> Self {
        if avg_holding < HOUR {
            Self::Scalper
        } else if avg_holding < DAY {
            Self::DayTrader
        } else if avg_holding < WEEK {
            Self::SwingTrader
        } else {
            Self::PositionTrader
        }
    }

    fn is_short_term(&self) -> bool {
        matches!(self, Self::Scalper | Self::DayTrader)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingStyle {
    Fixed,
    ModerateVariation,
    HighlyVariable,
}

impl SizingStyle {
    pub fn from_cv(cv: f64) -> Self {
        if cv < 0.3 {
            Self::Fixed
        } else if cv < 0.7 {
            Self::ModerateVariation
        } else {
            Self::HighlyVariable
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::ModerateVariation => "moderate variation",
            Self::HighlyVariable => "highly variable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patterns {
    pub momentum_score: f64,
    pub mean_reversion_score: f64,
    pub holding_style: HoldingStyle,
    pub market_concentration: f64,
    pub trend_following_signals: u32,
    pub contrarian_signals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFocus {
    pub market_id: String,
    pub trade_count: u32,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    pub day: String,
    pub trades: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub peak_hour_utc: u32,
    pub peak_day: String,
    pub hour_distribution: BTreeMap<u32, u32>,
    pub day_distribution: Vec<DayCount>,
    pub avg_holding_seconds: f64,
    pub avg_holding_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub avg_size: f64,
    pub max_size: f64,
    pub min_size: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub strategy: SizingStyle,
}

/// Classifier output; the feature sections are absent for an empty tape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub primary_strategy: StrategyLabel,
    pub confidence: f64,
    pub patterns: Option<Patterns>,
    pub category_focus: Vec<MarketFocus>,
    pub timing_analysis: Option<TimingAnalysis>,
    pub position_sizing: Option<PositionSizing>,
    pub summary: String,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            primary_strategy: StrategyLabel::Unknown,
            confidence: 0.0,
            patterns: None,
            category_focus: Vec::new(),
            timing_analysis: None,
            position_sizing: None,
            summary: INSUFFICIENT_DATA_SUMMARY.to_string(),
        }
    }
}

/// Human-readable duration: seconds, minutes, hours or days
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.0}s", seconds)
    } else if seconds < HOUR {
        format!("{:.1}m", seconds / 60.0)
    } else if seconds < DAY {
        format!("{:.1}h", seconds / HOUR)
    } else {
        format!("{:.1}d", seconds / DAY)
    }
}

/// Follow/fade counts over consecutive trades in tape order
struct Directional {
    trend_following: u32,
    contrarian: u32,
}

impl Directional {
    fn measure(trades: &[RawTrade]) -> Self {
        let mut result = Self {
            trend_following: 0,
            contrarian: 0,
        };
        for pair in trades.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if prev.price <= 0.0 || curr.price <= 0.0 {
                continue;
            }
            let change = (curr.price - prev.price) / prev.price;
            let buy = curr.is_buy();
            if (change > DIRECTIONAL_THRESHOLD && buy) || (change < -DIRECTIONAL_THRESHOLD && !buy) {
                result.trend_following += 1;
            } else if change.abs() > DIRECTIONAL_THRESHOLD {
                result.contrarian += 1;
            }
        }
        result
    }

    /// (momentum, mean reversion) fractions of the classified pairs
    fn scores(&self) -> (f64, f64) {
        let total = self.trend_following + self.contrarian;
        if total == 0 {
            return (0.0, 0.0);
        }
        (
            self.trend_following as f64 / total as f64,
            self.contrarian as f64 / total as f64,
        )
    }
}

fn position_sizing(trades: &[RawTrade]) -> PositionSizing {
    let sizes: Vec<f64> = trades.iter().map(|t| t.size).filter(|s| *s > 0.0).collect();
    let (avg, max, min) = if sizes.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            sizes.iter().sum::<f64>() / sizes.len() as f64,
            sizes.iter().copied().fold(f64::MIN, f64::max),
            sizes.iter().copied().fold(f64::MAX, f64::min),
        )
    };
    let std_dev = if sizes.len() > 1 {
        let var = sizes.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / (sizes.len() - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };
    let cv = if avg > 0.0 { std_dev / avg } else { 0.0 };

    PositionSizing {
        avg_size: round_to(avg, 4),
        max_size: round_to(max, 4),
        min_size: round_to(min, 4),
        std_dev: round_to(std_dev, 4),
        coefficient_of_variation: round_to(cv, 3),
        strategy: SizingStyle::from_cv(cv),
    }
}

fn timing(trades: &[RawTrade], avg_holding: f64) -> TimingAnalysis {
    let mut hours: BTreeMap<u32, u32> = BTreeMap::new();
    let mut days = [0u32; 7];
    for trade in trades.iter().filter(|t| t.timestamp > 0) {
        if let Some(dt) = DateTime::from_timestamp(trade.timestamp, 0) {
            *hours.entry(dt.hour()).or_default() += 1;
            days[dt.weekday().num_days_from_monday() as usize] += 1;
        }
    }

    // earliest hour / weekday wins a tie
    let peak_hour = hours
        .iter()
        .fold(None::<(u32, u32)>, |best, (&h, &n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((h, n)),
        })
        .map(|(h, _)| h)
        .unwrap_or(0);
    let peak_day = (0..7).fold(0usize, |best, d| if days[d] > days[best] { d } else { best });

    TimingAnalysis {
        peak_hour_utc: peak_hour,
        peak_day: DAY_NAMES[peak_day].to_string(),
        hour_distribution: hours,
        day_distribution: DAY_NAMES
            .iter()
            .zip(days)
            .filter(|(_, n)| *n > 0)
            .map(|(day, trades)| DayCount {
                day: day.to_string(),
                trades,
            })
            .collect(),
        avg_holding_seconds: avg_holding.round(),
        avg_holding_human: format_duration(avg_holding),
    }
}

/// Trade counts per market, most traded first; ties keep first-seen order
fn market_counts(trades: &[RawTrade]) -> Vec<(&str, u32)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, u32)> = Vec::new();
    for trade in trades {
        let slot = *index.entry(trade.market_id.as_str()).or_insert_with(|| {
            counts.push((trade.market_id.as_str(), 0));
            counts.len() - 1
        });
        counts[slot].1 += 1;
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Highest score, first candidate on a tie
fn select(scores: &[(StrategyLabel, f64)]) -> (StrategyLabel, f64) {
    scores
        .iter()
        .copied()
        .fold((StrategyLabel::Unknown, f64::NEG_INFINITY), |best, (label, score)| {
            if score > best.1 {
                (label, score)
            } else {
                best
            }
        })
}

/// Classify an address from its normalized tape and reconciliation
pub fn classify(trades: &[RawTrade], reconciliation: &Reconciliation) -> Classification {
    if trades.is_empty() {
        return Classification::unknown();
    }

    let directional = Directional::measure(trades);
    let (momentum, mean_reversion) = directional.scores();

    let sizing = position_sizing(trades);

    let durations: Vec<f64> = reconciliation
        .round_trips
        .iter()
        .filter(|rt| rt.duration_seconds > 0)
        .map(|rt| rt.duration_seconds as f64)
        .collect();
    let avg_holding = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };
    let holding = HoldingStyle::from_seconds(avg_holding);

    let counts = market_counts(trades);
    let total = trades.len() as f64;
    let concentration = counts.first().map(|(_, n)| *n as f64 / total).unwrap_or(0.0);

    let category_focus = counts
        .iter()
        .take(CATEGORY_FOCUS_LEN)
        .map(|(market, n)| MarketFocus {
            market_id: market.to_string(),
            trade_count: *n,
            pct: round_to(*n as f64 / total * 100.0, 1),
        })
        .collect();

    let market_making_gate = trades.len() >= MARKET_MAKING_MIN_TRADES
        && counts.len() < MARKET_MAKING_MAX_MARKETS
        && sizing.strategy == SizingStyle::Fixed;

    let scores: Vec<(StrategyLabel, f64)> = StrategyLabel::CANDIDATES
        .iter()
        .map(|&label| {
            let score = match label {
                StrategyLabel::Momentum => {
                    0.4 * momentum + if holding.is_short_term() { 0.2 } else { 0.0 }
                }
                StrategyLabel::MeanReversion => {
                    0.4 * mean_reversion
                        + if sizing.strategy == SizingStyle::Fixed { 0.1 } else { 0.0 }
                }
                StrategyLabel::TrendFollowing => {
                    0.3 * momentum + if holding.is_short_term() { 0.0 } else { 0.2 }
                }
                StrategyLabel::MarketMaking if market_making_gate => GATED_SCORE,
                StrategyLabel::EventDriven if concentration > EVENT_DRIVEN_CONCENTRATION => {
                    GATED_SCORE
                }
                _ => 0.0,
            };
            (label, score)
        })
        .collect();

    let (primary, score) = select(&scores);
    let confidence = (score + CONFIDENCE_BONUS).min(1.0);

    let summary = [
        format!("Primarily a {} trader", primary.as_str().replace('_', " ")),
        format!("({:.0}% confidence).", confidence * 100.0),
        format!("Trades across {} markets", counts.len()),
        format!("with a {:.1}% win rate.", reconciliation.win_rate_pct),
        format!("Average holding: {}.", format_duration(avg_holding)),
        format!("Position sizing: {}.", sizing.strategy.describe()),
        format!("Net PnL: ${:.2}.", reconciliation.total_pnl),
    ]
    .join(" ");

    Classification {
        primary_strategy: primary,
        confidence: round_to(confidence, 3),
        patterns: Some(Patterns {
            momentum_score: round_to(momentum, 3),
            mean_reversion_score: round_to(mean_reversion, 3),
            holding_style: holding,
            market_concentration: round_to(concentration, 3),
            trend_following_signals: directional.trend_following,
            contrarian_signals: directional.contrarian,
        }),
        category_focus,
        timing_analysis: Some(timing(trades, avg_holding)),
        position_sizing: Some(sizing),
        summary,
    }
}
