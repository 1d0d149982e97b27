//! Market-data sources consumed by the engine
//!
//! The simulator and the trader pipeline only see these traits; the
//! Polymarket HTTP clients implement them and are constructed once by the
//! caller and passed in.

pub mod polymarket;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tape::{json_f64, json_string};
use crate::types::PricePoint;

pub use polymarket::{ClobClient, GammaClient, PolymarketDataClient};

/// Historical prices of one market token
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Chronological price points; an empty history is not an error
    async fn prices_history(
        &self,
        token_id: &str,
        interval: &str,
        fidelity: u32,
    ) -> anyhow::Result<Vec<PricePoint>>;
}

/// Per-address trade tape, positions and the global leaderboard
#[async_trait]
pub trait TradeTapeSource: Send + Sync {
    /// One page of raw trade records, newest first as the provider returns them
    async fn trades_page(
        &self,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> anyhow::Result<Vec<Value>>;

    async fn positions(&self, address: &str) -> anyhow::Result<Vec<Value>>;

    async fn leaderboard(&self, limit: usize) -> anyhow::Result<Vec<LeaderboardEntry>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub address: String,
    pub display_name: Option<String>,
    pub pnl: f64,
    pub volume: f64,
}

impl LeaderboardEntry {
    /// Normalize one provider record; `position` is the 0-based list index
    pub fn from_record(position: usize, record: &Value) -> Self {
        let rank = record
            .get("rank")
            .and_then(json_f64)
            .filter(|r| *r >= 1.0)
            .map(|r| r as u32)
            .unwrap_or(position as u32 + 1);

        let address = ["proxyWallet", "address", "user", "userAddress"]
            .iter()
            .find_map(|k| record.get(*k).and_then(json_string))
            .unwrap_or_default()
            .to_lowercase();

        let display_name = ["userName", "displayName", "username", "name"]
            .iter()
            .find_map(|k| record.get(*k).and_then(json_string));

        let pnl = ["pnl", "profitLoss", "profit"]
            .iter()
            .find_map(|k| record.get(*k).and_then(json_f64))
            .unwrap_or(0.0);

        let volume = ["vol", "volume", "totalVolume"]
            .iter()
            .find_map(|k| record.get(*k).and_then(json_f64))
            .unwrap_or(0.0);

        Self {
            rank,
            address,
            display_name,
            pnl,
            volume,
        }
    }
}
