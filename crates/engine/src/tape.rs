//! Trade tape ingestion: pagination and record normalization
//!
//! Provider records carry the same information under several field names.
//! [`RawTrade::from_record`] is the only place that knows about them; the
//! reconciler and classifier work on the canonical [`RawTrade`] shape.

use chrono::DateTime;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::TradeTapeSource;
use crate::types::{RawTrade, TradeSide};

/// Largest page requested from the data API
pub const MAX_PAGE_SIZE: usize = 100;

const MARKET_FIELDS: [&str; 4] = ["market", "asset_id", "conditionId", "asset"];
const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "created_at", "time"];

/// Number or numeric string, finite values only
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Non-empty string, or a number rendered as a string
pub(crate) fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Epoch seconds from a number, numeric string or RFC 3339 string
fn json_timestamp(value: &Value) -> Option<i64> {
    if let Some(n) = json_f64(value) {
        return Some(n as i64);
    }
    let text = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp())
}

impl RawTrade {
    /// Normalize one provider record, substituting safe defaults for
    /// missing or malformed fields
    pub fn from_record(record: &Value) -> Self {
        let market_id = MARKET_FIELDS
            .iter()
            .find_map(|k| record.get(*k).and_then(json_string))
            .unwrap_or_else(|| "unknown".to_string());

        let side = match record.get("side").and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("buy") || s.eq_ignore_ascii_case("b") => {
                TradeSide::Buy
            }
            _ => TradeSide::Sell,
        };

        let price = record
            .get("price")
            .and_then(json_f64)
            .unwrap_or(0.0)
            .max(0.0);

        let size = ["size", "amount"]
            .iter()
            .find_map(|k| record.get(*k).and_then(json_f64))
            .unwrap_or(0.0)
            .max(0.0);

        let timestamp = TIMESTAMP_FIELDS
            .iter()
            .find_map(|k| record.get(*k).filter(|v| !v.is_null()))
            .and_then(json_timestamp)
            .unwrap_or(0);

        Self {
            market_id,
            side,
            price,
            size,
            timestamp,
        }
    }

    pub fn volume(&self) -> f64 {
        self.price * self.size
    }

    pub fn is_buy(&self) -> bool {
        self.side == TradeSide::Buy
    }
}

/// Normalize a whole tape, preserving order
pub fn normalize_tape(records: &[Value]) -> Vec<RawTrade> {
    records.iter().map(RawTrade::from_record).collect()
}

/// Fetch up to `limit` raw records for `address`, page by page.
///
/// At most `ceil(limit / page_size)` pages are requested. A failing page
/// ends pagination and the records already fetched are returned.
pub async fn fetch_tape<S: TradeTapeSource + ?Sized>(
    source: &S,
    address: &str,
    limit: usize,
    offset: usize,
) -> Vec<Value> {
    if limit == 0 {
        return Vec::new();
    }

    let address = address.to_lowercase();
    let page_size = limit.min(MAX_PAGE_SIZE);
    let max_pages = limit.div_ceil(page_size);

    let mut records: Vec<Value> = Vec::new();
    let mut current_offset = offset;

    for page in 0..max_pages {
        let batch = match source
            .trades_page(&address, page_size, current_offset)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    address = %address,
                    page,
                    fetched = records.len(),
                    error = %e,
                    "Trade page fetch failed, truncating tape"
                );
                break;
            }
        };

        let received = batch.len();
        debug!(address = %address, page, received, offset = current_offset, "Trade page");
        records.extend(batch);

        if received < page_size || records.len() >= limit {
            break;
        }
        current_offset += page_size;
    }

    records.truncate(limit);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LeaderboardEntry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_from_record_canonical_fields() {
        let trade = RawTrade::from_record(&json!({
            "market": "m1",
            "side": "BUY",
            "price": "0.42",
            "size": 10,
            "timestamp": 1_700_000_000
        }));
        assert_eq!(trade.market_id, "m1");
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.price, 0.42);
        assert_eq!(trade.size, 10.0);
        assert_eq!(trade.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_from_record_fallback_fields() {
        let trade = RawTrade::from_record(&json!({
            "asset_id": "a1",
            "side": "b",
            "price": 0.5,
            "amount": "3.5",
            "created_at": "2024-01-02T03:04:05Z"
        }));
        assert_eq!(trade.market_id, "a1");
        assert!(trade.is_buy());
        assert_eq!(trade.size, 3.5);
        assert_eq!(trade.timestamp, 1_704_164_645);

        let trade = RawTrade::from_record(&json!({"conditionId": "c1", "time": "1700000000"}));
        assert_eq!(trade.market_id, "c1");
        assert_eq!(trade.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_from_record_defaults() {
        let trade = RawTrade::from_record(&json!({"side": "sell", "price": "abc", "size": -4}));
        assert_eq!(trade.market_id, "unknown");
        assert_eq!(trade.side, TradeSide::Sell);
        assert_eq!(trade.price, 0.0);
        assert_eq!(trade.size, 0.0);
        assert_eq!(trade.timestamp, 0);

        // Unknown side strings are sells
        assert_eq!(RawTrade::from_record(&json!({"side": "bid"})).side, TradeSide::Sell);
    }

    struct PagedTape {
        records: Vec<Value>,
        fail_at_offset: Option<usize>,
        requests: Mutex<Vec<(String, usize, usize)>>,
    }

    impl PagedTape {
        fn new(count: usize, fail_at_offset: Option<usize>) -> Self {
            Self {
                records: (0..count).map(|i| json!({"id": i})).collect(),
                fail_at_offset,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(String, usize, usize)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TradeTapeSource for PagedTape {
        async fn trades_page(
            &self,
            address: &str,
            limit: usize,
            offset: usize,
        ) -> anyhow::Result<Vec<Value>> {
            self.requests
                .lock()
                .unwrap()
                .push((address.to_string(), limit, offset));
            if self.fail_at_offset == Some(offset) {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(self
                .records
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn positions(&self, _address: &str) -> anyhow::Result<Vec<Value>> {
            Ok(vec![])
        }

        async fn leaderboard(&self, _limit: usize) -> anyhow::Result<Vec<LeaderboardEntry>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_fetch_tape_pages_until_limit() {
        let source = PagedTape::new(1000, None);
        let tape = fetch_tape(&source, "0xABC", 250, 0).await;
        assert_eq!(tape.len(), 250);

        let requests = source.requests();
        // ceil(250 / 100) pages
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], ("0xabc".to_string(), 100, 0));
        assert_eq!(requests[2].2, 200);
        assert_eq!(tape[249]["id"], 249);
    }

    #[tokio::test]
    async fn test_fetch_tape_stops_on_short_page() {
        let source = PagedTape::new(130, None);
        let tape = fetch_tape(&source, "0xabc", 500, 0).await;
        assert_eq!(tape.len(), 130);
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_tape_small_limit_uses_small_pages() {
        let source = PagedTape::new(1000, None);
        let tape = fetch_tape(&source, "0xabc", 30, 60).await;
        assert_eq!(tape.len(), 30);
        assert_eq!(source.requests(), vec![("0xabc".to_string(), 30, 60)]);
        assert_eq!(tape[0]["id"], 60);
    }

    #[tokio::test]
    async fn test_fetch_tape_failure_truncates() {
        let source = PagedTape::new(1000, Some(200));
        let tape = fetch_tape(&source, "0xabc", 500, 0).await;
        assert_eq!(tape.len(), 200);
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_tape_empty() {
        let source = PagedTape::new(0, None);
        assert!(fetch_tape(&source, "0xabc", 100, 0).await.is_empty());
        assert!(fetch_tape(&source, "0xabc", 0, 0).await.is_empty());
    }
}
