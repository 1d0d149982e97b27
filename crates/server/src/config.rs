//! Runtime configuration from the environment (and `.env`, loaded in `main`)

use std::str::FromStr;

use engine::api::polymarket::{DEFAULT_CLOB_API_BASE, DEFAULT_DATA_API_BASE, DEFAULT_GAMMA_API_BASE};
use engine::engine::{DEFAULT_FEE_RATE, DEFAULT_INITIAL_CAPITAL};
use tracing::warn;

pub const DEFAULT_DB_PATH: &str = "data/polystrat.db";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: String,
    pub clob_api_base: String,
    pub gamma_api_base: String,
    pub data_api_base: String,
    pub default_initial_capital: f64,
    pub backtest_fee_rate: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            clob_api_base: DEFAULT_CLOB_API_BASE.to_string(),
            gamma_api_base: DEFAULT_GAMMA_API_BASE.to_string(),
            data_api_base: DEFAULT_DATA_API_BASE.to_string(),
            default_initial_capital: DEFAULT_INITIAL_CAPITAL,
            backtest_fee_rate: DEFAULT_FEE_RATE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing or unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            db_path: string("POLYSTRAT_DB_PATH", defaults.db_path),
            clob_api_base: string("CLOB_API_BASE", defaults.clob_api_base),
            gamma_api_base: string("GAMMA_API_BASE", defaults.gamma_api_base),
            data_api_base: string("DATA_API_BASE", defaults.data_api_base),
            default_initial_capital: parsed(
                &lookup,
                "DEFAULT_INITIAL_CAPITAL",
                defaults.default_initial_capital,
            ),
            backtest_fee_rate: parsed(&lookup, "BACKTEST_FEE_RATE", defaults.backtest_fee_rate),
        }
    }
}

fn parsed<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable setting");
            default
        }),
    }
}
