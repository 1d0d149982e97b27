//! Built-in strategy templates

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Clone, Serialize)]
pub struct StrategyTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub code: &'static str,
    pub params: JsonValue,
}

const MOVING_AVERAGE_CROSSOVER: &str = r#"fn signal(prices, position, params) {
    let short_period = get(params, "short_period", 10);
    let long_period = get(params, "long_period", 30);

    if len(prices) < long_period {
        return 0;
    }

    let short_ma = sum(prices[-short_period:]) / short_period;
    let long_ma = sum(prices[-long_period:]) / long_period;

    let prev_short_ma = sum(prices[-short_period - 1:-1]) / short_period;
    let prev_long_ma = sum(prices[-long_period - 1:-1]) / long_period;

    # Bullish crossover
    if prev_short_ma <= prev_long_ma and short_ma > long_ma {
        return 1;
    }
    # Bearish crossover
    if prev_short_ma >= prev_long_ma and short_ma < long_ma {
        return -1;
    }
    return 0;
}
"#;

const MEAN_REVERSION: &str = r#"fn signal(prices, position, params) {
    let lookback = get(params, "lookback", 20);
    let threshold = get(params, "threshold", 0.05);

    if len(prices) < lookback {
        return 0;
    }

    let ma = sum(prices[-lookback:]) / lookback;
    let current = prices[-1];

    let deviation = 0;
    if ma > 0 {
        deviation = (current - ma) / ma;
    }

    if deviation < -threshold {
        return 1;
    }
    if deviation > threshold {
        return -1;
    }
    return 0;
}
"#;

const MOMENTUM_BREAKOUT: &str = r#"fn signal(prices, position, params) {
    let lookback = get(params, "lookback", 15);
    let breakout_pct = get(params, "breakout_pct", 0.03);

    if len(prices) < lookback + 1 {
        return 0;
    }

    let window = prices[-lookback - 1:-1];
    let high = max(window);
    let low = min(window);
    let current = prices[-1];

    if current > high * (1 + breakout_pct) {
        return 1;
    }
    if current < low * (1 - breakout_pct) {
        return -1;
    }
    return 0;
}
"#;

/// All templates, in display order
pub fn all() -> Vec<StrategyTemplate> {
    vec![
        StrategyTemplate {
            key: "moving_average_crossover",
            name: "Moving Average Crossover",
            description: "Generates buy/sell signals when a short-period moving average crosses above/below a long-period moving average.",
            code: MOVING_AVERAGE_CROSSOVER,
            params: json!({"short_period": 10, "long_period": 30}),
        },
        StrategyTemplate {
            key: "mean_reversion",
            name: "Mean Reversion",
            description: "Buys when price drops below the moving average by a threshold, sells when it rises above. Assumes prices revert to the mean.",
            code: MEAN_REVERSION,
            params: json!({"lookback": 20, "threshold": 0.05}),
        },
        StrategyTemplate {
            key: "momentum_breakout",
            name: "Momentum Breakout",
            description: "Buys on upward momentum when price breaks above recent high. Sells when it breaks below recent low.",
            code: MOMENTUM_BREAKOUT,
            params: json!({"lookback": 15, "breakout_pct": 0.03}),
        },
    ]
}

pub fn get(key: &str) -> Option<StrategyTemplate> {
    all().into_iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{compile, SignalSandbox};
    use crate::types::Signal;

    #[test]
    fn test_all_templates_compile() {
        for template in all() {
            assert!(
                compile(template.code).is_ok(),
                "template {} failed to compile",
                template.key
            );
        }
    }

    #[test]
    fn test_lookup_by_key() {
        assert!(get("mean_reversion").is_some());
        assert!(get("nope").is_none());
    }

    #[test]
    fn test_mean_reversion_signals() {
        let template = get("mean_reversion").unwrap();
        let strategy = compile(template.code).unwrap();
        let mut bound = strategy.bind(&template.params);

        let mut prices = vec![0.5; 19];
        // Not enough history yet
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Hold);

        prices.push(0.4);
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Buy);

        prices.pop();
        prices.push(0.6);
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Sell);
    }

    #[test]
    fn test_momentum_breakout_signals() {
        let template = get("momentum_breakout").unwrap();
        let strategy = compile(template.code).unwrap();
        let mut bound = strategy.bind(&template.params);

        let mut prices = vec![0.5; 15];
        prices.push(0.6);
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Buy);
        prices.pop();
        prices.push(0.4);
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Sell);
        prices.pop();
        prices.push(0.505);
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Hold);
    }

    #[test]
    fn test_moving_average_crossover_detects_cross() {
        let template = get("moving_average_crossover").unwrap();
        let strategy = compile(template.code).unwrap();
        let mut bound = strategy.bind(&template.params);

        // Flat history, then a jump lifts the short average above the long one
        let mut prices = vec![0.5; 40];
        prices.push(0.9);
        assert_eq!(bound.signal(&prices, 0.0).unwrap(), Signal::Buy);

        let mut falling = vec![0.5; 40];
        falling.push(0.1);
        assert_eq!(bound.signal(&falling, 0.0).unwrap(), Signal::Sell);
    }
}
