//! Error kinds surfaced by the engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Strategy code failed to compile or lacks a usable `signal` entry point
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Insufficient data points ({0}) for backtesting, need at least {1}")]
    InsufficientData(usize, usize),

    #[error("Invalid backtest configuration: {0}")]
    InvalidConfig(String),

    /// The market-data provider failed; callers surface this as "service unavailable"
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("Simulation failed: {0}")]
    Simulation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
