//! Repository implementations for database operations

pub mod backtests;
pub mod strategies;
pub mod traders;

pub use backtests::*;
pub use strategies::*;
pub use traders::*;
