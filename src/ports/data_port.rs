//! Bar data provider port trait.

use crate::domain::bar::Bar;
use crate::domain::error::ReplayError;
use chrono::{DateTime, Utc};

/// Supplies ordered, gap-tolerant bar history for a (symbol, timeframe,
/// range) tuple. Retry/backoff is the provider's problem; the engine treats
/// an empty result as terminal.
pub trait BarDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, ReplayError>;

    fn list_symbols(&self) -> Result<Vec<String>, ReplayError>;

    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, ReplayError>;
}
