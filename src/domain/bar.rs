//! OHLC bar and the validated bar series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ReplayError;

/// One OHLC price sample for a fixed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Immutable ordered sequence of bars for one symbol/timeframe.
///
/// Ordering is the provider's responsibility, but construction re-checks it:
/// times must be strictly increasing, with no duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, ReplayError> {
        for pair in bars.windows(2) {
            if pair[1].time <= pair[0].time {
                return Err(ReplayError::Validation {
                    reason: format!(
                        "bar times must be strictly increasing: {} followed by {}",
                        pair[0].time, pair[1].time
                    ),
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Index of the final bar, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(1)
    }

    /// The bars visible at a given cursor: everything up to and including it.
    /// Pure function of the cursor and the series.
    pub fn visible(&self, cursor: usize) -> &[Bar] {
        let end = (cursor + 1).min(self.bars.len());
        &self.bars[..end]
    }
}
