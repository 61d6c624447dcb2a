//! Indicator contract types.
//!
//! The engine consumes indicator values from a pluggable calculator
//! ([`crate::ports::indicator_port::IndicatorPort`]); it never computes or
//! validates the math itself. These types only describe what was requested
//! and carry the calculator's output alongside the bar series.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Indicator identity plus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        width: f64,
    },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({period})"),
            IndicatorType::Ema(period) => write!(f, "EMA({period})"),
            IndicatorType::Rsi(period) => write!(f, "RSI({period})"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({fast},{slow},{signal})")
            }
            IndicatorType::Bollinger { period, width } => {
                write!(f, "BB({period},{width})")
            }
        }
    }
}

/// One calculator output sample. Shape varies per indicator kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

/// A calculator's output, parallel to the bar series: `values[i]` belongs to
/// the bar at index `warm_up + i`. The series is shorter than the bars by
/// the calculator's warm-up length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub indicator: IndicatorType,
    pub warm_up: usize,
    pub values: Vec<IndicatorValue>,
}

impl IndicatorSeries {
    /// The value at a bar index, if the calculator has warmed up by then.
    pub fn at_bar(&self, bar_index: usize) -> Option<&IndicatorValue> {
        bar_index
            .checked_sub(self.warm_up)
            .and_then(|i| self.values.get(i))
    }
}
