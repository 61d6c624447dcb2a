//! Simulated trade records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger-assigned trade identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// +1 for Buy, -1 for Sell; the sign of price exposure.
    pub fn direction(&self) -> f64 {
        match self {
            TradeSide::Buy => 1.0,
            TradeSide::Sell => -1.0,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// How a trade left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Flatten,
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::Flatten => write!(f, "flatten"),
            ExitReason::Manual => write!(f, "manual"),
        }
    }
}

/// A simulated trade. Open until the exit fields are populated, then
/// immutable. Owned exclusively by the ledger; callers get clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub side: TradeSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub realized_pnl: Option<f64>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_price.is_none()
    }

    /// Mark-to-market P&L at a given price. Zero once closed.
    pub fn unrealized_pnl(&self, mark_price: f64) -> f64 {
        if !self.is_open() {
            return 0.0;
        }
        self.side.direction() * (mark_price - self.entry_price) * self.quantity
    }

    /// Signed P&L for an exit at the given price.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        self.side.direction() * (exit_price - self.entry_price) * self.quantity
    }
}
