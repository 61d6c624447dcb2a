//! Trade ledger: the authoritative book of open and closed trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ReplayError;
use super::trade::{ExitReason, Trade, TradeId, TradeSide};

/// Consistent read-only view of the ledger. Cloned out, never aliased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub open_trades: Vec<Trade>,
    /// In order of closure, oldest first.
    pub closed_trades: Vec<Trade>,
    pub cumulative_realized_pnl: f64,
}

/// Owns every simulated trade. Open trades keep placement order; closed
/// trades keep closure order.
#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    open: Vec<Trade>,
    closed: Vec<Trade>,
    cumulative_realized_pnl: f64,
    next_id: u64,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a ledger from a previously captured snapshot.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let next_id = snapshot
            .open_trades
            .iter()
            .chain(snapshot.closed_trades.iter())
            .map(|t| t.id.0 + 1)
            .max()
            .unwrap_or(0);
        Self {
            open: snapshot.open_trades,
            closed: snapshot.closed_trades,
            cumulative_realized_pnl: snapshot.cumulative_realized_pnl,
            next_id,
        }
    }

    pub fn open_trades(&self) -> &[Trade] {
        &self.open
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed
    }

    pub fn cumulative_realized_pnl(&self) -> f64 {
        self.cumulative_realized_pnl
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            open_trades: self.open.clone(),
            closed_trades: self.closed.clone(),
            cumulative_realized_pnl: self.cumulative_realized_pnl,
        }
    }

    /// Open a new trade. Validation failure leaves the ledger untouched.
    pub fn place_trade(
        &mut self,
        side: TradeSide,
        quantity: f64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<Trade, ReplayError> {
        if !(quantity > 0.0) || !quantity.is_finite() {
            return Err(ReplayError::Validation {
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }
        validate_brackets(side, entry_price, stop_loss, take_profit)?;

        let trade = Trade {
            id: TradeId(self.next_id),
            side,
            quantity,
            entry_price,
            entry_time,
            stop_loss,
            take_profit,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            realized_pnl: None,
        };
        self.next_id += 1;
        self.open.push(trade.clone());
        Ok(trade)
    }

    /// Close one open trade. The id must refer to a currently open trade:
    /// closing an already-closed id is `TradeNotFound`, not a silent no-op.
    pub fn close_trade(
        &mut self,
        id: TradeId,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Trade, ReplayError> {
        let index = self
            .open
            .iter()
            .position(|t| t.id == id)
            .ok_or(ReplayError::TradeNotFound { id })?;

        // Remove (not swap_remove): remaining opens keep their relative order.
        let mut trade = self.open.remove(index);
        let pnl = trade.pnl_at(exit_price);
        trade.exit_price = Some(exit_price);
        trade.exit_time = Some(exit_time);
        trade.exit_reason = Some(reason);
        trade.realized_pnl = Some(pnl);

        self.cumulative_realized_pnl += pnl;
        self.closed.push(trade.clone());
        Ok(trade)
    }

    /// Close every open trade at one price/time, in placement order. The
    /// cumulative total is updated by the aggregate delta in a single step.
    pub fn flatten_all(&mut self, exit_price: f64, exit_time: DateTime<Utc>) -> Vec<Trade> {
        let mut delta = 0.0;
        let mut flattened = Vec::with_capacity(self.open.len());

        for mut trade in self.open.drain(..) {
            let pnl = trade.pnl_at(exit_price);
            trade.exit_price = Some(exit_price);
            trade.exit_time = Some(exit_time);
            trade.exit_reason = Some(ExitReason::Flatten);
            trade.realized_pnl = Some(pnl);
            delta += pnl;
            flattened.push(trade);
        }

        self.closed.extend(flattened.iter().cloned());
        self.cumulative_realized_pnl += delta;
        flattened
    }

    /// Mark-to-market P&L of all open trades. Pure; does not mutate.
    pub fn unrealized_pnl(&self, mark_price: f64) -> f64 {
        self.open.iter().map(|t| t.unrealized_pnl(mark_price)).sum()
    }

    /// Clear both collections and zero the cumulative total. Used when
    /// selecting a new simulation start point.
    pub fn reset(&mut self) {
        self.open.clear();
        self.closed.clear();
        self.cumulative_realized_pnl = 0.0;
    }
}

fn validate_brackets(
    side: TradeSide,
    entry_price: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
) -> Result<(), ReplayError> {
    match side {
        TradeSide::Buy => {
            if let Some(stop) = stop_loss {
                if stop >= entry_price {
                    return Err(ReplayError::Validation {
                        reason: format!(
                            "buy stop-loss {stop} must be below entry price {entry_price}"
                        ),
                    });
                }
            }
            if let Some(target) = take_profit {
                if target <= entry_price {
                    return Err(ReplayError::Validation {
                        reason: format!(
                            "buy take-profit {target} must be above entry price {entry_price}"
                        ),
                    });
                }
            }
        }
        TradeSide::Sell => {
            if let Some(stop) = stop_loss {
                if stop <= entry_price {
                    return Err(ReplayError::Validation {
                        reason: format!(
                            "sell stop-loss {stop} must be above entry price {entry_price}"
                        ),
                    });
                }
            }
            if let Some(target) = take_profit {
                if target >= entry_price {
                    return Err(ReplayError::Validation {
                        reason: format!(
                            "sell take-profit {target} must be below entry price {entry_price}"
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}
