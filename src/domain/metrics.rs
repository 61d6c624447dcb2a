//! Summary statistics over closed trades.

use super::trade::Trade;

/// Aggregate trade statistics for presentation.
///
/// `profit_factor` is `f64::INFINITY` when there are profits but no losses
/// yet, and `0.0` when there are no trades at all: one representation,
/// everywhere. `biggest_loss` is a positive magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_pnl: f64,
    pub biggest_win: f64,
    pub biggest_loss: f64,
}

impl Summary {
    pub fn compute(closed_trades: &[Trade]) -> Self {
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut biggest_win = 0.0_f64;
        let mut biggest_loss = 0.0_f64;

        for trade in closed_trades {
            let pnl = trade.realized_pnl.unwrap_or(0.0);
            if pnl > 0.0 {
                trades_won += 1;
                gross_profit += pnl;
                // Strict comparison: ties resolve to the first occurrence.
                if pnl > biggest_win {
                    biggest_win = pnl;
                }
            } else if pnl < 0.0 {
                trades_lost += 1;
                gross_loss += pnl.abs();
                if pnl.abs() > biggest_loss {
                    biggest_loss = pnl.abs();
                }
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = trades_won + trades_lost + trades_breakeven;
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Summary {
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            gross_profit,
            gross_loss,
            total_pnl: gross_profit - gross_loss,
            biggest_win,
            biggest_loss,
        }
    }
}
