//! Stop-loss / take-profit exit detection against a single bar.

use super::bar::Bar;
use super::trade::{ExitReason, Trade, TradeId, TradeSide};

/// One detected exit: which trade, at what price, and why.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub trade_id: TradeId,
    pub exit_price: f64,
    pub reason: ExitReason,
}

/// Evaluate every open trade against one bar's high/low.
///
/// Bars carry no intrabar path, so both levels are tested against the same
/// bar extremes. When a bar gaps through both, the stop-loss wins: the
/// worse-case fill.
///
/// A trade with neither level set never auto-exits.
pub fn detect_exits(open_trades: &[Trade], bar: &Bar) -> Vec<ExitSignal> {
    open_trades
        .iter()
        .filter_map(|trade| {
            let (stop_hit, target_hit) = match trade.side {
                TradeSide::Buy => (
                    trade.stop_loss.filter(|&stop| bar.low <= stop),
                    trade.take_profit.filter(|&target| bar.high >= target),
                ),
                TradeSide::Sell => (
                    trade.stop_loss.filter(|&stop| bar.high >= stop),
                    trade.take_profit.filter(|&target| bar.low <= target),
                ),
            };

            if let Some(stop) = stop_hit {
                Some(ExitSignal {
                    trade_id: trade.id,
                    exit_price: stop,
                    reason: ExitReason::StopLoss,
                })
            } else {
                target_hit.map(|target| ExitSignal {
                    trade_id: trade.id,
                    exit_price: target,
                    reason: ExitReason::TakeProfit,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(low: f64, high: f64) -> Bar {
        Bar {
            time: Utc.with_ymd_and_hms(2024, 3, 4, 9, 35, 0).unwrap(),
            open: (low + high) / 2.0,
            high,
            low,
            close: (low + high) / 2.0,
        }
    }

    fn trade(side: TradeSide, entry: f64, stop: Option<f64>, target: Option<f64>) -> Trade {
        Trade {
            id: TradeId(1),
            side,
            quantity: 100.0,
            entry_price: entry,
            entry_time: Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap(),
            stop_loss: stop,
            take_profit: target,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            realized_pnl: None,
        }
    }

    #[test]
    fn buy_stop_loss_on_low_touch() {
        let trades = [trade(TradeSide::Buy, 100.0, Some(95.0), Some(110.0))];
        let exits = detect_exits(&trades, &bar(95.0, 101.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::StopLoss);
        assert!((exits[0].exit_price - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_take_profit_on_high_touch() {
        let trades = [trade(TradeSide::Buy, 100.0, Some(95.0), Some(110.0))];
        let exits = detect_exits(&trades, &bar(98.0, 110.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::TakeProfit);
        assert!((exits[0].exit_price - 110.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_gap_through_prefers_stop_loss() {
        let trades = [trade(TradeSide::Buy, 100.0, Some(95.0), Some(110.0))];
        let exits = detect_exits(&trades, &bar(94.0, 111.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::StopLoss);
        assert!((exits[0].exit_price - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_stop_loss_on_high_touch() {
        let trades = [trade(TradeSide::Sell, 50.0, Some(52.0), None)];
        let exits = detect_exits(&trades, &bar(49.0, 53.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::StopLoss);
        assert!((exits[0].exit_price - 52.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_take_profit_on_low_touch() {
        let trades = [trade(TradeSide::Sell, 50.0, Some(52.0), Some(45.0))];
        let exits = detect_exits(&trades, &bar(44.5, 51.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::TakeProfit);
    }

    #[test]
    fn sell_gap_through_prefers_stop_loss() {
        let trades = [trade(TradeSide::Sell, 50.0, Some(52.0), Some(45.0))];
        let exits = detect_exits(&trades, &bar(44.0, 53.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::StopLoss);
    }

    #[test]
    fn no_levels_never_exits() {
        let trades = [trade(TradeSide::Buy, 100.0, None, None)];
        assert!(detect_exits(&trades, &bar(0.1, 10_000.0)).is_empty());
    }

    #[test]
    fn untouched_levels_produce_nothing() {
        let trades = [trade(TradeSide::Buy, 100.0, Some(95.0), Some(110.0))];
        assert!(detect_exits(&trades, &bar(96.0, 109.0)).is_empty());
    }

    #[test]
    fn mixed_book_yields_one_signal_per_hit_trade() {
        let mut hit = trade(TradeSide::Buy, 100.0, Some(95.0), None);
        hit.id = TradeId(1);
        let mut safe = trade(TradeSide::Buy, 100.0, Some(90.0), None);
        safe.id = TradeId(2);

        let exits = detect_exits(&[hit, safe], &bar(94.0, 101.0));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].trade_id, TradeId(1));
    }
}
