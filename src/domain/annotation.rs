//! Chart annotation data model.
//!
//! The ledger is translated into plain annotation data here; rendering, and
//! diffing against what was previously drawn, belongs to the sync adapter
//! alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::LedgerSnapshot;
use super::trade::{ExitReason, TradeId, TradeSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    Entry,
    Exit,
}

/// A point marker at a trade's entry or exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMarker {
    pub trade_id: TradeId,
    pub kind: MarkerKind,
    pub side: TradeSide,
    pub time: DateTime<Utc>,
    pub price: f64,
    pub reason: Option<ExitReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceLineKind {
    Entry,
    StopLoss,
    TakeProfit,
}

/// A horizontal level drawn for an open trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub trade_id: TradeId,
    pub kind: PriceLineKind,
    pub price: f64,
}

/// Everything a chart surface needs to draw for one ledger snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartOverlay {
    pub markers: Vec<TradeMarker>,
    pub lines: Vec<PriceLine>,
}

/// Pure mapping from a snapshot to its overlay. Open trades contribute an
/// entry marker plus entry/stop/target lines; closed trades contribute entry
/// and exit markers and no lines.
pub fn overlay_for(snapshot: &LedgerSnapshot) -> ChartOverlay {
    let mut overlay = ChartOverlay::default();

    for trade in &snapshot.open_trades {
        overlay.markers.push(TradeMarker {
            trade_id: trade.id,
            kind: MarkerKind::Entry,
            side: trade.side,
            time: trade.entry_time,
            price: trade.entry_price,
            reason: None,
        });
        overlay.lines.push(PriceLine {
            trade_id: trade.id,
            kind: PriceLineKind::Entry,
            price: trade.entry_price,
        });
        if let Some(stop) = trade.stop_loss {
            overlay.lines.push(PriceLine {
                trade_id: trade.id,
                kind: PriceLineKind::StopLoss,
                price: stop,
            });
        }
        if let Some(target) = trade.take_profit {
            overlay.lines.push(PriceLine {
                trade_id: trade.id,
                kind: PriceLineKind::TakeProfit,
                price: target,
            });
        }
    }

    for trade in &snapshot.closed_trades {
        overlay.markers.push(TradeMarker {
            trade_id: trade.id,
            kind: MarkerKind::Entry,
            side: trade.side,
            time: trade.entry_time,
            price: trade.entry_price,
            reason: None,
        });
        if let (Some(price), Some(time)) = (trade.exit_price, trade.exit_time) {
            overlay.markers.push(TradeMarker {
                trade_id: trade.id,
                kind: MarkerKind::Exit,
                side: trade.side,
                time,
                price,
                reason: trade.exit_reason,
            });
        }
    }

    overlay
}
