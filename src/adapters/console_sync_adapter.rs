//! Console chart-sync adapter.
//!
//! Renders tick events as terminal lines. This adapter is the only component
//! that remembers what it previously drew: price lines are diffed against the
//! last overlay so the output shows additions and removals, the way a chart
//! surface would add and drop line primitives.

use std::io::Write;

use crate::domain::annotation::{overlay_for, PriceLine};
use crate::domain::clock::ReplayState;
use crate::domain::ledger::LedgerSnapshot;
use crate::domain::session::TickEvent;
use crate::ports::sync_port::ChartSyncPort;

pub struct ConsoleSyncAdapter {
    out: Box<dyn Write>,
    rendered_lines: Vec<PriceLine>,
}

impl ConsoleSyncAdapter {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            rendered_lines: Vec::new(),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    fn unrealized(snapshot: &LedgerSnapshot, mark: f64) -> f64 {
        snapshot
            .open_trades
            .iter()
            .map(|t| t.unrealized_pnl(mark))
            .sum()
    }

    fn render_line_diff(&mut self, snapshot: &LedgerSnapshot) {
        let lines = overlay_for(snapshot).lines;

        for line in &lines {
            if !self.rendered_lines.contains(line) {
                let _ = writeln!(
                    self.out,
                    "  + line {} {:?} @ {:.2}",
                    line.trade_id, line.kind, line.price
                );
            }
        }
        for line in &self.rendered_lines {
            if !lines.contains(line) {
                let _ = writeln!(
                    self.out,
                    "  - line {} {:?} @ {:.2}",
                    line.trade_id, line.kind, line.price
                );
            }
        }

        self.rendered_lines = lines;
    }
}

impl ChartSyncPort for ConsoleSyncAdapter {
    fn bar_reached(&mut self, event: &TickEvent) {
        let unrealized = Self::unrealized(&event.snapshot, event.bar.close);
        let _ = writeln!(
            self.out,
            "bar {:>5}  {}  close {:>10.2}  open {}  unrealized {:+.2}  realized {:+.2}",
            event.cursor,
            event.bar.time.format("%Y-%m-%d %H:%M"),
            event.bar.close,
            event.snapshot.open_trades.len(),
            unrealized,
            event.snapshot.cumulative_realized_pnl,
        );
        for exit in &event.exits {
            let _ = writeln!(
                self.out,
                "  exit {} {} @ {:.2} ({:+.2})",
                exit.id,
                exit.exit_reason
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
                exit.exit_price.unwrap_or(0.0),
                exit.realized_pnl.unwrap_or(0.0),
            );
        }
        self.render_line_diff(&event.snapshot);
    }

    fn repaint(&mut self, snapshot: &LedgerSnapshot, replay: &ReplayState) {
        let _ = writeln!(
            self.out,
            "[{}] cursor {}  open {}  closed {}  realized {:+.2}",
            replay.state,
            replay.cursor,
            snapshot.open_trades.len(),
            snapshot.closed_trades.len(),
            snapshot.cumulative_realized_pnl,
        );
        self.render_line_diff(snapshot);
    }
}
