//! Chart synchronization port trait.

use crate::domain::clock::ReplayState;
use crate::domain::ledger::LedgerSnapshot;
use crate::domain::session::TickEvent;

/// Outward-facing observer for a chart surface (or any other renderer).
///
/// The session calls `bar_reached` only after a tick's exits are fully
/// applied, so implementations never see a partial view. The engine never
/// queries rendering state back; diffing against what was previously drawn
/// is entirely the adapter's concern.
pub trait ChartSyncPort {
    /// The cursor advanced (timer tick or manual step).
    fn bar_reached(&mut self, event: &TickEvent);

    /// State changed without an advance: placement, manual close, flatten,
    /// seek, restart.
    fn repaint(&mut self, snapshot: &LedgerSnapshot, replay: &ReplayState);
}
