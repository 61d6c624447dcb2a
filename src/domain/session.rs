//! Replay session: wires the bar series, clock, and ledger together.
//!
//! The session enforces the per-tick ordering contract:
//! 1. the cursor advances to its new value,
//! 2. exits are detected against the newly reached bar and applied to the
//!    ledger, synchronously,
//! 3. observers are notified last, never with a partial view of an
//!    in-flight tick.
//!
//! Everything runs on the caller's thread; user operations are plain method
//! calls and therefore serialize naturally between ticks.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bar::{Bar, BarSeries};
use super::clock::{ReplayClock, ReplayState, TickToken};
use super::error::ReplayError;
use super::exit::detect_exits;
use super::indicator::{IndicatorSeries, IndicatorType};
use super::ledger::{LedgerSnapshot, TradeLedger};
use super::metrics::Summary;
use super::trade::{ExitReason, Trade, TradeId, TradeSide};
use crate::ports::indicator_port::IndicatorPort;
use crate::ports::store_port::DocumentStorePort;
use crate::ports::sync_port::ChartSyncPort;

/// Everything observers need about one completed advance.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub cursor: usize,
    pub bar: Bar,
    /// Trades closed by this bar, in closure order.
    pub exits: Vec<Trade>,
    pub snapshot: LedgerSnapshot,
    pub replay: ReplayState,
}

/// Persistence shape for a session, one JSON document per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub symbol: String,
    pub timeframe: String,
    pub replay: ReplayState,
    pub ledger: LedgerSnapshot,
}

impl SavedSession {
    /// Read a saved session document, if the key exists.
    pub fn read(
        store: &dyn DocumentStorePort,
        key: &str,
    ) -> Result<Option<SavedSession>, ReplayError> {
        match store.get(key)? {
            None => Ok(None),
            Some(doc) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| ReplayError::Store {
                    reason: format!("malformed session document '{key}': {e}"),
                }),
        }
    }
}

pub struct ReplaySession {
    symbol: String,
    timeframe: String,
    series: BarSeries,
    clock: ReplayClock,
    ledger: TradeLedger,
    observers: Vec<Box<dyn ChartSyncPort>>,
    indicators: Vec<IndicatorSeries>,
}

impl std::fmt::Debug for ReplaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySession")
            .field("symbol", &self.symbol)
            .field("timeframe", &self.timeframe)
            .field("series", &self.series)
            .field("clock", &self.clock)
            .field("ledger", &self.ledger)
            .field("observers", &self.observers.len())
            .field("indicators", &self.indicators)
            .finish()
    }
}

impl ReplaySession {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        series: BarSeries,
        clock: ReplayClock,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            series,
            clock,
            ledger: TradeLedger::new(),
            observers: Vec::new(),
            indicators: Vec::new(),
        }
    }

    /// Rebuild a session from a saved document plus freshly fetched bars.
    pub fn restore(saved: SavedSession, series: BarSeries) -> Result<Self, ReplayError> {
        if saved.replay.cursor >= series.len() {
            return Err(ReplayError::Validation {
                reason: format!(
                    "saved cursor {} out of range for {} bars",
                    saved.replay.cursor,
                    series.len()
                ),
            });
        }
        Ok(Self {
            symbol: saved.symbol,
            timeframe: saved.timeframe,
            series,
            clock: ReplayClock::from_state(saved.replay)?,
            ledger: TradeLedger::from_snapshot(saved.ledger),
            observers: Vec::new(),
            indicators: Vec::new(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn replay_state(&self) -> ReplayState {
        self.clock.replay_state()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn summary(&self) -> Summary {
        Summary::compute(self.ledger.closed_trades())
    }

    pub fn attach_sync(&mut self, observer: Box<dyn ChartSyncPort>) {
        self.observers.push(observer);
    }

    /// Run the pluggable calculator and keep its output for display.
    pub fn compute_indicator(
        &mut self,
        calculator: &dyn IndicatorPort,
        indicator: IndicatorType,
    ) -> Result<(), ReplayError> {
        let series = calculator.compute(&self.series, &indicator)?;
        self.indicators.push(series);
        Ok(())
    }

    pub fn indicators(&self) -> &[IndicatorSeries] {
        &self.indicators
    }

    /// The bar under the cursor. None only for an empty series.
    pub fn current_bar(&self) -> Option<&Bar> {
        self.series.get(self.clock.cursor())
    }

    /// Mark-to-market P&L of the open book at the current close.
    pub fn unrealized_pnl(&self) -> f64 {
        match self.current_bar() {
            Some(bar) => self.ledger.unrealized_pnl(bar.close),
            None => 0.0,
        }
    }

    /// Open a trade at the current bar's close.
    pub fn place_trade(
        &mut self,
        side: TradeSide,
        quantity: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<Trade, ReplayError> {
        let bar = *self.current_bar().ok_or(ReplayError::EmptySeries)?;
        let trade = self.ledger.place_trade(
            side,
            quantity,
            bar.close,
            bar.time,
            stop_loss,
            take_profit,
        )?;
        self.notify_repaint();
        Ok(trade)
    }

    /// Close one trade at a caller-chosen price (clicked level in a UI).
    pub fn close_trade_manual(&mut self, id: TradeId, price: f64) -> Result<Trade, ReplayError> {
        if !(price > 0.0) || !price.is_finite() {
            return Err(ReplayError::Validation {
                reason: format!("exit price must be positive, got {price}"),
            });
        }
        let time = self
            .current_bar()
            .ok_or(ReplayError::EmptySeries)?
            .time;
        let closed = self.ledger.close_trade(id, price, time, ExitReason::Manual)?;
        self.notify_repaint();
        Ok(closed)
    }

    /// Close every open trade at the current close, in placement order.
    pub fn flatten_all(&mut self) -> Result<Vec<Trade>, ReplayError> {
        if self.ledger.open_trades().is_empty() {
            return Ok(Vec::new());
        }
        let bar = *self.current_bar().ok_or(ReplayError::EmptySeries)?;
        let flattened = self.ledger.flatten_all(bar.close, bar.time);
        self.notify_repaint();
        Ok(flattened)
    }

    pub fn play(&mut self) -> Result<Option<TickToken>, ReplayError> {
        self.clock.play(self.series.len())
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn set_speed_multiplier(&mut self, multiplier: u32) -> Result<(), ReplayError> {
        self.clock.set_speed_multiplier(multiplier)
    }

    pub fn set_interval_ms(&mut self, interval_ms: u64) -> Result<(), ReplayError> {
        self.clock.set_interval_ms(interval_ms)
    }

    pub fn interval(&self) -> std::time::Duration {
        self.clock.interval()
    }

    /// One timer fire. Returns the event when the cursor advanced; stale
    /// tokens produce `Ok(None)` and touch nothing.
    pub fn tick(&mut self, token: TickToken) -> Result<Option<TickEvent>, ReplayError> {
        match self.clock.tick(token, self.series.len()) {
            None => Ok(None),
            Some(cursor) => self.process_advance(cursor).map(Some),
        }
    }

    /// Manual advance/rewind. Forward movement runs exit detection against
    /// the landed bar; rewinding only repaints.
    pub fn step(&mut self, n: i64) -> Result<Option<TickEvent>, ReplayError> {
        let before = self.clock.cursor();
        let after = self.clock.step(n, self.series.len())?;
        if after > before {
            self.process_advance(after).map(Some)
        } else {
            if after != before {
                self.notify_repaint();
            }
            Ok(None)
        }
    }

    /// Scrub the cursor. Not an advance: no exit detection, forces Paused.
    pub fn seek(&mut self, index: usize) -> Result<usize, ReplayError> {
        let cursor = self.clock.seek(index, self.series.len())?;
        self.notify_repaint();
        Ok(cursor)
    }

    /// Select a new simulation start point: scrub there and wipe the book.
    pub fn restart_at(&mut self, index: usize) -> Result<usize, ReplayError> {
        let cursor = self.clock.seek(index, self.series.len())?;
        self.ledger.reset();
        self.notify_repaint();
        Ok(cursor)
    }

    /// Restart from a uniformly random bar.
    pub fn random_start<R: Rng>(&mut self, rng: &mut R) -> Result<usize, ReplayError> {
        if self.series.is_empty() {
            return Err(ReplayError::EmptySeries);
        }
        let index = rng.gen_range(0..self.series.len());
        self.restart_at(index)
    }

    pub fn saved(&self) -> SavedSession {
        SavedSession {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            replay: self.clock.replay_state(),
            ledger: self.ledger.snapshot(),
        }
    }

    /// Persist the session under a key; last write wins.
    pub fn save(&self, store: &dyn DocumentStorePort, key: &str) -> Result<(), ReplayError> {
        let doc = serde_json::to_value(self.saved()).map_err(|e| ReplayError::Store {
            reason: format!("failed to serialize session: {e}"),
        })?;
        store.put(key, &doc)
    }

    fn process_advance(&mut self, cursor: usize) -> Result<TickEvent, ReplayError> {
        let bar = *self
            .series
            .get(cursor)
            .expect("cursor is clamped to series bounds");

        let signals = detect_exits(self.ledger.open_trades(), &bar);
        let mut exits = Vec::with_capacity(signals.len());
        for signal in signals {
            // Signals were derived from the open book an instant ago, so the
            // ids must resolve; a failure here is a broken tick sequence.
            exits.push(self.ledger.close_trade(
                signal.trade_id,
                signal.exit_price,
                bar.time,
                signal.reason,
            )?);
        }

        let event = TickEvent {
            cursor,
            bar,
            exits,
            snapshot: self.ledger.snapshot(),
            replay: self.clock.replay_state(),
        };
        for observer in &mut self.observers {
            observer.bar_reached(&event);
        }
        Ok(event)
    }

    fn notify_repaint(&mut self) {
        let snapshot = self.ledger.snapshot();
        let replay = self.clock.replay_state();
        for observer in &mut self.observers {
            observer.repaint(&snapshot, &replay);
        }
    }
}
