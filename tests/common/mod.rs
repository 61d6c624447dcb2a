#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use replaylab::domain::bar::{Bar, BarSeries};
use replaylab::domain::clock::{ReplayClock, ReplayState};
use replaylab::domain::error::ReplayError;
use replaylab::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use replaylab::domain::ledger::LedgerSnapshot;
use replaylab::domain::session::{ReplaySession, TickEvent};
use replaylab::ports::indicator_port::IndicatorPort;
use replaylab::ports::store_port::DocumentStorePort;
use replaylab::ports::sync_port::ChartSyncPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Five-minute bar times starting at 2024-01-02 09:30 UTC.
pub fn time_at(index: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap() + Duration::minutes(5 * index as i64)
}

pub fn make_bar(index: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        time: time_at(index),
        open,
        high,
        low,
        close,
    }
}

/// A bar that moves nowhere: close 100, range 99..101.
pub fn flat_bar(index: usize) -> Bar {
    make_bar(index, 100.0, 101.0, 99.0, 100.0)
}

pub fn flat_series(n: usize) -> BarSeries {
    BarSeries::new((0..n).map(flat_bar).collect()).unwrap()
}

pub fn series_from(bars: Vec<Bar>) -> BarSeries {
    BarSeries::new(bars).unwrap()
}

pub fn make_session(series: BarSeries) -> ReplaySession {
    ReplaySession::new("ES", "5m", series, ReplayClock::new(250, 1).unwrap())
}

/// In-memory document store with the same last-write-wins semantics as the
/// real adapters.
#[derive(Default)]
pub struct MemoryStore {
    documents: RefCell<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStorePort for MemoryStore {
    fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), ReplayError> {
        self.documents
            .borrow_mut()
            .insert(key.to_string(), document.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ReplayError> {
        Ok(self.documents.borrow().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, ReplayError> {
        Ok(self.documents.borrow_mut().remove(key).is_some())
    }

    fn list_keys(&self) -> Result<Vec<String>, ReplayError> {
        let mut keys: Vec<String> = self.documents.borrow().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Calculator stub: emits a constant value per bar after a fixed warm-up.
pub struct ConstantCalculator {
    pub warm_up: usize,
    pub value: f64,
}

impl IndicatorPort for ConstantCalculator {
    fn compute(
        &self,
        series: &BarSeries,
        indicator: &IndicatorType,
    ) -> Result<IndicatorSeries, ReplayError> {
        let n = series.len().saturating_sub(self.warm_up);
        Ok(IndicatorSeries {
            indicator: indicator.clone(),
            warm_up: self.warm_up,
            values: vec![IndicatorValue::Simple(self.value); n],
        })
    }
}

/// Observer that records every notification for later assertions.
#[derive(Default)]
pub struct SyncRecorder {
    pub bar_reached: Vec<TickEvent>,
    pub repaints: Vec<(LedgerSnapshot, ReplayState)>,
}

#[derive(Clone, Default)]
pub struct SharedSyncRecorder(pub Rc<RefCell<SyncRecorder>>);

impl ChartSyncPort for SharedSyncRecorder {
    fn bar_reached(&mut self, event: &TickEvent) {
        self.0.borrow_mut().bar_reached.push(event.clone());
    }

    fn repaint(&mut self, snapshot: &LedgerSnapshot, replay: &ReplayState) {
        self.0.borrow_mut().repaints.push((snapshot.clone(), *replay));
    }
}
