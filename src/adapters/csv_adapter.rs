//! CSV file bar data adapter.
//!
//! One file per (symbol, timeframe): `{SYMBOL}_{TIMEFRAME}.csv` with columns
//! `timestamp,open,high,low,close[,volume]`. Timestamps are RFC 3339. The
//! volume column, when present, is ignored; the engine has no use for it.

use crate::domain::bar::Bar;
use crate::domain::error::ReplayError;
use crate::ports::data_port::BarDataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn read_all(&self, symbol: &str, timeframe: &str) -> Result<Vec<Bar>, ReplayError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| ReplayError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| ReplayError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let time_str = record.get(0).ok_or_else(|| ReplayError::Data {
                reason: "missing timestamp column".into(),
            })?;
            let time = DateTime::parse_from_rfc3339(time_str)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ReplayError::Data {
                    reason: format!("invalid timestamp '{}': {}", time_str, e),
                })?;

            let field = |index: usize, name: &str| -> Result<f64, ReplayError> {
                record
                    .get(index)
                    .ok_or_else(|| ReplayError::Data {
                        reason: format!("missing {} column", name),
                    })?
                    .parse()
                    .map_err(|e| ReplayError::Data {
                        reason: format!("invalid {} value: {}", name, e),
                    })
            };

            bars.push(Bar {
                time,
                open: field(1, "open")?,
                high: field(2, "high")?,
                low: field(3, "low")?,
                close: field(4, "close")?,
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }
}

impl BarDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, ReplayError> {
        let bars = self.read_all(symbol, timeframe)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.time >= start && b.time <= end)
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, ReplayError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ReplayError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ReplayError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            // `{SYMBOL}_{TIMEFRAME}.csv`: the symbol is everything before
            // the final underscore.
            if let Some(stem) = name_str.strip_suffix(".csv") {
                if let Some((symbol, _timeframe)) = stem.rsplit_once('_') {
                    if !symbol.is_empty() {
                        symbols.push(symbol.to_string());
                    }
                }
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, ReplayError> {
        if !self.csv_path(symbol, timeframe).exists() {
            return Ok(None);
        }
        let bars = self.read_all(symbol, timeframe)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.time, last.time, bars.len()))),
            _ => Ok(None),
        }
    }
}
