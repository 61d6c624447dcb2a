//! Configuration validation.
//!
//! Validates all config fields before a replay run starts.

use chrono::{DateTime, Utc};

use crate::domain::error::ReplayError;
use crate::domain::script::{self, ScriptedAction};
use crate::ports::config_port::ConfigPort;

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    validate_dir(config)?;
    validate_symbol(config)?;
    validate_timeframe(config)?;
    validate_range(config)?;
    Ok(())
}

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    validate_interval(config)?;
    validate_speed(config)?;
    validate_start_point(config)?;
    Ok(())
}

/// Parse every numbered `[script]` action (`action1`, `action2`, ...),
/// stopping at the first missing key. Returned sorted by bar index, stable
/// for actions on the same bar.
pub fn collect_script_actions(
    config: &dyn ConfigPort,
) -> Result<Vec<ScriptedAction>, ReplayError> {
    let mut actions = Vec::new();
    for i in 1.. {
        let key = format!("action{i}");
        match config.get_string("script", &key) {
            None => break,
            Some(line) => actions.push(script::parse(&line)?),
        }
    }
    actions.sort_by_key(|a| a.bar);
    Ok(actions)
}

pub fn validate_script_config(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    collect_script_actions(config).map(|_| ())
}

/// Parse an RFC 3339 timestamp from a config value.
pub fn parse_timestamp(
    value: &str,
    section: &str,
    key: &str,
) -> Result<DateTime<Utc>, ReplayError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ReplayError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: "invalid timestamp (expected RFC 3339, e.g. 2024-01-02T09:30:00Z)".into(),
        })
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, ReplayError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ReplayError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_dir(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    require_string(config, "data", "dir").map(|_| ())
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    require_string(config, "data", "symbol").map(|_| ())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    require_string(config, "data", "timeframe").map(|_| ())
}

fn validate_range(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    let start_str = require_string(config, "data", "start")?;
    let end_str = require_string(config, "data", "end")?;

    let start = parse_timestamp(&start_str, "data", "start")?;
    let end = parse_timestamp(&end_str, "data", "end")?;

    if start >= end {
        return Err(ReplayError::ConfigInvalid {
            section: "data".to_string(),
            key: "start".to_string(),
            reason: "start must be before end".to_string(),
        });
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    let value = config.get_int("replay", "interval_ms", 250);
    if value < 1 {
        return Err(ReplayError::ConfigInvalid {
            section: "replay".to_string(),
            key: "interval_ms".to_string(),
            reason: "interval_ms must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_speed(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    let value = config.get_int("replay", "speed", 1);
    if value < 1 {
        return Err(ReplayError::ConfigInvalid {
            section: "replay".to_string(),
            key: "speed".to_string(),
            reason: "speed must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_start_point(config: &dyn ConfigPort) -> Result<(), ReplayError> {
    let start_index = config.get_int("replay", "start_index", 0);
    if start_index < 0 {
        return Err(ReplayError::ConfigInvalid {
            section: "replay".to_string(),
            key: "start_index".to_string(),
            reason: "start_index must be non-negative".to_string(),
        });
    }
    let random = config.get_bool("replay", "random_start", false);
    if random && config.get_string("replay", "start_index").is_some() {
        return Err(ReplayError::ConfigInvalid {
            section: "replay".to_string(),
            key: "random_start".to_string(),
            reason: "random_start and start_index are mutually exclusive".to_string(),
        });
    }
    Ok(())
}
