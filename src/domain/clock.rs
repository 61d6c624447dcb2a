//! Replay clock: cursor movement and playback state.
//!
//! The clock owns no timer thread. A driver (CLI loop, GUI frame callback)
//! waits `interval_ms` between ticks and presents the `TickToken` it got from
//! `play()`. `pause()`, `seek()`, and reaching the final index invalidate the
//! token, so a timer that already fired mutates nothing; cancellation is
//! synchronous even against a sloppy driver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::ReplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Finished,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Finished => write!(f, "finished"),
        }
    }
}

/// Serializable view of the clock, and the shape persisted in sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayState {
    pub cursor: usize,
    pub state: PlaybackState,
    pub speed_multiplier: u32,
    pub interval_ms: u64,
}

/// Proof that a timer fire belongs to the current playback run. Stale tokens
/// are ignored by `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken(u64);

#[derive(Debug, Clone)]
pub struct ReplayClock {
    cursor: usize,
    state: PlaybackState,
    speed_multiplier: u32,
    interval_ms: u64,
    generation: u64,
}

impl ReplayClock {
    pub fn new(interval_ms: u64, speed_multiplier: u32) -> Result<Self, ReplayError> {
        if interval_ms == 0 {
            return Err(ReplayError::Validation {
                reason: "interval_ms must be positive".into(),
            });
        }
        if speed_multiplier == 0 {
            return Err(ReplayError::Validation {
                reason: "speed multiplier must be positive".into(),
            });
        }
        Ok(Self {
            cursor: 0,
            state: PlaybackState::Idle,
            speed_multiplier,
            interval_ms,
            generation: 0,
        })
    }

    /// Restore from a persisted state. A session saved mid-playback resumes
    /// paused: continuing is an explicit user action.
    pub fn from_state(state: ReplayState) -> Result<Self, ReplayError> {
        let mut clock = Self::new(state.interval_ms, state.speed_multiplier)?;
        clock.cursor = state.cursor;
        clock.state = match state.state {
            PlaybackState::Playing => PlaybackState::Paused,
            other => other,
        };
        Ok(clock)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn speed_multiplier(&self) -> u32 {
        self.speed_multiplier
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn replay_state(&self) -> ReplayState {
        ReplayState {
            cursor: self.cursor,
            state: self.state,
            speed_multiplier: self.speed_multiplier,
            interval_ms: self.interval_ms,
        }
    }

    /// Idle/Paused → Playing. Returns the token the driver must present on
    /// each tick. `Ok(None)` when already Playing or Finished; `EmptySeries`
    /// when there is nothing to play.
    pub fn play(&mut self, series_len: usize) -> Result<Option<TickToken>, ReplayError> {
        if series_len == 0 {
            return Err(ReplayError::EmptySeries);
        }
        match self.state {
            PlaybackState::Playing | PlaybackState::Finished => Ok(None),
            PlaybackState::Idle | PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                self.generation += 1;
                Ok(Some(TickToken(self.generation)))
            }
        }
    }

    /// Playing → Paused. Invalidates outstanding tokens, so a tick that was
    /// already scheduled when this returns can no longer advance the cursor.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.generation += 1;
        }
    }

    /// Advance or rewind the cursor by `n` bars, clamped to the series.
    /// Leaves Playing/Paused alone, except that reaching the final index
    /// while Playing finishes playback, and rewinding off the final index
    /// leaves Finished for Paused.
    pub fn step(&mut self, n: i64, series_len: usize) -> Result<usize, ReplayError> {
        if series_len == 0 {
            return Err(ReplayError::EmptySeries);
        }
        let last = series_len - 1;
        let target = self.cursor as i64 + n;
        self.cursor = target.clamp(0, last as i64) as usize;

        if self.cursor == last {
            if self.state == PlaybackState::Playing {
                self.state = PlaybackState::Finished;
                self.generation += 1;
            }
        } else if self.state == PlaybackState::Finished {
            self.state = PlaybackState::Paused;
        }
        Ok(self.cursor)
    }

    /// Set the cursor directly (scrub/slider, "start from this bar").
    /// Always forces Paused: resuming from an arbitrary point must be an
    /// explicit action.
    pub fn seek(&mut self, index: usize, series_len: usize) -> Result<usize, ReplayError> {
        if series_len == 0 {
            return Err(ReplayError::EmptySeries);
        }
        if index >= series_len {
            return Err(ReplayError::Validation {
                reason: format!("seek index {index} out of range (0..{series_len})"),
            });
        }
        self.cursor = index;
        self.state = PlaybackState::Paused;
        self.generation += 1;
        Ok(self.cursor)
    }

    /// Bars advanced per tick. Takes effect on the next tick.
    pub fn set_speed_multiplier(&mut self, multiplier: u32) -> Result<(), ReplayError> {
        if multiplier == 0 {
            return Err(ReplayError::Validation {
                reason: "speed multiplier must be positive".into(),
            });
        }
        self.speed_multiplier = multiplier;
        Ok(())
    }

    /// Timer period hint for the driver. Takes effect on the driver's next wait.
    pub fn set_interval_ms(&mut self, interval_ms: u64) -> Result<(), ReplayError> {
        if interval_ms == 0 {
            return Err(ReplayError::Validation {
                reason: "interval_ms must be positive".into(),
            });
        }
        self.interval_ms = interval_ms;
        Ok(())
    }

    /// One timer fire. Stale tokens and non-Playing states are ignored.
    /// Returns the new cursor when the cursor actually advanced.
    pub fn tick(&mut self, token: TickToken, series_len: usize) -> Option<usize> {
        if token.0 != self.generation || self.state != PlaybackState::Playing || series_len == 0 {
            return None;
        }
        let last = series_len - 1;
        let target = self
            .cursor
            .saturating_add(self.speed_multiplier as usize)
            .min(last);

        if target == self.cursor {
            self.state = PlaybackState::Finished;
            self.generation += 1;
            return None;
        }

        self.cursor = target;
        if target == last {
            self.state = PlaybackState::Finished;
            self.generation += 1;
        }
        Some(target)
    }
}
