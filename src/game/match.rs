//! Match clock, scoring and lifecycle

use serde::Serialize;
use tracing::info;

use crate::util::time::TICK_RATE;

use super::session::CarId;

/// Length of a match in seconds
pub const GAME_DURATION: f64 = 60.0;

/// Match phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    #[default]
    /// Nobody connected; ticks do nothing
    Waiting,
    /// Clock running
    Running,
    /// Clock reached the duration; terminal until the next reset
    Finished,
}

/// Clock and hold-time bookkeeping for one match.
///
/// Time is counted in whole ticks and converted to seconds on read, so the
/// clock lands exactly on `GAME_DURATION` instead of drifting around it.
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    ticks: u64,
    human_hold_ticks: u64,
    ai_hold_ticks: u64,
    finished: bool,
    pub flag_holder: Option<CarId>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear clock, scores and holder
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Seconds elapsed, clamped at the match duration
    pub fn elapsed(&self) -> f64 {
        (self.ticks as f64 / TICK_RATE as f64).min(GAME_DURATION)
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn hold_time_human(&self) -> f64 {
        self.human_hold_ticks as f64 / TICK_RATE as f64
    }

    pub fn hold_time_ai(&self) -> f64 {
        self.ai_hold_ticks as f64 / TICK_RATE as f64
    }

    pub fn phase(&self, population: usize) -> MatchPhase {
        if population == 0 {
            MatchPhase::Waiting
        } else if self.finished {
            MatchPhase::Finished
        } else {
            MatchPhase::Running
        }
    }

    /// Advance the clock by one tick. Returns true on the tick the match ends.
    pub fn advance_clock(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.ticks += 1;
        if self.elapsed() >= GAME_DURATION {
            self.finished = true;
            info!(
                human_hold = self.hold_time_human(),
                ai_hold = self.hold_time_ai(),
                "Match finished"
            );
            return true;
        }
        false
    }

    /// Credit this tick to whichever side holds the flag. Keeps counting
    /// after the clock has stopped.
    pub fn accumulate_hold(&mut self) {
        match self.flag_holder {
            Some(CarId::Ai) => self.ai_hold_ticks += 1,
            Some(CarId::Player(_)) => self.human_hold_ticks += 1,
            None => {}
        }
    }
}
