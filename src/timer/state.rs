use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{CueGuard, PhaseClock};
use super::config::{SessionConfig, TimerMode};
use super::transitions::Counters;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Prepare,
    Work,
    Rest,
    RestBetweenCycles,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Prepare => "Prepare",
            Phase::Work => "Work",
            Phase::Rest => "Rest",
            Phase::RestBetweenCycles => "Rest between cycles",
            Phase::Completed => "Completed",
        }
    }
}

/// Run-time record of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Present while a phase is counting down; its end instant is only
    /// advancing while `running`.
    pub clock: Option<PhaseClock>,
    /// Snapshot of the remaining time taken by `pause`.
    pub remaining_ms_when_paused: u64,
    pub current_round: u32,
    pub current_cycle: u32,
    pub running: bool,
    pub cue_guard: CueGuard,
    /// Set while the wall clock reads earlier than the current phase start.
    pub clock_skewed: bool,
}

impl SessionState {
    pub fn idle(config: &SessionConfig) -> Self {
        Self {
            phase: Phase::Idle,
            session_id: None,
            started_at: None,
            clock: None,
            remaining_ms_when_paused: 0,
            current_round: config.rounds,
            current_cycle: config.cycles,
            running: false,
            cue_guard: CueGuard::default(),
            clock_skewed: false,
        }
    }

    pub fn counters(&self) -> Counters {
        Counters {
            round: self.current_round,
            cycle: self.current_cycle,
        }
    }

    /// Track whether the clock is currently skewed. Returns true only when a
    /// new skew episode begins.
    pub fn observe_clock_skew(&mut self, skewed: bool) -> bool {
        let began = skewed && !self.clock_skewed;
        self.clock_skewed = skewed;
        began
    }

    pub fn is_paused(&self) -> bool {
        !self.running && !matches!(self.phase, Phase::Idle | Phase::Completed)
    }
}

/// What the hosting UI renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub session_id: Option<String>,
    pub mode: TimerMode,
    pub phase: Phase,
    pub running: bool,
    pub paused: bool,
    pub remaining_secs: u32,
    pub phase_total_secs: u32,
    pub display: String,
    pub progress: f64,
    pub current_round: Option<u32>,
    pub current_cycle: Option<u32>,
    pub total_rounds: Option<u32>,
    pub total_cycles: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}
