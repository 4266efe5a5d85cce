use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::clock::{ceil_secs, progress_ratio, PhaseClock};
use super::config::{ConfigPatch, SessionConfig, TimerMode};
use super::events::{Cue, CueKind};
use super::format::format_clock;
use super::state::{Phase, SessionState, TimerSnapshot};
use super::transitions::{next_phase, Transition};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// The session was idle and now uses the new values.
    Applied,
    /// A session is active; the values apply after the next reset.
    Deferred,
}

/// Single-session interval timer. Time only moves when the caller passes a
/// `now`, and side effects come back as [`Cue`]s instead of being performed here.
#[derive(Debug, Clone)]
pub struct Session {
    mode: TimerMode,
    config: SessionConfig,
    pending_config: Option<SessionConfig>,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(TimerMode::default(), SessionConfig::default())
    }
}

impl Session {
    pub fn new(mode: TimerMode, config: SessionConfig) -> Self {
        let config = config.clamped();
        Self {
            mode,
            config,
            pending_config: None,
            state: SessionState::idle(&config),
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pending_config(&self) -> Option<&SessionConfig> {
        self.pending_config.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn configure(&mut self, patch: &ConfigPatch) -> ConfigureOutcome {
        if self.state.phase == Phase::Idle {
            self.config = self.config.merged(patch);
            self.state = SessionState::idle(&self.config);
            log_debug!("timer config applied: {:?}", self.config);
            return ConfigureOutcome::Applied;
        }

        let base = self.pending_config.unwrap_or(self.config);
        self.pending_config = Some(base.merged(patch));
        log_info!(
            "timer config deferred until reset (phase {})",
            self.state.phase.as_str()
        );
        ConfigureOutcome::Deferred
    }

    /// Switch modes. A different mode always drops the current session.
    pub fn set_mode(&mut self, mode: TimerMode) -> bool {
        if mode == self.mode {
            return false;
        }
        self.reset();
        self.mode = mode;
        log_info!("timer mode set to {}", mode.as_str());
        true
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<Cue> {
        if self.state.running {
            return Vec::new();
        }

        match self.state.phase {
            Phase::Idle => {
                let first = next_phase(self.mode, Phase::Idle, self.state.counters(), &self.config);
                let session_id = Uuid::new_v4().to_string();
                log_info!(
                    "starting {} session {} in {}",
                    self.mode.as_str(),
                    session_id,
                    first.phase.as_str()
                );
                self.state.session_id = Some(session_id);
                self.state.started_at = Some(now);
                self.state.running = true;
                self.enter(first, PhaseClock::starting_at(now, first.duration_secs));
                vec![self.cue(CueKind::PhaseChange, now)]
            }
            Phase::Completed => Vec::new(),
            _ => {
                let total = self
                    .state
                    .clock
                    .map(|clock| clock.total_secs())
                    .unwrap_or_default();
                self.state.clock = Some(PhaseClock::resuming_at(
                    now,
                    self.state.remaining_ms_when_paused,
                    total,
                ));
                self.state.running = true;
                log_info!(
                    "resuming {} with {}ms left",
                    self.state.phase.as_str(),
                    self.state.remaining_ms_when_paused
                );
                // A pause taken right at a boundary resumes into the transition.
                self.tick(now)
            }
        }
    }

    /// Freeze the countdown. Any transition already due at `now` is processed
    /// first, so a pause never lands on a phase with zero time left.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Vec<Cue> {
        if !self.state.running {
            return Vec::new();
        }

        let cues = self.tick(now);
        if let (true, Some(clock)) = (self.state.running, self.state.clock) {
            self.state.remaining_ms_when_paused = clock.remaining_ms(now);
            self.state.running = false;
            log_info!(
                "paused {} with {}ms left",
                self.state.phase.as_str(),
                self.state.remaining_ms_when_paused
            );
        }
        cues
    }

    pub fn reset(&mut self) {
        if let Some(pending) = self.pending_config.take() {
            self.config = pending;
            log_debug!("applied deferred timer config: {:?}", self.config);
        }
        if let Some(session_id) = self.state.session_id.as_deref() {
            log_info!("resetting session {session_id}");
        }
        self.state = SessionState::idle(&self.config);
    }

    /// Advance the session to `now`. Safe to call with no elapsed time, and
    /// catches up on several phases at once after a long gap between ticks.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Cue> {
        let mut cues = Vec::new();
        if !self.state.running {
            return cues;
        }
        let Some(mut clock) = self.state.clock else {
            return cues;
        };

        if self.state.observe_clock_skew(clock.has_clock_skew(now)) {
            log_warn!(
                "wall clock moved backwards; holding {} at full length",
                self.state.phase.as_str()
            );
        }

        while clock.is_expired(now) {
            let next = next_phase(self.mode, self.state.phase, self.state.counters(), &self.config);
            if next.phase == Phase::Completed {
                self.complete(next);
                cues.push(self.cue(CueKind::Completed, now));
                return cues;
            }
            clock = clock.followed_by(next.duration_secs);
            self.enter(next, clock);
            cues.push(self.cue(CueKind::PhaseChange, now));
        }

        if self.state.cue_guard.should_fire_final_second(clock.remaining_secs(now)) {
            cues.push(self.cue(CueKind::FinalSecond, now));
        }

        cues
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        ceil_secs(self.remaining_ms(now))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let phase = self.state.phase;
        let remaining_ms = self.remaining_ms(now);
        let remaining_secs = ceil_secs(remaining_ms);
        let total = self.phase_total_secs();

        let display = if self.mode == TimerMode::Stopwatch && phase == Phase::Work {
            let elapsed_ms = (u64::from(total) * 1000).saturating_sub(remaining_ms);
            format_clock((elapsed_ms / 1000) as i64, true)
        } else {
            format_clock(i64::from(remaining_secs), self.shows_minutes(total))
        };

        let progress = match phase {
            Phase::Idle => 0.0,
            Phase::Completed => 1.0,
            _ => progress_ratio(total, remaining_ms),
        };

        let tabata = self.mode == TimerMode::Tabata;

        TimerSnapshot {
            session_id: self.state.session_id.clone(),
            mode: self.mode,
            phase,
            running: self.state.running,
            paused: self.state.is_paused(),
            remaining_secs,
            phase_total_secs: total,
            display,
            progress,
            current_round: tabata.then_some(self.state.current_round),
            current_cycle: tabata.then_some(self.state.current_cycle),
            total_rounds: tabata.then_some(self.config.rounds),
            total_cycles: tabata.then_some(self.config.cycles),
            started_at: self.state.started_at,
        }
    }

    fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match (self.state.phase, self.state.running, self.state.clock) {
            (Phase::Idle, _, _) => u64::from(self.config.work_duration(self.mode)) * 1000,
            (Phase::Completed, _, _) => 0,
            (_, true, Some(clock)) => clock.remaining_ms(now),
            _ => self.state.remaining_ms_when_paused,
        }
    }

    fn phase_total_secs(&self) -> u32 {
        match self.state.phase {
            Phase::Idle => self.config.work_duration(self.mode),
            Phase::Completed => 0,
            _ => self
                .state
                .clock
                .map(|clock| clock.total_secs())
                .unwrap_or_default(),
        }
    }

    fn shows_minutes(&self, total: u32) -> bool {
        match self.state.phase {
            Phase::Idle | Phase::Work if self.mode != TimerMode::Tabata => true,
            Phase::Completed => true,
            _ => total >= 60,
        }
    }

    fn enter(&mut self, transition: Transition, clock: PhaseClock) {
        log_debug!(
            "entering {} for {}s (round {}, cycle {})",
            transition.phase.as_str(),
            transition.duration_secs,
            transition.counters.round,
            transition.counters.cycle
        );
        self.state.phase = transition.phase;
        self.state.current_round = transition.counters.round;
        self.state.current_cycle = transition.counters.cycle;
        self.state.clock = Some(clock);
        self.state.remaining_ms_when_paused = 0;
        self.state.cue_guard.rearm();
    }

    fn complete(&mut self, transition: Transition) {
        self.state.phase = Phase::Completed;
        self.state.current_round = transition.counters.round;
        self.state.current_cycle = transition.counters.cycle;
        self.state.clock = None;
        self.state.running = false;
        self.state.remaining_ms_when_paused = 0;
        log_info!(
            "session {} completed",
            self.state.session_id.as_deref().unwrap_or("-")
        );
    }

    fn cue(&self, kind: CueKind, at: DateTime<Utc>) -> Cue {
        Cue {
            kind,
            phase: self.state.phase,
            round: self.state.current_round,
            cycle: self.state.current_cycle,
            at,
        }
    }
}
