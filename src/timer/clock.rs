use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Granularity of the periodic tick driving the session.
pub const TICK_INTERVAL_MS: u64 = 100;

/// Source of wall-clock time for the controller.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whole seconds left until `end`, rounded up and floored at zero.
///
/// Rounding up means the display only shows `0` once the full phase has
/// actually elapsed.
pub fn compute_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    ceil_secs(remaining_ms(end, now))
}

pub fn remaining_ms(end: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (end - now).num_milliseconds().max(0) as u64
}

pub fn ceil_secs(ms: u64) -> u32 {
    u32::try_from(ms.div_ceil(1000)).unwrap_or(u32::MAX)
}

/// Countdown for the active phase, anchored to an absolute end instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseClock {
    end: DateTime<Utc>,
    total_secs: u32,
}

impl PhaseClock {
    pub fn starting_at(now: DateTime<Utc>, total_secs: u32) -> Self {
        Self {
            end: now + Duration::seconds(i64::from(total_secs)),
            total_secs,
        }
    }

    /// Resume a paused phase with `remaining_ms` left out of `total_secs`.
    pub fn resuming_at(now: DateTime<Utc>, remaining_ms: u64, total_secs: u32) -> Self {
        let remaining_ms = remaining_ms.min(u64::from(total_secs) * 1000);
        Self {
            end: now + Duration::milliseconds(remaining_ms as i64),
            total_secs,
        }
    }

    /// The clock for the next phase. It starts where this one ended rather
    /// than at the tick that noticed the expiry, so late ticks never add drift.
    pub fn followed_by(&self, total_secs: u32) -> Self {
        Self {
            end: self.end + Duration::seconds(i64::from(total_secs)),
            total_secs,
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    /// Milliseconds left, never negative and never more than the phase length.
    /// A wall clock that jumped backwards reads as "no time has passed yet".
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        remaining_ms(self.end, now).min(u64::from(self.total_secs) * 1000)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        ceil_secs(self.remaining_ms(now))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }

    pub fn has_clock_skew(&self, now: DateTime<Utc>) -> bool {
        remaining_ms(self.end, now) > u64::from(self.total_secs) * 1000
    }

    /// Fraction of the phase already elapsed, in `[0, 1]`.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        progress_ratio(self.total_secs, self.remaining_ms(now))
    }
}

pub fn progress_ratio(total_secs: u32, remaining_ms: u64) -> f64 {
    if total_secs == 0 {
        return 1.0;
    }
    let total_ms = f64::from(total_secs) * 1000.0;
    ((total_ms - remaining_ms as f64) / total_ms).clamp(0.0, 1.0)
}

/// Fires the "last second" cue at most once per phase.
///
/// The cue fires on the first tick whose ceiling-rounded remaining time reads
/// `1`, so it sounds as the display shows the final second rather than when
/// the phase actually ends. A tick that arrives late still fires it as long as
/// the phase has not ended yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CueGuard {
    final_second_fired: bool,
}

impl CueGuard {
    /// Returns true exactly once per phase, on the first observation of the
    /// display reaching `1`.
    pub fn should_fire_final_second(&mut self, remaining_secs: u32) -> bool {
        if remaining_secs == 1 && !self.final_second_fired {
            self.final_second_fired = true;
            return true;
        }
        false
    }

    pub fn rearm(&mut self) {
        self.final_second_fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn remaining_rounds_up() {
        let end = t0() + Duration::seconds(10);
        assert_eq!(compute_remaining(end, t0()), 10);
        assert_eq!(compute_remaining(end, t0() + Duration::milliseconds(1)), 10);
        assert_eq!(compute_remaining(end, t0() + Duration::milliseconds(9_001)), 1);
        assert_eq!(compute_remaining(end, t0() + Duration::seconds(10)), 0);
        assert_eq!(compute_remaining(end, t0() + Duration::seconds(30)), 0);
    }

    #[test]
    fn backwards_clock_reads_as_full_phase() {
        let clock = PhaseClock::starting_at(t0(), 20);
        let earlier = t0() - Duration::seconds(45);

        assert!(clock.has_clock_skew(earlier));
        assert_eq!(clock.remaining_secs(earlier), 20);
        assert_eq!(clock.progress(earlier), 0.0);
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let clock = PhaseClock::starting_at(t0(), 10);
        assert_eq!(clock.progress(t0()), 0.0);
        assert!((clock.progress(t0() + Duration::seconds(5)) - 0.5).abs() < 1e-9);
        assert_eq!(clock.progress(t0() + Duration::seconds(11)), 1.0);
    }

    #[test]
    fn followed_by_anchors_to_previous_end() {
        let first = PhaseClock::starting_at(t0(), 20);
        let second = first.followed_by(10);
        assert_eq!(second.end(), t0() + Duration::seconds(30));
        assert_eq!(second.total_secs(), 10);
    }

    #[test]
    fn resuming_never_exceeds_phase_length() {
        let clock = PhaseClock::resuming_at(t0(), 99_000, 10);
        assert_eq!(clock.remaining_secs(t0()), 10);
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(t0());
        assert_eq!(clock.now(), t0());
        clock.advance(Duration::milliseconds(1500));
        assert_eq!(clock.now(), t0() + Duration::milliseconds(1500));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn final_second_cue_fires_once() {
        let mut guard = CueGuard::default();
        assert!(!guard.should_fire_final_second(2));
        assert!(guard.should_fire_final_second(1));
        assert!(!guard.should_fire_final_second(1));
        guard.rearm();
        assert!(guard.should_fire_final_second(1));
    }
}
