use super::config::{SessionConfig, TimerMode};
use super::state::Phase;

/// Round and cycle counters. Both count down to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub round: u32,
    pub cycle: u32,
}

impl Counters {
    pub fn full(config: &SessionConfig) -> Self {
        Self {
            round: config.rounds,
            cycle: config.cycles,
        }
    }
}

/// The phase to enter next, how long it lasts and the counters it runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub phase: Phase,
    pub duration_secs: u32,
    pub counters: Counters,
}

impl Transition {
    fn to(phase: Phase, duration_secs: u32, counters: Counters) -> Self {
        Self {
            phase,
            duration_secs,
            counters,
        }
    }
}

pub fn next_phase(
    mode: TimerMode,
    current: Phase,
    counters: Counters,
    config: &SessionConfig,
) -> Transition {
    let work = config.work_duration(mode);

    match current {
        Phase::Idle => {
            let counters = Counters::full(config);
            if config.prepare_seconds > 0 {
                Transition::to(Phase::Prepare, config.prepare_seconds, counters)
            } else {
                Transition::to(Phase::Work, work, counters)
            }
        }
        Phase::Prepare => Transition::to(Phase::Work, work, counters),
        Phase::Completed => Transition::to(Phase::Completed, 0, counters),
        _ if mode != TimerMode::Tabata => Transition::to(Phase::Completed, 0, counters),
        Phase::Work => Transition::to(Phase::Rest, config.rest_seconds, counters),
        Phase::Rest => after_rest(counters, config),
        Phase::RestBetweenCycles => Transition::to(Phase::Work, work, counters),
    }
}

fn after_rest(counters: Counters, config: &SessionConfig) -> Transition {
    if counters.round > 1 {
        let counters = Counters {
            round: counters.round - 1,
            ..counters
        };
        return Transition::to(Phase::Work, config.work_seconds, counters);
    }

    if counters.cycle > 1 {
        let counters = Counters {
            round: config.rounds,
            cycle: counters.cycle - 1,
        };
        if config.rest_between_cycles_seconds > 0 {
            return Transition::to(
                Phase::RestBetweenCycles,
                config.rest_between_cycles_seconds,
                counters,
            );
        }
        return Transition::to(Phase::Work, config.work_seconds, counters);
    }

    Transition::to(Phase::Completed, 0, counters)
}

/// Sum of every phase a full session passes through, preparation included.
pub fn total_duration_secs(mode: TimerMode, config: &SessionConfig) -> u64 {
    let main = match mode {
        TimerMode::Stopwatch => u64::from(config.time_cap_seconds),
        TimerMode::Amrap => u64::from(config.amrap_seconds),
        TimerMode::Tabata => {
            let rounds = u64::from(config.rounds);
            let cycles = u64::from(config.cycles);
            let interval = u64::from(config.work_seconds) + u64::from(config.rest_seconds);
            rounds * cycles * interval
                + cycles.saturating_sub(1) * u64::from(config.rest_between_cycles_seconds)
        }
    };
    u64::from(config.prepare_seconds) + main
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabata(rounds: u32, cycles: u32, between: u32) -> SessionConfig {
        SessionConfig {
            prepare_seconds: 0,
            work_seconds: 20,
            rest_seconds: 10,
            rounds,
            cycles,
            rest_between_cycles_seconds: between,
            ..SessionConfig::default()
        }
    }

    fn walk(mode: TimerMode, config: &SessionConfig) -> Vec<Transition> {
        let mut out = Vec::new();
        let mut step = next_phase(mode, Phase::Idle, Counters::full(config), config);
        while step.phase != Phase::Completed {
            out.push(step);
            step = next_phase(mode, step.phase, step.counters, config);
        }
        out.push(step);
        out
    }

    #[test]
    fn idle_enters_prepare_when_configured() {
        let config = SessionConfig::default();
        let step = next_phase(TimerMode::Amrap, Phase::Idle, Counters::full(&config), &config);
        assert_eq!(step.phase, Phase::Prepare);
        assert_eq!(step.duration_secs, 10);
    }

    #[test]
    fn idle_skips_prepare_when_zero() {
        let config = tabata(3, 2, 0);
        let step = next_phase(TimerMode::Tabata, Phase::Idle, Counters::full(&config), &config);
        assert_eq!(step.phase, Phase::Work);
        assert_eq!(step.duration_secs, 20);
        assert_eq!(step.counters, Counters { round: 3, cycle: 2 });
    }

    #[test]
    fn amrap_work_goes_straight_to_completed() {
        let config = SessionConfig::default();
        let phases: Vec<Phase> = walk(TimerMode::Amrap, &config)
            .iter()
            .map(|t| t.phase)
            .collect();
        assert_eq!(phases, vec![Phase::Prepare, Phase::Work, Phase::Completed]);
    }

    #[test]
    fn stopwatch_work_lasts_the_time_cap() {
        let config = SessionConfig {
            prepare_seconds: 0,
            ..SessionConfig::default()
        };
        let steps = walk(TimerMode::Stopwatch, &config);
        assert_eq!(steps[0].duration_secs, config.time_cap_seconds);
        assert_eq!(steps[1].phase, Phase::Completed);
    }

    #[test]
    fn last_work_is_followed_by_a_rest() {
        let config = tabata(1, 1, 0);
        let phases: Vec<Phase> = walk(TimerMode::Tabata, &config)
            .iter()
            .map(|t| t.phase)
            .collect();
        assert_eq!(phases, vec![Phase::Work, Phase::Rest, Phase::Completed]);
    }

    #[test]
    fn rest_between_cycles_resets_rounds() {
        let config = tabata(2, 2, 15);
        let steps = walk(TimerMode::Tabata, &config);
        let between: Vec<&Transition> = steps
            .iter()
            .filter(|t| t.phase == Phase::RestBetweenCycles)
            .collect();

        assert_eq!(between.len(), 1);
        assert_eq!(between[0].duration_secs, 15);
        assert_eq!(between[0].counters, Counters { round: 2, cycle: 1 });
    }

    #[test]
    fn totals_match_walked_durations() {
        for (mode, config) in [
            (TimerMode::Stopwatch, SessionConfig::default()),
            (TimerMode::Amrap, SessionConfig::default()),
            (TimerMode::Tabata, tabata(3, 2, 15)),
            (TimerMode::Tabata, tabata(4, 3, 0)),
        ] {
            let walked: u64 = walk(mode, &config)
                .iter()
                .map(|t| u64::from(t.duration_secs))
                .sum();
            assert_eq!(walked, total_duration_secs(mode, &config), "{mode:?}");
        }
    }
}
