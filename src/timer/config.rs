use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const PREPARE_SECS: RangeInclusive<u32> = 0..=60;
pub const TIME_CAP_SECS: RangeInclusive<u32> = 5..=3600;
pub const AMRAP_SECS: RangeInclusive<u32> = 5..=3600;
pub const INTERVAL_SECS: RangeInclusive<u32> = 1..=300;
pub const REPEAT_COUNT: RangeInclusive<u32> = 1..=99;
pub const REST_BETWEEN_CYCLES_SECS: RangeInclusive<u32> = 0..=300;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Stopwatch,
    Amrap,
    Tabata,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Stopwatch => "stopwatch",
            TimerMode::Amrap => "amrap",
            TimerMode::Tabata => "tabata",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stopwatch" | "for-time" | "fortime" => Some(TimerMode::Stopwatch),
            "amrap" => Some(TimerMode::Amrap),
            "tabata" | "intervals" => Some(TimerMode::Tabata),
            _ => None,
        }
    }
}

/// User-facing timer parameters. Every field is kept inside its bound; values
/// coming from the outside go through [`SessionConfig::clamped`] or
/// [`SessionConfig::merged`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub prepare_seconds: u32,
    pub time_cap_seconds: u32,
    pub amrap_seconds: u32,
    pub work_seconds: u32,
    pub rest_seconds: u32,
    pub rounds: u32,
    pub cycles: u32,
    pub rest_between_cycles_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prepare_seconds: 10,
            time_cap_seconds: 1200,
            amrap_seconds: 600,
            work_seconds: 20,
            rest_seconds: 10,
            rounds: 8,
            cycles: 1,
            rest_between_cycles_seconds: 0,
        }
    }
}

impl SessionConfig {
    /// Pull every field back inside its documented bound.
    pub fn clamped(self) -> Self {
        Self {
            prepare_seconds: clamp_u32(self.prepare_seconds, &PREPARE_SECS),
            time_cap_seconds: clamp_u32(self.time_cap_seconds, &TIME_CAP_SECS),
            amrap_seconds: clamp_u32(self.amrap_seconds, &AMRAP_SECS),
            work_seconds: clamp_u32(self.work_seconds, &INTERVAL_SECS),
            rest_seconds: clamp_u32(self.rest_seconds, &INTERVAL_SECS),
            rounds: clamp_u32(self.rounds, &REPEAT_COUNT),
            cycles: clamp_u32(self.cycles, &REPEAT_COUNT),
            rest_between_cycles_seconds: clamp_u32(
                self.rest_between_cycles_seconds,
                &REST_BETWEEN_CYCLES_SECS,
            ),
        }
    }

    pub fn merged(self, patch: &ConfigPatch) -> Self {
        let pick = |current: u32, value: Option<i64>, bounds: &RangeInclusive<u32>| {
            value.map_or(current, |v| clamp_i64(v, bounds))
        };

        Self {
            prepare_seconds: pick(self.prepare_seconds, patch.prepare_seconds, &PREPARE_SECS),
            time_cap_seconds: pick(self.time_cap_seconds, patch.time_cap_seconds, &TIME_CAP_SECS),
            amrap_seconds: pick(self.amrap_seconds, patch.amrap_seconds, &AMRAP_SECS),
            work_seconds: pick(self.work_seconds, patch.work_seconds, &INTERVAL_SECS),
            rest_seconds: pick(self.rest_seconds, patch.rest_seconds, &INTERVAL_SECS),
            rounds: pick(self.rounds, patch.rounds, &REPEAT_COUNT),
            cycles: pick(self.cycles, patch.cycles, &REPEAT_COUNT),
            rest_between_cycles_seconds: pick(
                self.rest_between_cycles_seconds,
                patch.rest_between_cycles_seconds,
                &REST_BETWEEN_CYCLES_SECS,
            ),
        }
        .clamped()
    }

    /// Length of the main work period for the given mode.
    pub fn work_duration(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Stopwatch => self.time_cap_seconds,
            TimerMode::Amrap => self.amrap_seconds,
            TimerMode::Tabata => self.work_seconds,
        }
    }
}

/// Partial update coming from the UI. Values are signed so that negative input
/// clamps to the lower bound instead of being rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub prepare_seconds: Option<i64>,
    pub time_cap_seconds: Option<i64>,
    pub amrap_seconds: Option<i64>,
    pub work_seconds: Option<i64>,
    pub rest_seconds: Option<i64>,
    pub rounds: Option<i64>,
    pub cycles: Option<i64>,
    pub rest_between_cycles_seconds: Option<i64>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp_u32(value: u32, bounds: &RangeInclusive<u32>) -> u32 {
    value.clamp(*bounds.start(), *bounds.end())
}

fn clamp_i64(value: i64, bounds: &RangeInclusive<u32>) -> u32 {
    // Both bounds fit in u32, so the clamped value does too.
    value.clamp(i64::from(*bounds.start()), i64::from(*bounds.end())) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_within_bounds() {
        let config = SessionConfig::default();
        assert_eq!(config, config.clamped());
    }

    #[test]
    fn clamped_pulls_out_of_range_fields_back() {
        let config = SessionConfig {
            prepare_seconds: 500,
            time_cap_seconds: 0,
            amrap_seconds: 10_000,
            work_seconds: 0,
            rest_seconds: 301,
            rounds: 0,
            cycles: 1000,
            rest_between_cycles_seconds: 999,
        }
        .clamped();

        assert_eq!(config.prepare_seconds, 60);
        assert_eq!(config.time_cap_seconds, 5);
        assert_eq!(config.amrap_seconds, 3600);
        assert_eq!(config.work_seconds, 1);
        assert_eq!(config.rest_seconds, 300);
        assert_eq!(config.rounds, 1);
        assert_eq!(config.cycles, 99);
        assert_eq!(config.rest_between_cycles_seconds, 300);
    }

    #[test]
    fn merge_only_touches_supplied_fields() {
        let patch = ConfigPatch {
            work_seconds: Some(45),
            rounds: Some(-4),
            ..ConfigPatch::default()
        };
        let merged = SessionConfig::default().merged(&patch);

        assert_eq!(merged.work_seconds, 45);
        assert_eq!(merged.rounds, 1);
        assert_eq!(merged.rest_seconds, SessionConfig::default().rest_seconds);
        assert_eq!(merged.prepare_seconds, SessionConfig::default().prepare_seconds);
    }

    #[test]
    fn deserializing_partial_config_fills_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"workSeconds": 40}"#).unwrap();
        assert_eq!(config.work_seconds, 40);
        assert_eq!(config.rounds, 8);
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!(TimerMode::parse("Tabata"), Some(TimerMode::Tabata));
        assert_eq!(TimerMode::parse(" amrap "), Some(TimerMode::Amrap));
        assert_eq!(TimerMode::parse("for-time"), Some(TimerMode::Stopwatch));
        assert_eq!(TimerMode::parse("emom"), None);
    }
}
