use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{Phase, TimerSnapshot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CueKind {
    /// The active phase has one second left.
    FinalSecond,
    /// A new phase just began.
    PhaseChange,
    /// The session reached `Completed`.
    Completed,
}

/// Audio/haptic trigger produced by the session. The session only reports
/// cues; whoever drives it decides how to play them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    pub kind: CueKind,
    pub phase: Phase,
    pub round: u32,
    pub cycle: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    Heartbeat(TimerSnapshot),
    Cue(Cue),
}
