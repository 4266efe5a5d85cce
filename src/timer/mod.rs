pub mod clock;
pub mod commands;
pub mod config;
pub mod controller;
pub mod events;
pub mod format;
pub mod session;
pub mod state;
pub mod transitions;

pub use clock::{compute_remaining, Clock, ManualClock, PhaseClock, SystemClock};
pub use config::{ConfigPatch, SessionConfig, TimerMode};
pub use controller::TimerController;
pub use events::{Cue, CueKind, TimerEvent};
pub use format::format_clock;
pub use session::{ConfigureOutcome, Session};
pub use state::{Phase, SessionState, TimerSnapshot};
pub use transitions::{next_phase, total_duration_secs, Counters, Transition};
