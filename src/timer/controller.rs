use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    clock::{Clock, SystemClock, TICK_INTERVAL_MS},
    config::{ConfigPatch, SessionConfig, TimerMode},
    events::{Cue, TimerEvent},
    session::{ConfigureOutcome, Session},
    state::TimerSnapshot,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const EVENT_CAPACITY: usize = 256;

/// Everything the ticker task needs, cloned into it on spawn.
#[derive(Clone)]
struct Shared {
    session: Arc<Mutex<Session>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<TimerEvent>,
}

impl Shared {
    async fn advance(&self) -> (Vec<Cue>, TimerSnapshot) {
        let (cues, snapshot) = {
            let mut session = self.session.lock().await;
            let now = self.clock.now();
            let cues = session.tick(now);
            (cues, session.snapshot(now))
        };

        if !cues.is_empty() {
            self.publish_cues(&cues);
            self.emit(TimerEvent::StateChanged(snapshot.clone()));
        }
        (cues, snapshot)
    }

    fn publish_cues(&self, cues: &[Cue]) {
        for cue in cues {
            log_debug!("cue {:?} entering {}", cue.kind, cue.phase.as_str());
            self.emit(TimerEvent::Cue(cue.clone()));
        }
    }

    fn emit(&self, event: TimerEvent) {
        // No subscribers is fine; the UI may not be listening yet.
        let _ = self.events.send(event);
    }
}

/// Periodic tick registration. Dropping it stops the task.
struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Ticker {
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Async front of a [`Session`]: owns the tick task and broadcasts
/// [`TimerEvent`]s to whoever renders the timer.
#[derive(Clone)]
pub struct TimerController {
    shared: Shared,
    ticker: Arc<Mutex<Option<Ticker>>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
}

impl TimerController {
    pub fn new(session: Session) -> Self {
        Self::with_clock(session, Arc::new(SystemClock))
    }

    pub fn with_clock(session: Session, clock: Arc<dyn Clock>) -> Self {
        let debug_mode = std::env::var("INTERVAL_TIMER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Shared {
                session: Arc::new(Mutex::new(session)),
                clock,
                events,
            },
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_heartbeat_every(mut self, ticks: u32) -> Self {
        self.heartbeat_every_ticks = ticks.max(1);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.shared.events.subscribe()
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        let session = self.shared.session.lock().await;
        session.snapshot(self.shared.clock.now())
    }

    pub async fn mode(&self) -> TimerMode {
        self.shared.session.lock().await.mode()
    }

    pub async fn config(&self) -> SessionConfig {
        *self.shared.session.lock().await.config()
    }

    /// Config the next session starts with: a deferred change when one is
    /// waiting for reset, otherwise the active config.
    pub async fn next_config(&self) -> SessionConfig {
        let session = self.shared.session.lock().await;
        session.pending_config().copied().unwrap_or(*session.config())
    }

    pub async fn configure(&self, patch: &ConfigPatch) -> ConfigureOutcome {
        let outcome = self.shared.session.lock().await.configure(patch);
        self.emit_state_changed().await;
        outcome
    }

    pub async fn set_mode(&self, mode: TimerMode) -> bool {
        let changed = self.shared.session.lock().await.set_mode(mode);
        if changed {
            self.release_ticker().await;
            self.emit_state_changed().await;
        }
        changed
    }

    /// Start from idle or resume after a pause.
    pub async fn start(&self) -> TimerSnapshot {
        let (cues, running) = {
            let mut session = self.shared.session.lock().await;
            let cues = session.start(self.shared.clock.now());
            (cues, session.is_running())
        };

        if running {
            self.spawn_ticker().await;
        } else {
            self.release_ticker().await;
        }

        self.shared.publish_cues(&cues);
        self.emit_state_changed().await
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let cues = {
            let mut session = self.shared.session.lock().await;
            session.pause(self.shared.clock.now())
        };
        self.release_ticker().await;
        self.shared.publish_cues(&cues);
        self.emit_state_changed().await
    }

    pub async fn toggle(&self) -> TimerSnapshot {
        let running = self.shared.session.lock().await.is_running();
        if running {
            self.pause().await
        } else {
            self.start().await
        }
    }

    pub async fn reset(&self) -> TimerSnapshot {
        self.shared.session.lock().await.reset();
        self.release_ticker().await;
        self.emit_state_changed().await
    }

    /// Advance the session to the clock's current time. The ticker calls this
    /// on every interval; hosts may call it directly as well.
    pub async fn tick(&self) -> Vec<Cue> {
        let (cues, snapshot) = self.shared.advance().await;
        if !snapshot.running {
            self.release_ticker().await;
        }
        cues
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .map(Ticker::is_active)
            .unwrap_or(false)
    }

    pub async fn shutdown(&self) {
        self.release_ticker().await;
        log_info!("timer controller shut down");
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard.as_ref().is_some_and(Ticker::is_active) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            self.shared.clone(),
            self.tick_interval,
            self.heartbeat_every_ticks,
            cancel.clone(),
        ));
        log_debug!("ticker started ({}ms)", self.tick_interval.as_millis());

        // Replacing a finished ticker drops it, which cancels it.
        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn release_ticker(&self) {
        if self.ticker.lock().await.take().is_some() {
            log_debug!("ticker released");
        }
    }

    async fn emit_state_changed(&self) -> TimerSnapshot {
        let snapshot = self.get_snapshot().await;
        self.shared.emit(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }
}

async fn tick_loop(
    shared: Shared,
    tick_interval: Duration,
    heartbeat_every: u32,
    cancel: CancellationToken,
) {
    let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => {
                log_debug!("ticker cancelled");
                break;
            }
        }

        let (_, snapshot) = shared.advance().await;
        if !snapshot.running {
            log_info!("ticker stopping: session no longer running");
            break;
        }

        ticks = ticks.wrapping_add(1);
        if ticks % heartbeat_every == 0 {
            shared.emit(TimerEvent::Heartbeat(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{
        clock::ManualClock,
        events::CueKind,
        state::Phase,
    };
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn controller(mode: TimerMode, config: SessionConfig) -> (TimerController, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 2, 18, 0, 0).unwrap());
        let controller = TimerController::with_clock(Session::new(mode, config), Arc::new(clock.clone()))
            .with_tick_interval(Duration::from_secs(3600));
        (controller, clock)
    }

    fn drain(rx: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn amrap(secs: u32) -> SessionConfig {
        SessionConfig {
            prepare_seconds: 0,
            amrap_seconds: secs,
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn start_acquires_ticker_and_publishes_cue() {
        let (controller, _clock) = controller(TimerMode::Amrap, amrap(60));
        let mut rx = controller.subscribe();

        let snapshot = controller.start().await;
        assert_eq!(snapshot.phase, Phase::Work);
        assert!(snapshot.running);
        assert!(controller.is_ticking().await);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            TimerEvent::Cue(cue) if cue.kind == CueKind::PhaseChange && cue.phase == Phase::Work
        )));
        assert!(matches!(events.last(), Some(TimerEvent::StateChanged(_))));
    }

    #[tokio::test]
    async fn pause_and_reset_release_ticker() {
        let (controller, clock) = controller(TimerMode::Amrap, amrap(60));
        controller.start().await;

        clock.advance(ChronoDuration::seconds(20));
        let paused = controller.pause().await;
        assert!(paused.paused);
        assert_eq!(paused.remaining_secs, 40);
        assert!(!controller.is_ticking().await);

        clock.advance(ChronoDuration::minutes(10));
        let resumed = controller.toggle().await;
        assert!(resumed.running);
        assert_eq!(resumed.remaining_secs, 40);
        assert!(controller.is_ticking().await);

        let reset = controller.reset().await;
        assert_eq!(reset.phase, Phase::Idle);
        assert!(!controller.is_ticking().await);
    }

    #[tokio::test]
    async fn completion_releases_ticker() {
        let (controller, clock) = controller(TimerMode::Amrap, amrap(30));
        let mut rx = controller.subscribe();
        controller.start().await;

        clock.advance(ChronoDuration::seconds(30));
        let cues = controller.tick().await;

        assert_eq!(cues.last().map(|c| c.kind), Some(CueKind::Completed));
        assert_eq!(controller.get_snapshot().await.phase, Phase::Completed);
        assert!(!controller.is_ticking().await);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TimerEvent::Cue(cue) if cue.kind == CueKind::Completed)));
    }

    #[tokio::test]
    async fn configure_during_session_is_deferred() {
        let (controller, _clock) = controller(TimerMode::Amrap, amrap(30));
        controller.start().await;

        let outcome = controller
            .configure(&ConfigPatch {
                amrap_seconds: Some(90),
                ..ConfigPatch::default()
            })
            .await;
        assert_eq!(outcome, ConfigureOutcome::Deferred);
        assert_eq!(controller.config().await.amrap_seconds, 30);
        assert_eq!(controller.next_config().await.amrap_seconds, 90);

        controller.reset().await;
        assert_eq!(controller.config().await.amrap_seconds, 90);
        assert_eq!(controller.next_config().await.amrap_seconds, 90);
    }

    #[tokio::test]
    async fn switching_mode_stops_running_session() {
        let (controller, _clock) = controller(TimerMode::Amrap, amrap(30));
        controller.start().await;

        assert!(controller.set_mode(TimerMode::Tabata).await);
        assert_eq!(controller.mode().await, TimerMode::Tabata);
        assert!(!controller.is_ticking().await);
        assert_eq!(controller.get_snapshot().await.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn ticker_drives_session_in_real_time() {
        let controller = TimerController::new(Session::new(
            TimerMode::Amrap,
            SessionConfig {
                prepare_seconds: 0,
                amrap_seconds: 5,
                ..SessionConfig::default()
            },
        ))
        .with_tick_interval(Duration::from_millis(10))
        .with_heartbeat_every(1);
        let mut rx = controller.subscribe();

        controller.start().await;
        time::sleep(Duration::from_millis(60)).await;
        controller.shutdown().await;

        assert!(!controller.is_ticking().await);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TimerEvent::Heartbeat(_))));
    }
}
