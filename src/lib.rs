pub mod audio;
pub mod settings;
pub mod timer;
mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use std::io::BufRead;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};

use audio::CuePlayerHandle;
use settings::{CueSettings, SettingsStore};
use timer::{
    commands::{execute, parse_command, CommandReply, CueChange},
    ConfigureOutcome, CueKind, Phase, Session, TimerController, TimerEvent, TimerSnapshot,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

const SETTINGS_PATH_ENV: &str = "INTERVAL_TIMER_SETTINGS";
const DEFAULT_SETTINGS_FILE: &str = "interval_timer_settings.json";

const HELP: &str = "commands: start | pause | toggle | reset | status | mode <stopwatch|amrap|tabata> | \
set <prepare|cap|amrap|work|rest|rounds|cycles|cycle-rest> <secs or M:SS> | volume <0-1> | cues <on|off> | quit";

pub fn settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

/// One status line for the terminal display.
pub fn format_status(snapshot: &TimerSnapshot) -> String {
    let mut line = format!(
        "[{}] {:<19} {:>6}  {:>3.0}%",
        snapshot.mode.as_str(),
        snapshot.phase.as_str(),
        snapshot.display,
        snapshot.progress * 100.0
    );

    if let (Some(round), Some(rounds), Some(cycle), Some(cycles)) = (
        snapshot.current_round,
        snapshot.total_rounds,
        snapshot.current_cycle,
        snapshot.total_cycles,
    ) {
        line.push_str(&format!("  round {round}/{rounds}  cycle {cycle}/{cycles}"));
    }

    if snapshot.paused {
        line.push_str("  (paused)");
    }
    line
}

async fn render_events(mut events: broadcast::Receiver<TimerEvent>) {
    loop {
        match events.recv().await {
            Ok(TimerEvent::Heartbeat(snapshot)) => println!("{}", format_status(&snapshot)),
            Ok(TimerEvent::Cue(cue)) => match cue.kind {
                CueKind::FinalSecond => {}
                CueKind::PhaseChange => println!(">> {}", cue.phase.as_str()),
                CueKind::Completed => println!(">> session complete"),
            },
            Ok(TimerEvent::StateChanged(_)) => {}
            Err(RecvError::Lagged(skipped)) => {
                log_warn!("display lagged; skipped {skipped} timer events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<std::io::Result<String>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

/// Save the mode and the config the next session will use, including a
/// change still waiting for reset.
async fn remember(settings: &SettingsStore, controller: &TimerController) {
    let mode = controller.mode().await;
    let config = controller.next_config().await;
    if let Err(err) = settings.update_timer(mode, config) {
        log_error!("failed to save timer settings: {err:#}");
    }
}

fn apply_cue_change(
    settings: &SettingsStore,
    player: &CuePlayerHandle,
    change: CueChange,
) -> Result<CueSettings> {
    let mut cues = settings.timer().cues;
    match change {
        CueChange::Volume(volume) => cues.volume = volume,
        CueChange::Enabled(enabled) => cues.enabled = enabled,
    }
    settings.update_cues(cues)?;

    let cues = settings.timer().cues;
    player.set_enabled(cues.enabled);
    player
        .set_volume(cues.volume)
        .map_err(anyhow::Error::msg)
        .context("failed to update cue volume")?;
    Ok(cues)
}

pub async fn run() -> Result<()> {
    // Reads RUST_LOG, defaulting to info.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log_info!("Interval timer starting up...");

    let settings = SettingsStore::new(settings_path())?;
    let initial = settings.timer();
    log_info!(
        "Loaded {} settings from {}",
        initial.mode.as_str(),
        settings.path().display()
    );

    let controller = TimerController::new(Session::new(initial.mode, initial.config));
    let player = CuePlayerHandle::new(&initial.cues);
    let cue_task = tokio::spawn(audio::play_cues(controller.subscribe(), player.clone()));
    let display_task = tokio::spawn(render_events(controller.subscribe()));

    println!("{HELP}");
    println!("{}", format_status(&controller.get_snapshot().await));

    let mut lines = spawn_stdin_reader()?;
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                let line = line.context("failed to read command from stdin")?;
                if line.trim().is_empty() {
                    continue;
                }

                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err:#}");
                        continue;
                    }
                };

                match execute(&controller, command).await {
                    CommandReply::Quit => break,
                    CommandReply::Snapshot(snapshot) => {
                        if snapshot.phase == Phase::Idle {
                            remember(&settings, &controller).await;
                        }
                        println!("{}", format_status(&snapshot));
                    }
                    CommandReply::Configured(outcome, snapshot) => {
                        if outcome == ConfigureOutcome::Deferred {
                            println!("saved; takes effect after reset");
                        }
                        remember(&settings, &controller).await;
                        println!("{}", format_status(&snapshot));
                    }
                    CommandReply::ModeChanged(_, snapshot) => {
                        remember(&settings, &controller).await;
                        println!("{}", format_status(&snapshot));
                    }
                    CommandReply::Cues(change) => match apply_cue_change(&settings, &player, change) {
                        Ok(cues) => println!(
                            "cues {} at {:.0}% volume",
                            if cues.enabled { "on" } else { "off" },
                            cues.volume * 100.0
                        ),
                        Err(err) => log_error!("failed to save cue settings: {err:#}"),
                    },
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log_info!("Interrupted; stopping timer");
                break;
            }
        }
    }

    controller.reset().await;
    remember(&settings, &controller).await;
    controller.shutdown().await;
    drop(controller);

    display_task.abort();
    if let Err(err) = cue_task.await {
        log_warn!("cue player task ended abnormally: {err}");
    }

    log_info!("Interval timer stopped");
    Ok(())
}
