use anyhow::{anyhow, bail, Context, Result};

use super::{
    config::{ConfigPatch, TimerMode},
    session::ConfigureOutcome,
    state::TimerSnapshot,
    TimerController,
};

/// A request from the hosting UI, parsed from one line of text.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerCommand {
    Start,
    Pause,
    Toggle,
    Reset,
    Status,
    SetMode(TimerMode),
    Configure(ConfigPatch),
    Cues(CueChange),
    Quit,
}

/// Cue preference change. The host owns the settings store and the player,
/// so it applies these itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CueChange {
    Volume(f32),
    Enabled(bool),
}

#[derive(Debug, Clone)]
pub enum CommandReply {
    Snapshot(TimerSnapshot),
    Configured(ConfigureOutcome, TimerSnapshot),
    ModeChanged(bool, TimerSnapshot),
    Cues(CueChange),
    Quit,
}

pub fn parse_command(line: &str) -> Result<TimerCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "start" | "resume" => TimerCommand::Start,
        "pause" => TimerCommand::Pause,
        "toggle" | "t" => TimerCommand::Toggle,
        "reset" | "r" => TimerCommand::Reset,
        "status" | "s" => TimerCommand::Status,
        "quit" | "exit" | "q" => TimerCommand::Quit,
        "mode" => {
            let name = words.next().ok_or_else(|| anyhow!("usage: mode <stopwatch|amrap|tabata>"))?;
            let mode = TimerMode::parse(name).ok_or_else(|| anyhow!("unknown mode '{name}'"))?;
            TimerCommand::SetMode(mode)
        }
        "set" => {
            let field = words.next().ok_or_else(|| anyhow!("usage: set <field> <value>"))?;
            let raw = words.next().ok_or_else(|| anyhow!("missing value for '{field}'"))?;
            let value = parse_value(raw).with_context(|| format!("invalid value for '{field}'"))?;
            TimerCommand::Configure(patch_for(field, value)?)
        }
        "volume" | "vol" => {
            let raw = words.next().ok_or_else(|| anyhow!("usage: volume <0-1>"))?;
            let volume: f32 = raw.parse().context("volume must be a number between 0 and 1")?;
            if !volume.is_finite() {
                bail!("volume must be a number between 0 and 1");
            }
            TimerCommand::Cues(CueChange::Volume(volume))
        }
        "cues" | "sound" => {
            let enabled = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("on") => true,
                Some("off") => false,
                _ => bail!("usage: cues <on|off>"),
            };
            TimerCommand::Cues(CueChange::Enabled(enabled))
        }
        other => bail!("unknown command '{other}'"),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected argument '{extra}'");
    }
    Ok(command)
}

/// Accepts plain seconds (`45`) or `M:SS` (`1:30`).
fn parse_value(raw: &str) -> Result<i64> {
    match raw.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: i64 = minutes.parse().context("minutes must be a number")?;
            let seconds: i64 = seconds.parse().context("seconds must be a number")?;
            if !(0..60).contains(&seconds) {
                bail!("seconds must be between 0 and 59");
            }
            // Huge values saturate and are then clamped by the session config.
            Ok(minutes.saturating_mul(60).saturating_add(seconds))
        }
        None => raw.parse().context("expected a number"),
    }
}

fn patch_for(field: &str, value: i64) -> Result<ConfigPatch> {
    let mut patch = ConfigPatch::default();
    match field.to_ascii_lowercase().as_str() {
        "prepare" => patch.prepare_seconds = Some(value),
        "cap" | "timecap" | "time-cap" => patch.time_cap_seconds = Some(value),
        "amrap" => patch.amrap_seconds = Some(value),
        "work" => patch.work_seconds = Some(value),
        "rest" => patch.rest_seconds = Some(value),
        "rounds" => patch.rounds = Some(value),
        "cycles" => patch.cycles = Some(value),
        "cycle-rest" | "cyclerest" => patch.rest_between_cycles_seconds = Some(value),
        other => bail!("unknown setting '{other}'"),
    }
    Ok(patch)
}

pub async fn execute(controller: &TimerController, command: TimerCommand) -> CommandReply {
    match command {
        TimerCommand::Start => CommandReply::Snapshot(controller.start().await),
        TimerCommand::Pause => CommandReply::Snapshot(controller.pause().await),
        TimerCommand::Toggle => CommandReply::Snapshot(controller.toggle().await),
        TimerCommand::Reset => CommandReply::Snapshot(controller.reset().await),
        TimerCommand::Status => CommandReply::Snapshot(controller.get_snapshot().await),
        TimerCommand::SetMode(mode) => {
            let changed = controller.set_mode(mode).await;
            CommandReply::ModeChanged(changed, controller.get_snapshot().await)
        }
        TimerCommand::Configure(patch) => {
            let outcome = controller.configure(&patch).await;
            CommandReply::Configured(outcome, controller.get_snapshot().await)
        }
        TimerCommand::Cues(change) => CommandReply::Cues(change),
        TimerCommand::Quit => CommandReply::Quit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Session, SessionConfig};

    #[test]
    fn parses_lifecycle_verbs() {
        assert_eq!(parse_command("start").unwrap(), TimerCommand::Start);
        assert_eq!(parse_command("  PAUSE ").unwrap(), TimerCommand::Pause);
        assert_eq!(parse_command("t").unwrap(), TimerCommand::Toggle);
        assert_eq!(parse_command("q").unwrap(), TimerCommand::Quit);
    }

    #[test]
    fn parses_mode_and_settings() {
        assert_eq!(
            parse_command("mode tabata").unwrap(),
            TimerCommand::SetMode(TimerMode::Tabata)
        );

        let TimerCommand::Configure(patch) = parse_command("set amrap 12:30").unwrap() else {
            panic!("expected a configure command");
        };
        assert_eq!(patch.amrap_seconds, Some(750));
        assert_eq!(patch.work_seconds, None);

        let TimerCommand::Configure(patch) = parse_command("set cycle-rest -5").unwrap() else {
            panic!("expected a configure command");
        };
        assert_eq!(patch.rest_between_cycles_seconds, Some(-5));
    }

    #[test]
    fn parses_cue_preferences() {
        assert_eq!(
            parse_command("volume 0.25").unwrap(),
            TimerCommand::Cues(CueChange::Volume(0.25))
        );
        assert_eq!(
            parse_command("cues OFF").unwrap(),
            TimerCommand::Cues(CueChange::Enabled(false))
        );
        assert_eq!(
            parse_command("sound on").unwrap(),
            TimerCommand::Cues(CueChange::Enabled(true))
        );
        assert!(parse_command("volume loud").is_err());
        assert!(parse_command("volume NaN").is_err());
        assert!(parse_command("cues maybe").is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("jump").is_err());
        assert!(parse_command("mode emom").is_err());
        assert!(parse_command("set work").is_err());
        assert!(parse_command("set speed 3").is_err());
        assert!(parse_command("set work 1:75").is_err());
        assert!(parse_command("start now").is_err());
    }

    #[test]
    fn huge_minutes_saturate_instead_of_overflowing() {
        let TimerCommand::Configure(patch) = parse_command("set work 999999999999999999:00").unwrap() else {
            panic!("expected a configure command");
        };
        assert_eq!(patch.work_seconds, Some(i64::MAX));
        assert_eq!(SessionConfig::default().merged(&patch).work_seconds, 300);

        let TimerCommand::Configure(patch) = parse_command("set work -999999999999999999:30").unwrap() else {
            panic!("expected a configure command");
        };
        assert_eq!(patch.work_seconds, Some(i64::MIN + 30));

        let config = SessionConfig::default().merged(&patch);
        assert_eq!(config.work_seconds, 1);
    }

    #[tokio::test]
    async fn execute_clamps_configured_values() {
        let controller = TimerController::new(Session::new(TimerMode::Tabata, SessionConfig::default()));
        let command = parse_command("set rounds 500").unwrap();

        let CommandReply::Configured(outcome, snapshot) = execute(&controller, command).await else {
            panic!("expected a configured reply");
        };
        assert_eq!(outcome, ConfigureOutcome::Applied);
        assert_eq!(snapshot.total_rounds, Some(99));
        assert_eq!(snapshot.current_round, Some(99));
    }
}
