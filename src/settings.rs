use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::timer::{SessionConfig, TimerMode};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CueSettings {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.6,
        }
    }
}

impl CueSettings {
    fn clamped(self) -> Self {
        Self {
            volume: if self.volume.is_finite() {
                self.volume.clamp(0.0, 1.0)
            } else {
                CueSettings::default().volume
            },
            ..self
        }
    }
}

/// Last-used timer setup, remembered between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    pub mode: TimerMode,
    pub config: SessionConfig,
    pub cues: CueSettings,
}

impl TimerSettings {
    fn clamped(self) -> Self {
        Self {
            mode: self.mode,
            config: self.config.clamped(),
            cues: self.cues.clamped(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TimerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            load_from(&path)?
        } else {
            TimerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timer(&self) -> TimerSettings {
        self.read().clone()
    }

    pub fn update_timer(&self, mode: TimerMode, config: SessionConfig) -> Result<()> {
        let mut guard = self.write();
        guard.mode = mode;
        guard.config = config.clamped();
        self.persist(&guard)
    }

    pub fn update_cues(&self, cues: CueSettings) -> Result<()> {
        let mut guard = self.write();
        guard.cues = cues.clamped();
        self.persist(&guard)
    }

    fn persist(&self, data: &TimerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, TimerSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TimerSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_from(path: &Path) -> Result<TimerSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let data = match serde_json::from_str::<TimerSettings>(&contents) {
        Ok(data) => data,
        Err(err) => {
            log_warn!(
                "Ignoring unreadable settings at {}: {err}; using defaults",
                path.display()
            );
            TimerSettings::default()
        }
    };
    Ok(data.clamped())
}
