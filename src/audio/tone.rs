use std::f32::consts::PI;
use std::time::Duration;

use crate::timer::CueKind;

const SAMPLE_RATE: u32 = 44100;
const FADE_SAMPLES: usize = 220; // ~5ms, avoids clicks at the edges

/// Short mono sine beep used for timer cues.
#[derive(Debug, Clone)]
pub struct CueTone {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    total_samples: usize,
    num_sample: usize,
}

impl CueTone {
    pub fn new(frequency: f32, duration: Duration, volume: f32) -> Self {
        let total_samples = (duration.as_secs_f32() * SAMPLE_RATE as f32) as usize;
        Self {
            frequency,
            amplitude: 0.3 * volume.clamp(0.0, 1.0),
            sample_rate: SAMPLE_RATE,
            total_samples,
            num_sample: 0,
        }
    }

    pub fn for_cue(kind: CueKind, volume: f32) -> Self {
        match kind {
            CueKind::FinalSecond => Self::new(880.0, Duration::from_millis(120), volume),
            CueKind::PhaseChange => Self::new(1320.0, Duration::from_millis(350), volume),
            CueKind::Completed => Self::new(660.0, Duration::from_millis(900), volume),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.total_samples as f32 / self.sample_rate as f32)
    }

    fn envelope(&self) -> f32 {
        let from_start = self.num_sample;
        let to_end = self.total_samples.saturating_sub(self.num_sample);
        let edge = from_start.min(to_end).min(FADE_SAMPLES);
        edge as f32 / FADE_SAMPLES as f32
    }
}

impl Iterator for CueTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / self.sample_rate as f32;
        let sample = (2.0 * PI * self.frequency * t).sin() * self.amplitude * self.envelope();
        self.num_sample += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total_samples - self.num_sample.min(self.total_samples);
        (left, Some(left))
    }
}

#[cfg(feature = "audio")]
impl rodio::Source for CueTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample.min(self.total_samples))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}
