pub mod tone;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::settings::CueSettings;
use crate::timer::{CueKind, TimerEvent};

pub use tone::CueTone;

enum AudioCommand {
    Play(CueKind),
    SetVolume(f32),
    Stop,
}

/// Plays cue tones on a dedicated audio thread. Without the `audio` feature
/// the thread only logs which tone would have played. Clones share the thread.
#[derive(Clone)]
pub struct CuePlayerHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    enabled: Arc<AtomicBool>,
    initial_volume: f32,
}

impl CuePlayerHandle {
    pub fn new(settings: &CueSettings) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            enabled: Arc::new(AtomicBool::new(settings.enabled)),
            initial_volume: settings.volume.clamp(0.0, 1.0),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let mut volume = self.initial_volume;

        // Output stream objects are not Send, so they live on this thread only.
        thread::Builder::new()
            .name("cue-audio".to_string())
            .spawn(move || {
                #[cfg(feature = "audio")]
                let mut output = playback::Output::default();

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(kind) => {
                            let tone = CueTone::for_cue(kind, volume);
                            #[cfg(feature = "audio")]
                            output.play(tone);
                            #[cfg(not(feature = "audio"))]
                            log::debug!("cue {:?} ({:?} tone, audio output disabled)", kind, tone.duration());
                        }
                        AudioCommand::SetVolume(v) => {
                            volume = v.clamp(0.0, 1.0);
                        }
                        AudioCommand::Stop => {
                            #[cfg(feature = "audio")]
                            output.stop();
                            break;
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    pub fn play(&self, kind: CueKind) -> Result<(), String> {
        if !self.is_enabled() {
            return Ok(());
        }
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play(kind)).map_err(|e| e.to_string())
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::SetVolume(volume))
            .map_err(|e| e.to_string())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn stop(&self) -> Result<(), String> {
        if let Ok(Some(tx)) = self.tx.lock().map(|mut g| g.take()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }
}

/// Forward every cue on the timer event stream to the player until the
/// stream closes.
pub async fn play_cues(mut events: broadcast::Receiver<TimerEvent>, player: CuePlayerHandle) {
    loop {
        match events.recv().await {
            Ok(TimerEvent::Cue(cue)) => {
                if let Err(err) = player.play(cue.kind) {
                    log::error!("failed to play {:?} cue: {err}", cue.kind);
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("cue player lagged; skipped {skipped} timer events");
            }
            Err(RecvError::Closed) => break,
        }
    }
    let _ = player.stop();
}

#[cfg(feature = "audio")]
mod playback {
    use log::error;
    use rodio::{OutputStream, Sink};

    use super::CueTone;

    #[derive(Default)]
    pub(super) struct Output {
        stream: Option<OutputStream>,
        sink: Option<Sink>,
    }

    impl Output {
        fn ensure_sink(&mut self) -> Result<&Sink, String> {
            if self.sink.is_none() {
                let (stream, handle) = OutputStream::try_default()
                    .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                let sink = Sink::try_new(&handle)
                    .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                self.stream = Some(stream);
                self.sink = Some(sink);
            }
            self.sink
                .as_ref()
                .ok_or_else(|| "audio sink unavailable".to_string())
        }

        pub(super) fn play(&mut self, tone: CueTone) {
            match self.ensure_sink() {
                Ok(sink) => sink.append(tone),
                Err(err) => error!("{err}"),
            }
        }

        pub(super) fn stop(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
            self.stream = None;
        }
    }
}
