use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;

use log::warn;
use rodio::{OutputStream, Sink};

use super::{beep::Beep, Feedback};

enum AudioCommand {
    Beep,
}

/// Plays feedback tones on a dedicated thread, since rodio's output stream
/// is not `Send`. The thread and output device are created on first use.
pub struct AudioFeedback {
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl AudioFeedback {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-feedback".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(output) => output,
                    Err(err) => {
                        warn!("No audio output for feedback: {err}");
                        return;
                    }
                };

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Beep => match Sink::try_new(&handle) {
                            Ok(sink) => {
                                sink.append(Beep::detection());
                                sink.detach();
                            }
                            Err(err) => warn!("Failed to create audio sink: {err}"),
                        },
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for AudioFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Feedback for AudioFeedback {
    fn detection_beep(&self) {
        let result = self
            .ensure_thread()
            .and_then(|tx| tx.send(AudioCommand::Beep).map_err(|e| e.to_string()));
        if let Err(err) = result {
            warn!("Detection beep failed: {err}");
        }
    }
}
