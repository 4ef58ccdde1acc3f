//! espeak-ng backend
//!
//! Speaks one sentence per `espeak-ng` process so sentence boundaries are
//! observable. Pause kills the running process and resume restarts the
//! same sentence from its beginning.
//!
//! **Parameter mapping:**
//! - rate 1.0 = 175 words per minute (espeak default), clamped to 80..=450
//! - pitch 0..=2 maps onto espeak's 0..=99 (1.0 = 50)
//! - volume 0..=1 maps onto amplitude 0..=200

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};

use readion_common::VoiceInfo;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::events::{SynthesisEvent, SynthesisEventSender};
use super::synthesizer::{SpeechSynthesizer, Utterance, UtteranceId};

/// Binary looked up on PATH when none is configured
pub const DEFAULT_ESPEAK_BINARY: &str = "espeak-ng";

const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Control signal for the task speaking the current utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Cancel,
}

/// How a spoken utterance came to an end
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Finished,
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
struct ActiveUtterance {
    id: UtteranceId,
    control: watch::Sender<Control>,
    paused: bool,
}

#[derive(Debug, Default)]
struct EspeakState {
    events: Option<SynthesisEventSender>,
    current: Option<ActiveUtterance>,
    voices: Vec<VoiceInfo>,
}

/// Synthesizer driving the `espeak-ng` command line tool
#[derive(Debug, Clone)]
pub struct EspeakSynthesizer {
    binary: String,
    available: bool,
    state: Arc<Mutex<EspeakState>>,
}

impl EspeakSynthesizer {
    /// Check the binary once; a missing binary makes the backend
    /// unavailable rather than failing construction
    pub fn new(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        let available = std::process::Command::new(&binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if available {
            info!("Using speech binary: {}", binary);
        } else {
            warn!("Speech binary '{}' not found or not working", binary);
        }

        Self {
            binary,
            available,
            state: Arc::new(Mutex::new(EspeakState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EspeakState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enumerate voices in the background and announce them
    fn refresh_voices(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; voice list stays empty");
            return;
        };

        let binary = self.binary.clone();
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            let output = Command::new(&binary)
                .arg("--voices")
                .stderr(Stdio::null())
                .output()
                .await;

            let voices = match output {
                Ok(output) if output.status.success() => {
                    parse_voice_list(&String::from_utf8_lossy(&output.stdout))
                }
                Ok(output) => {
                    warn!("{} --voices exited with {}", binary, output.status);
                    return;
                }
                Err(e) => {
                    warn!("Failed to list voices: {}", e);
                    return;
                }
            };

            debug!("Enumerated {} voices", voices.len());
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            state.voices = voices;
            if let Some(events) = &state.events {
                let _ = events.send(SynthesisEvent::VoicesChanged);
            }
        });
    }

    fn send_control(&self, control: Control) -> bool {
        let mut state = self.lock();
        match state.current.as_mut() {
            Some(active) => {
                active.paused = control == Control::Pause;
                let _ = active.control.send(control);
                true
            }
            None => false,
        }
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_ESPEAK_BINARY)
    }
}

impl SpeechSynthesizer for EspeakSynthesizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn attach(&self, events: SynthesisEventSender) {
        self.lock().events = Some(events);
        if self.available {
            self.refresh_voices();
        }
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.lock().voices.clone()
    }

    fn speak(&self, utterance: Utterance) {
        self.cancel();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("No async runtime; cannot speak utterance {}", utterance.id);
            if let Some(events) = &self.lock().events {
                let _ = events.send(SynthesisEvent::Failed {
                    utterance_id: utterance.id,
                    message: "no async runtime".to_string(),
                });
            }
            return;
        };

        let (control_tx, control_rx) = watch::channel(Control::Run);
        let events = {
            let mut state = self.lock();
            state.current = Some(ActiveUtterance {
                id: utterance.id,
                control: control_tx,
                paused: false,
            });
            state.events.clone()
        };

        let binary = self.binary.clone();
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            let id = utterance.id;
            let outcome = speak_sentences(&binary, &utterance, control_rx, events.as_ref()).await;

            // Clear our slot unless a newer utterance already took it
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            if state.current.as_ref().map(|a| a.id) == Some(id) {
                state.current = None;
            }
            drop(state);

            let event = match outcome {
                Outcome::Finished => SynthesisEvent::Ended { utterance_id: id },
                Outcome::Failed(message) => SynthesisEvent::Failed {
                    utterance_id: id,
                    message,
                },
                Outcome::Cancelled => return,
            };
            if let Some(events) = &events {
                let _ = events.send(event);
            }
        });
    }

    fn cancel(&self) {
        let previous = self.lock().current.take();
        if let Some(active) = previous {
            debug!("Cancelling utterance {}", active.id);
            let _ = active.control.send(Control::Cancel);
        }
    }

    fn pause(&self) {
        self.send_control(Control::Pause);
    }

    fn resume(&self) {
        self.send_control(Control::Run);
    }

    fn is_speaking(&self) -> bool {
        self.lock().current.is_some()
    }

    fn is_paused(&self) -> bool {
        self.lock().current.as_ref().map(|a| a.paused).unwrap_or(false)
    }
}

/// Speak every sentence of `utterance`, one process each
async fn speak_sentences(
    binary: &str,
    utterance: &Utterance,
    mut control: watch::Receiver<Control>,
    events: Option<&SynthesisEventSender>,
) -> Outcome {
    let mut index = 0;

    while index < utterance.sentences.len() {
        // Hold here while paused
        loop {
            let current = *control.borrow_and_update();
            match current {
                Control::Run => break,
                Control::Cancel => return Outcome::Cancelled,
                Control::Pause => {
                    if control.changed().await.is_err() {
                        return Outcome::Cancelled;
                    }
                }
            }
        }

        let mut child = match Command::new(binary)
            .args(command_args(utterance, &utterance.sentences[index]))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to start {}: {}", binary, e);
                return Outcome::Failed(format!("failed to start {}: {}", binary, e));
            }
        };

        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        error!("{} exited with {}", binary, status);
                        return Outcome::Failed(format!("{} exited with {}", binary, status));
                    }
                    Err(e) => {
                        error!("Failed waiting for {}: {}", binary, e);
                        return Outcome::Failed(format!("failed waiting for {}: {}", binary, e));
                    }
                }
            }
            changed = control.changed() => {
                let _ = child.kill().await;
                if changed.is_err() || *control.borrow() == Control::Cancel {
                    return Outcome::Cancelled;
                }
                // Paused mid-sentence: the sentence replays on resume
                continue;
            }
        }

        index += 1;
        if index < utterance.sentences.len() {
            if let Some(events) = events {
                let _ = events.send(SynthesisEvent::SentenceBoundary {
                    utterance_id: utterance.id,
                });
            }
        }
    }

    Outcome::Finished
}

/// Full argument list for speaking one sentence
///
/// `--` ends option parsing so a sentence starting with `-` is spoken,
/// not read as a flag.
fn command_args(utterance: &Utterance, sentence: &str) -> Vec<String> {
    let mut args = espeak_args(utterance);
    args.push("--".to_string());
    args.push(sentence.to_string());
    args
}

/// Command line options for the utterance's playback parameters
fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let words_per_minute = (utterance.rate * BASE_WORDS_PER_MINUTE).clamp(80.0, 450.0);
    let pitch = (utterance.pitch * 50.0).clamp(0.0, 99.0);
    let amplitude = (utterance.volume * 200.0).clamp(0.0, 200.0);

    let mut args = vec![
        "-s".to_string(),
        format!("{}", words_per_minute.round() as u32),
        "-p".to_string(),
        format!("{}", pitch.round() as u32),
        "-a".to_string(),
        format!("{}", amplitude.round() as u32),
    ];

    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.id.clone());
    }

    args
}

/// Parse `espeak-ng --voices` output
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
/// ```
fn parse_voice_list(output: &str) -> Vec<VoiceInfo> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _priority = fields.next()?;
            let language = fields.next()?;
            let _age_gender = fields.next()?;
            let name = fields.next()?;

            Some(VoiceInfo {
                id: language.to_string(),
                name: name.replace('_', " "),
                language: language.to_string(),
                is_default: language == "en",
            })
        })
        .collect()
}
