//! Text-to-speech boundary.
//!
//! Speaking is fire-and-forget: the caller hands over a completion callback
//! and carries on. Starting a new utterance stops the previous one.

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Called once when an utterance ends on its own.
pub type SpeechDone = Box<dyn FnOnce() + Send + 'static>;

pub trait SpeechService {
    fn speak(&mut self, text: &str, language: &str, on_done: SpeechDone);
    /// Stops the current utterance. Its completion callback may still fire if
    /// it was already running.
    fn stop(&mut self);
}

/// Speaks through an external synthesizer process (`espeak-ng` style CLI).
///
/// Outside a tokio runtime, or when the program cannot be started, the
/// utterance completes immediately.
pub struct CommandSpeech {
    program: String,
    current: Option<JoinHandle<()>>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: None,
        }
    }
}

impl SpeechService for CommandSpeech {
    fn speak(&mut self, text: &str, language: &str, on_done: SpeechDone) {
        self.stop();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, speech skipped");
            on_done();
            return;
        };
        let _entered = runtime.enter();

        let child = Command::new(&self.program)
            .arg("-v")
            .arg(language)
            .arg(text)
            .kill_on_drop(true)
            .spawn();

        match child {
            Ok(mut child) => {
                debug!(program = %self.program, language, "speaking");
                self.current = Some(runtime.spawn(async move {
                    if let Err(e) = child.wait().await {
                        warn!(error = %e, "speech process failed");
                    }
                    on_done();
                }));
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "speech unavailable");
                on_done();
            }
        }
    }

    fn stop(&mut self) {
        // Aborting drops the child, which kills it.
        if let Some(task) = self.current.take() {
            task.abort();
        }
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.stop();
    }
}
