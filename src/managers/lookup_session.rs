//! Word lookup state for the current selection.
//!
//! Holds what the translation consumer shows for the selected text: the
//! dictionary entry, the explanation and a follow-up chat. Backend calls are
//! not made here. Operations hand back a [`LookupRequest`] which the caller
//! runs off the owner thread with [`LookupRequest::run`] and feeds back
//! through [`LookupSession::complete`]. Results for a selection that has
//! since been replaced are discarded.

use tracing::debug;

use crate::services::explain_client::ExplainService;
use crate::services::speech::SpeechService;
use crate::types::ai::{ChatMessage, ExplainKind};
use crate::types::errors::ExplainError;
use crate::types::settings::TranslationSettings;

/// Assistant greeting placed after the context message in every chat request.
const CHAT_GREETING: &str = "Ask me anything about this text!";

/// Completion of one utterance started by [`LookupSession::speak_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechFinished {
    pub utterance: u64,
}

/// A backend call to make on behalf of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub generation: u64,
    pub kind: ExplainKind,
    pub text: String,
    pub messages: Vec<ChatMessage>,
}

/// Result of a [`LookupRequest`].
#[derive(Debug)]
pub struct LookupOutcome {
    pub generation: u64,
    pub kind: ExplainKind,
    pub result: Result<String, ExplainError>,
}

impl LookupRequest {
    pub async fn run(self, service: &dyn ExplainService) -> LookupOutcome {
        let result = match self.kind {
            ExplainKind::Dictionary => service.dictionary(&self.text).await,
            ExplainKind::Explain => service.explain(&self.text).await,
            ExplainKind::Chat => service.chat(&self.messages).await,
        };
        LookupOutcome {
            generation: self.generation,
            kind: self.kind,
            result,
        }
    }
}

#[derive(Debug, Default)]
pub struct LookupSession {
    settings: TranslationSettings,
    generation: u64,
    selected_text: String,
    dictionary: Option<String>,
    explanation: Option<String>,
    error_message: Option<String>,
    chat: Vec<ChatMessage>,
    loading_dictionary: bool,
    loading_explanation: bool,
    loading_chat: bool,
    utterance: u64,
    /// Utterance currently being spoken.
    speaking: Option<u64>,
}

impl LookupSession {
    pub fn new(settings: TranslationSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn selected_text(&self) -> &str {
        &self.selected_text
    }

    pub fn dictionary(&self) -> Option<&str> {
        self.dictionary.as_deref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Inline message shown when the explanation could not be fetched.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn chat_messages(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn is_loading(&self) -> bool {
        self.loading_dictionary || self.loading_explanation || self.loading_chat
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.is_some()
    }

    /// Forgets everything, including the selection.
    pub fn reset(&mut self) {
        self.clear_results();
        self.selected_text.clear();
    }

    fn clear_results(&mut self) {
        self.generation += 1;
        self.dictionary = None;
        self.explanation = None;
        self.error_message = None;
        self.chat.clear();
        self.loading_dictionary = false;
        self.loading_explanation = false;
        self.loading_chat = false;
    }

    fn request(&self, kind: ExplainKind, text: &str, messages: Vec<ChatMessage>) -> LookupRequest {
        LookupRequest {
            generation: self.generation,
            kind,
            text: text.to_string(),
            messages,
        }
    }

    /// Replaces the selection. Empty text resets the session; a single short
    /// word also asks for a dictionary entry.
    pub fn set_selected_text(&mut self, text: &str) -> Option<LookupRequest> {
        if text.is_empty() {
            self.reset();
            return None;
        }

        self.clear_results();
        self.selected_text = text.to_string();

        let is_word = !text.contains(' ') && text.chars().count() <= self.settings.dictionary_max_chars;
        if is_word {
            self.loading_dictionary = true;
            Some(self.request(ExplainKind::Dictionary, text, Vec::new()))
        } else {
            None
        }
    }

    /// Asks for an explanation of the selection.
    pub fn fetch_explanation(&mut self) -> Option<LookupRequest> {
        if self.selected_text.is_empty() || self.loading_explanation {
            return None;
        }
        self.loading_explanation = true;
        self.error_message = None;
        Some(self.request(ExplainKind::Explain, &self.selected_text, Vec::new()))
    }

    /// Appends a user question and builds the chat request: a context
    /// message with the selection and explanation, a greeting, then the
    /// whole conversation so far.
    pub fn send_chat(&mut self, input: &str) -> Option<LookupRequest> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }
        self.chat.push(ChatMessage::user(question));
        self.loading_chat = true;

        let context = format!(
            "[Selected text]\n{}\n\n[Explanation]\n{}",
            self.selected_text,
            self.explanation.as_deref().unwrap_or("")
        );
        let mut messages = vec![ChatMessage::user(context), ChatMessage::assistant(CHAT_GREETING)];
        messages.extend(self.chat.iter().cloned());

        Some(self.request(ExplainKind::Chat, "", messages))
    }

    /// Applies a finished request. Returns false if it was stale.
    pub fn complete(&mut self, outcome: LookupOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(kind = ?outcome.kind, "stale lookup result dropped");
            return false;
        }

        match (outcome.kind, outcome.result) {
            (ExplainKind::Dictionary, Ok(entry)) => {
                self.loading_dictionary = false;
                self.dictionary = Some(entry);
            }
            (ExplainKind::Dictionary, Err(e)) => {
                // Best effort; nothing is shown.
                self.loading_dictionary = false;
                debug!(error = %e, "dictionary lookup failed");
            }
            (ExplainKind::Explain, Ok(text)) => {
                self.loading_explanation = false;
                self.explanation = Some(text);
            }
            (ExplainKind::Explain, Err(e)) => {
                self.loading_explanation = false;
                self.error_message = Some(e.to_string());
            }
            (ExplainKind::Chat, Ok(reply)) => {
                self.loading_chat = false;
                self.chat.push(ChatMessage::assistant(reply));
            }
            (ExplainKind::Chat, Err(e)) => {
                self.loading_chat = false;
                self.chat.push(ChatMessage::assistant(format!("Error: {}", e)));
            }
        }
        true
    }

    /// Reads the selection aloud. `is_speaking` stays set until the matching
    /// [`SpeechFinished`] is applied with [`speech_finished`](Self::speech_finished)
    /// or [`stop_speaking`](Self::stop_speaking) is called.
    ///
    /// `on_done` may run on any thread; it should hand the value back to the
    /// owner thread.
    pub fn speak_selection<F>(&mut self, speech: &mut dyn SpeechService, on_done: F) -> bool
    where
        F: FnOnce(SpeechFinished) + Send + 'static,
    {
        if self.selected_text.is_empty() {
            return false;
        }
        self.utterance += 1;
        let utterance = self.utterance;
        self.speaking = Some(utterance);
        speech.speak(
            &self.selected_text,
            &self.settings.speech_language,
            Box::new(move || on_done(SpeechFinished { utterance })),
        );
        true
    }

    /// Applies a completion. Returns false if a newer utterance has started
    /// since, or speech was stopped.
    pub fn speech_finished(&mut self, done: SpeechFinished) -> bool {
        if self.speaking != Some(done.utterance) {
            debug!(utterance = done.utterance, "stale speech completion dropped");
            return false;
        }
        self.speaking = None;
        true
    }

    pub fn stop_speaking(&mut self, speech: &mut dyn SpeechService) {
        speech.stop();
        self.speaking = None;
    }
}
