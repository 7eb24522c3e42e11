//! Translation mode content scripts.
//!
//! Enabling makes every link inert (original targets kept in a side table in
//! the page), forces text selection on and installs tap and selection
//! handlers that post the chosen text as a `textSelected` page message.
//! Both scripts are guarded by `window._translationModeEnabled`, so they can
//! be sent any number of times: only the first enable after a disable (or a
//! fresh document) changes the page.

use tracing::{debug, warn};

use crate::surface::RenderSurface;
use crate::types::errors::SurfaceError;

/// Page message carrying a tapped word or the current selection.
pub const MESSAGE_NAME: &str = "textSelected";

pub const ENABLE_SCRIPT: &str = include_str!("../../resources/scripts/translation_enable.js");
pub const DISABLE_SCRIPT: &str = include_str!("../../resources/scripts/translation_disable.js");

/// Sends the translation mode scripts to a surface.
pub struct TranslationModeInjector;

impl TranslationModeInjector {
    /// Registers the page message handler. Called once per surface.
    pub fn install(surface: &mut dyn RenderSurface) {
        surface.add_message_handler(MESSAGE_NAME);
    }

    pub fn enable(surface: &mut dyn RenderSurface) -> Result<(), SurfaceError> {
        debug!(surface = surface.id().0, "translation mode enable");
        surface.evaluate_script(ENABLE_SCRIPT)
    }

    pub fn disable(surface: &mut dyn RenderSurface) -> Result<(), SurfaceError> {
        debug!(surface = surface.id().0, "translation mode disable");
        surface.evaluate_script(DISABLE_SCRIPT)
    }

    /// Enables or disables, logging rather than returning a failure.
    pub fn apply(surface: &mut dyn RenderSurface, enabled: bool) {
        let result = if enabled {
            Self::enable(surface)
        } else {
            Self::disable(surface)
        };
        if let Err(e) = result {
            warn!(surface = surface.id().0, error = %e, "translation mode script failed");
        }
    }
}

/// Characters that extend a tapped word. Apostrophes and hyphens keep
/// contractions and hyphenated compounds whole.
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '\'' || c == '-'
}

/// Word around character offset `offset`, using the same expansion as the
/// page tap handler. Returns `None` when the offset touches no word char.
pub fn word_at(text: &str, offset: usize) -> Option<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let offset = offset.min(chars.len());

    let mut start = offset;
    while start > 0 && is_word_char(chars[start - 1].1) {
        start -= 1;
    }
    let mut end = offset;
    while end < chars.len() && is_word_char(chars[end].1) {
        end += 1;
    }
    if start >= end {
        return None;
    }

    let byte_start = chars[start].0;
    let byte_end = chars.get(end).map_or(text.len(), |(i, _)| *i);
    Some(&text[byte_start..byte_end])
}
