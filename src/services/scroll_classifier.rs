//! Scroll offset → chrome visibility signal.
//!
//! Near the top of the page the chrome is always shown. Further down, the
//! direction only flips once the offset has moved more than `threshold`
//! since the last reported change, so small jitters never toggle it.

use crate::types::settings::ChromeSettings;
use crate::types::tab::ScrollDirection;

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollClassifier {
    top_zone: f64,
    threshold: f64,
    last_y: f64,
}

impl ScrollClassifier {
    pub fn new(top_zone: f64, threshold: f64) -> Self {
        Self {
            top_zone,
            threshold,
            last_y: 0.0,
        }
    }

    pub fn from_settings(settings: &ChromeSettings) -> Self {
        Self::new(settings.top_zone, settings.scroll_threshold)
    }

    /// Offset recorded at the last direction change.
    pub fn last_y(&self) -> f64 {
        self.last_y
    }

    pub fn classify(&mut self, y: f64) -> ScrollDirection {
        if y <= self.top_zone {
            self.last_y = y;
            return ScrollDirection::Up;
        }

        let delta = y - self.last_y;
        if delta > self.threshold {
            self.last_y = y;
            ScrollDirection::Down
        } else if delta < -self.threshold {
            self.last_y = y;
            ScrollDirection::Up
        } else {
            ScrollDirection::None
        }
    }

    /// Runs a whole offset sequence through a fresh classifier.
    pub fn classify_all(top_zone: f64, threshold: f64, offsets: &[f64]) -> Vec<ScrollDirection> {
        let mut classifier = Self::new(top_zone, threshold);
        offsets.iter().map(|y| classifier.classify(*y)).collect()
    }

    pub fn reset(&mut self) {
        self.last_y = 0.0;
    }
}

impl Default for ScrollClassifier {
    fn default() -> Self {
        Self::from_settings(&ChromeSettings::default())
    }
}
