use serde::{Deserialize, Serialize};

/// Everything persisted about a browsing session: the ordered tab URLs and
/// which of them was active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub urls: Vec<String>,
    pub active_index: usize,
}

impl SessionSnapshot {
    /// The stored active index pulled into `[0, urls.len() - 1]`.
    ///
    /// Returns `None` for an empty session.
    pub fn clamped_active_index(&self) -> Option<usize> {
        if self.urls.is_empty() {
            None
        } else {
            Some(self.active_index.min(self.urls.len() - 1))
        }
    }
}
