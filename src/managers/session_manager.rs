//! Session persistence.
//!
//! A session is the ordered list of open tab URLs plus the active index,
//! stored as full snapshots (never deltas) under two stable keys. Writes from
//! rapid navigation are coalesced by [`SaveDebouncer`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::services::key_value_store::KeyValueStore;
use crate::types::errors::SessionError;
use crate::types::session::SessionSnapshot;

/// Key holding the JSON array of tab URLs.
pub const SAVED_TAB_URLS_KEY: &str = "savedTabUrls";
/// Key holding the active tab index as a decimal integer.
pub const ACTIVE_TAB_INDEX_KEY: &str = "activeTabIndex";

/// Trait defining session persistence operations.
pub trait SessionStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError>;
    /// `Ok(None)` when nothing (or an empty tab list) was saved.
    fn restore(&self) -> Result<Option<SessionSnapshot>, SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// [`SessionStore`] over any [`KeyValueStore`].
pub struct KeyValueSessionStore {
    store: Box<dyn KeyValueStore>,
}

impl KeyValueSessionStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl SessionStore for KeyValueSessionStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        let urls = serde_json::to_string(&snapshot.urls)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        let index = snapshot.active_index.to_string();
        self.store.set_many(&[
            (SAVED_TAB_URLS_KEY, urls.as_str()),
            (ACTIVE_TAB_INDEX_KEY, index.as_str()),
        ])?;
        debug!(tabs = snapshot.urls.len(), active = snapshot.active_index, "session saved");
        Ok(())
    }

    fn restore(&self) -> Result<Option<SessionSnapshot>, SessionError> {
        let Some(raw_urls) = self.store.get(SAVED_TAB_URLS_KEY)? else {
            return Ok(None);
        };
        let urls: Vec<String> = serde_json::from_str(&raw_urls).map_err(|e| {
            SessionError::Serialization(format!("Corrupt {}: {}", SAVED_TAB_URLS_KEY, e))
        })?;
        if urls.is_empty() {
            return Ok(None);
        }

        let active_index = match self.store.get(ACTIVE_TAB_INDEX_KEY)? {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                SessionError::Serialization(format!("Corrupt {}: {}", ACTIVE_TAB_INDEX_KEY, e))
            })?,
            None => 0,
        };

        Ok(Some(SessionSnapshot { urls, active_index }))
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.store.remove(SAVED_TAB_URLS_KEY)?;
        self.store.remove(ACTIVE_TAB_INDEX_KEY)?;
        Ok(())
    }
}

/// Restartable one-shot timer for debounced saves.
///
/// Holds only a deadline; the owner loop sleeps until [`deadline`] and then
/// calls [`take_due`].
///
/// [`deadline`]: SaveDebouncer::deadline
/// [`take_due`]: SaveDebouncer::take_due
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Starts or restarts the quiet period from `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if now >= d)
    }

    /// Returns true, and disarms, if the deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}
