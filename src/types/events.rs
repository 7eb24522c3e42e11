//! Change notification plumbing.
//!
//! Entities expose `subscribe`/`unsubscribe` and emit structured events. An
//! aggregate re-emits its children's events by subscribing to them
//! explicitly when it takes ownership and unsubscribing when it lets go.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::tab::{ScrollDirection, TabChange, TabId};

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listeners<E> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener<E>)>,
}

/// Multi-listener event emitter. Cloning yields another handle to the same
/// listener list.
pub struct EventEmitter<E> {
    inner: Arc<Mutex<Listeners<E>>>,
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(guard.next_id);
        guard.next_id += 1;
        guard.entries.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.entries.len();
        guard.entries.retain(|(sid, _)| *sid != id);
        guard.entries.len() != before
    }

    /// Calls every listener. The listener list is copied first, so a
    /// listener may subscribe or unsubscribe without deadlocking.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a presentation layer needs to observe from the tab manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// A tab was added to or removed from the collection.
    TabsChanged { count: usize },
    ActiveTabChanged { tab_id: TabId },
    OverviewVisibilityChanged { visible: bool },
    TranslationModeChanged { enabled: bool },
    /// A field on an owned tab changed.
    TabChanged(TabChange),
    Scroll { tab_id: TabId, direction: ScrollDirection },
    SelectedText { tab_id: TabId, text: String },
}
