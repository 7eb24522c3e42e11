//! Tab collection, active tab and session persistence.
//!
//! All methods run on the owner thread. Surface callbacks arrive as queued
//! [`SurfaceMessage`]s and are applied through [`TabManager::handle_surface_message`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::session_manager::{SaveDebouncer, SessionStore};
use super::tab::Tab;
use super::tab_coordinator::{CoordinatorAction, TabCoordinator};
use crate::services::translation_mode::TranslationModeInjector;
use crate::surface::{SurfaceDispatch, SurfaceFactory, SurfaceMessage};
use crate::types::errors::{SessionError, TabError};
use crate::types::events::{BrowserEvent, EventEmitter, SubscriptionId};
use crate::types::session::SessionSnapshot;
use crate::types::settings::{BrowserSettings, ChromeSettings};
use crate::types::tab::{TabId, TabState};

/// Trait defining the tab management interface.
pub trait TabManagerTrait {
    fn initialize(&mut self);
    fn add_tab(&mut self, url: Option<&str>) -> TabId;
    fn close_tab(&mut self, tab_id: TabId) -> Result<(), TabError>;
    fn switch_to_tab(&mut self, tab_id: TabId) -> Result<(), TabError>;
    fn open_tab_overview(&mut self);
    fn close_tab_overview(&mut self);
    fn select_from_overview(&mut self, tab_id: TabId) -> Result<(), TabError>;
    fn set_translation_mode(&mut self, enabled: bool);
    fn get_tab(&self, tab_id: TabId) -> Option<&Tab>;
    fn active_tab(&self) -> Option<&Tab>;
    fn active_tab_id(&self) -> Option<TabId>;
    fn tab_ids(&self) -> Vec<TabId>;
    fn tab_count(&self) -> usize;
    fn is_overview_visible(&self) -> bool;
    fn is_translation_mode(&self) -> bool;
}

/// The settings the tab manager reads.
#[derive(Debug, Clone)]
pub struct TabManagerConfig {
    pub default_url: String,
    pub new_tab_url: String,
    pub search_url_prefix: String,
    pub restore_on_launch: bool,
    pub save_debounce: Duration,
    pub chrome: ChromeSettings,
}

impl TabManagerConfig {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self {
            default_url: settings.general.default_url.clone(),
            new_tab_url: settings.general.new_tab_url.clone(),
            search_url_prefix: settings.general.search_url_prefix.clone(),
            restore_on_launch: settings.session.restore_on_launch,
            save_debounce: Duration::from_millis(settings.session.save_debounce_ms),
            chrome: settings.chrome.clone(),
        }
    }
}

impl Default for TabManagerConfig {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default())
    }
}

struct TabEntry {
    tab: Tab,
    coordinator: TabCoordinator,
    relay: SubscriptionId,
}

pub struct TabManager {
    entries: Vec<TabEntry>,
    active_tab_id: Option<TabId>,
    overview_visible: bool,
    translation_mode: bool,
    config: TabManagerConfig,
    factory: Box<dyn SurfaceFactory>,
    dispatch: SurfaceDispatch,
    store: Box<dyn SessionStore>,
    debouncer: SaveDebouncer,
    events: EventEmitter<BrowserEvent>,
}

impl TabManager {
    /// Creates an empty manager. Call [`TabManagerTrait::initialize`] before use.
    ///
    /// `dispatch` is handed to every surface; it must route messages back to
    /// [`handle_surface_message`](Self::handle_surface_message) on the owner thread.
    pub fn new(
        config: TabManagerConfig,
        factory: Box<dyn SurfaceFactory>,
        dispatch: SurfaceDispatch,
        store: Box<dyn SessionStore>,
    ) -> Self {
        let debouncer = SaveDebouncer::new(config.save_debounce);
        Self {
            entries: Vec::new(),
            active_tab_id: None,
            overview_visible: false,
            translation_mode: false,
            config,
            factory,
            dispatch,
            store,
            debouncer,
            events: EventEmitter::new(),
        }
    }

    pub fn config(&self) -> &TabManagerConfig {
        &self.config
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&BrowserEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn tab_mut(&mut self, tab_id: TabId) -> Option<&mut Tab> {
        self.entries
            .iter_mut()
            .find(|e| e.tab.id() == tab_id)
            .map(|e| &mut e.tab)
    }

    pub fn tab_states(&self) -> Vec<TabState> {
        self.entries
            .iter()
            .map(|e| e.tab.state(Some(e.tab.id()) == self.active_tab_id))
            .collect()
    }

    pub fn index_of(&self, tab_id: TabId) -> Option<usize> {
        self.entries.iter().position(|e| e.tab.id() == tab_id)
    }

    /// Tab at `index` in display order.
    pub fn tab_id_at(&self, index: usize) -> Result<TabId, TabError> {
        self.entries
            .get(index)
            .map(|e| e.tab.id())
            .ok_or(TabError::InvalidIndex(index))
    }

    fn emit(&self, event: BrowserEvent) {
        self.events.emit(&event);
    }

    /// Builds a hidden tab, wires its change relay and appends it.
    fn push_tab(&mut self, url: &str) -> TabId {
        let mut tab = Tab::new(url, self.factory.as_ref(), self.dispatch.clone());
        tab.set_visible(false);
        let events = self.events.clone();
        let relay = tab.subscribe(move |change| events.emit(&BrowserEvent::TabChanged(change.clone())));
        let id = tab.id();
        debug!(tab_id = %id, url = %url, "tab created");
        self.entries.push(TabEntry {
            tab,
            coordinator: TabCoordinator::new(&self.config.chrome),
            relay,
        });
        id
    }

    /// Makes `tab_id` the only visible tab and announces it.
    fn activate(&mut self, tab_id: TabId) {
        let previous = self.active_tab_id.replace(tab_id);
        for entry in &mut self.entries {
            let id = entry.tab.id();
            if id == tab_id {
                entry.tab.set_visible(true);
            } else if Some(id) == previous {
                entry.tab.set_visible(false);
            }
        }
        if previous != Some(tab_id) {
            self.emit(BrowserEvent::ActiveTabChanged { tab_id });
        }
    }

    fn bootstrap_default_tab(&mut self) {
        let url = self.config.default_url.clone();
        let id = self.push_tab(&url);
        self.activate(id);
    }

    // === Navigation commands ===

    /// Loads address-bar input in a tab. Blank input is ignored.
    pub fn navigate(&mut self, tab_id: TabId, input: &str) -> Result<(), TabError> {
        let prefix = self.config.search_url_prefix.clone();
        let tab = self
            .tab_mut(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        if tab.navigate(input, &prefix) {
            self.debouncer.schedule(Instant::now());
        }
        Ok(())
    }

    pub fn go_back(&mut self, tab_id: TabId) -> Result<(), TabError> {
        self.with_tab(tab_id, Tab::go_back)
    }

    pub fn go_forward(&mut self, tab_id: TabId) -> Result<(), TabError> {
        self.with_tab(tab_id, Tab::go_forward)
    }

    pub fn reload(&mut self, tab_id: TabId) -> Result<(), TabError> {
        self.with_tab(tab_id, Tab::reload)
    }

    pub fn stop_loading(&mut self, tab_id: TabId) -> Result<(), TabError> {
        self.with_tab(tab_id, Tab::stop_loading)
    }

    pub fn reload_or_stop(&mut self, tab_id: TabId) -> Result<(), TabError> {
        self.with_tab(tab_id, Tab::reload_or_stop)
    }

    fn with_tab(&mut self, tab_id: TabId, f: impl FnOnce(&mut Tab)) -> Result<(), TabError> {
        let tab = self
            .tab_mut(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        f(tab);
        Ok(())
    }

    // === Surface events ===

    /// Applies one queued surface notification. Messages for tabs that have
    /// since been closed are dropped.
    pub fn handle_surface_message(&mut self, message: SurfaceMessage) {
        let SurfaceMessage { tab_id, event } = message;
        let translation_mode = self.translation_mode;
        let Some(entry) = self.entries.iter_mut().find(|e| e.tab.id() == tab_id) else {
            debug!(tab_id = %tab_id, "event for closed tab dropped");
            return;
        };

        let actions = entry.coordinator.handle(&mut entry.tab, event, translation_mode);
        for action in actions {
            match action {
                CoordinatorAction::Scroll(direction) => {
                    if Some(tab_id) == self.active_tab_id {
                        self.emit(BrowserEvent::Scroll { tab_id, direction });
                    }
                }
                CoordinatorAction::SelectedText(text) => {
                    self.emit(BrowserEvent::SelectedText { tab_id, text });
                }
                CoordinatorAction::OpenTab(url) => {
                    info!(tab_id = %tab_id, url = %url, "new-window request opened as tab");
                    self.add_tab(Some(&url));
                }
                CoordinatorAction::UrlChanged => {
                    self.debouncer.schedule(Instant::now());
                }
            }
        }
    }

    // === Persistence ===

    /// Current session: every tab's live URL plus the active index.
    pub fn session_snapshot(&self) -> SessionSnapshot {
        let active_index = self
            .active_tab_id
            .and_then(|id| self.index_of(id))
            .unwrap_or(0);
        SessionSnapshot {
            urls: self.entries.iter().map(|e| e.tab.live_url()).collect(),
            active_index,
        }
    }

    /// Writes the session now. Supersedes any pending debounced save.
    pub fn save_session(&mut self) -> Result<(), SessionError> {
        self.debouncer.cancel();
        if self.entries.is_empty() {
            return Ok(());
        }
        let snapshot = self.session_snapshot();
        self.store.save(&snapshot)
    }

    fn persist(&mut self) {
        if let Err(e) = self.save_session() {
            warn!(error = %e, "session save failed");
        }
    }

    /// When the debounced save is due.
    pub fn next_scheduled_save(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Performs the debounced save if its quiet period has elapsed at `now`.
    /// Returns whether a save was attempted.
    pub fn poll_scheduled_save(&mut self, now: Instant) -> bool {
        if self.debouncer.take_due(now) {
            self.persist();
            true
        } else {
            false
        }
    }

    pub fn handle_app_backgrounded(&mut self) {
        debug!("app backgrounded, saving session");
        self.persist();
    }
}

impl TabManagerTrait for TabManager {
    /// Restores the saved session, or opens the default tab.
    ///
    /// A missing, empty or unreadable session falls back to the default tab.
    /// Calling this again once tabs exist does nothing.
    fn initialize(&mut self) {
        if !self.entries.is_empty() {
            return;
        }

        let restored = if self.config.restore_on_launch {
            match self.store.restore() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "saved session unreadable, starting fresh");
                    None
                }
            }
        } else {
            None
        };

        let active = restored.as_ref().and_then(SessionSnapshot::clamped_active_index);
        match (restored, active) {
            (Some(snapshot), Some(active)) => {
                if active != snapshot.active_index {
                    debug!(stored = snapshot.active_index, clamped = active, "stale active index clamped");
                }
                let ids: Vec<TabId> = snapshot.urls.iter().map(|u| self.push_tab(u)).collect();
                self.activate(ids[active]);
                info!(tabs = ids.len(), active, "session restored");
            }
            _ => self.bootstrap_default_tab(),
        }

        self.emit(BrowserEvent::TabsChanged {
            count: self.entries.len(),
        });
    }

    /// Appends a tab (defaulting to the new-tab URL), activates it and saves.
    fn add_tab(&mut self, url: Option<&str>) -> TabId {
        let url = url.unwrap_or(&self.config.new_tab_url).to_string();
        let id = self.push_tab(&url);
        self.activate(id);
        self.emit(BrowserEvent::TabsChanged {
            count: self.entries.len(),
        });
        self.persist();
        id
    }

    /// Removes a tab. The tab now at the same position (or the new last tab)
    /// becomes active if the closed one was; closing the only tab opens a
    /// fresh default tab.
    fn close_tab(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let index = self
            .index_of(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        let was_active = self.active_tab_id == Some(tab_id);

        let entry = self.entries.remove(index);
        entry.tab.unsubscribe(entry.relay);
        drop(entry);
        debug!(tab_id = %tab_id, "tab closed");

        if self.entries.is_empty() {
            self.active_tab_id = None;
            self.bootstrap_default_tab();
        } else if was_active {
            let next = index.min(self.entries.len() - 1);
            let next_id = self.entries[next].tab.id();
            self.activate(next_id);
        }

        self.emit(BrowserEvent::TabsChanged {
            count: self.entries.len(),
        });
        self.persist();
        Ok(())
    }

    /// Activates an existing tab without reloading it, then saves.
    fn switch_to_tab(&mut self, tab_id: TabId) -> Result<(), TabError> {
        if self.index_of(tab_id).is_none() {
            return Err(TabError::NotFound(tab_id.to_string()));
        }
        self.activate(tab_id);
        self.persist();
        Ok(())
    }

    /// Requests a fresh screenshot of the active tab and shows the overview.
    fn open_tab_overview(&mut self) {
        if let Some(id) = self.active_tab_id {
            if let Some(tab) = self.tab_mut(id) {
                tab.capture_screenshot();
            }
        }
        if !self.overview_visible {
            self.overview_visible = true;
            self.emit(BrowserEvent::OverviewVisibilityChanged { visible: true });
        }
    }

    fn close_tab_overview(&mut self) {
        if self.overview_visible {
            self.overview_visible = false;
            self.emit(BrowserEvent::OverviewVisibilityChanged { visible: false });
        }
    }

    fn select_from_overview(&mut self, tab_id: TabId) -> Result<(), TabError> {
        self.switch_to_tab(tab_id)?;
        self.close_tab_overview();
        Ok(())
    }

    /// Turns translation mode on or off in every tab.
    fn set_translation_mode(&mut self, enabled: bool) {
        if self.translation_mode == enabled {
            return;
        }
        self.translation_mode = enabled;
        for entry in &mut self.entries {
            TranslationModeInjector::apply(entry.tab.surface_mut(), enabled);
        }
        info!(enabled, "translation mode");
        self.emit(BrowserEvent::TranslationModeChanged { enabled });
    }

    fn get_tab(&self, tab_id: TabId) -> Option<&Tab> {
        self.entries.iter().map(|e| &e.tab).find(|t| t.id() == tab_id)
    }

    fn active_tab(&self) -> Option<&Tab> {
        self.active_tab_id.and_then(|id| self.get_tab(id))
    }

    fn active_tab_id(&self) -> Option<TabId> {
        self.active_tab_id
    }

    fn tab_ids(&self) -> Vec<TabId> {
        self.entries.iter().map(|e| e.tab.id()).collect()
    }

    fn tab_count(&self) -> usize {
        self.entries.len()
    }

    fn is_overview_visible(&self) -> bool {
        self.overview_visible
    }

    fn is_translation_mode(&self) -> bool {
        self.translation_mode
    }
}
