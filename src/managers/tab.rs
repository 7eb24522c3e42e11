//! Tab entity.
//!
//! A tab owns exactly one render surface for its whole life. Its cached
//! fields mirror what the surface has reported so far; every change to an
//! observable field is announced as a [`TabChange`] to the tab's subscribers.

use tracing::{debug, warn};

use crate::services::translation_mode::TranslationModeInjector;
use crate::services::url_input::{display_host, normalize_input};
use crate::surface::{RenderSurface, SurfaceDispatch, SurfaceEventSink, SurfaceFactory, SurfaceId};
use crate::types::events::{EventEmitter, SubscriptionId};
use crate::types::tab::{Snapshot, TabChange, TabField, TabId, TabState};

pub struct Tab {
    id: TabId,
    url: String,
    title: Option<String>,
    can_go_back: bool,
    can_go_forward: bool,
    is_loading: bool,
    screenshot: Option<Snapshot>,
    surface: Box<dyn RenderSurface>,
    sink: SurfaceEventSink,
    changes: EventEmitter<TabChange>,
}

impl Tab {
    /// Builds the tab's surface and starts loading `url`.
    ///
    /// A load that cannot start is logged; the tab still exists and keeps
    /// `url` as its address.
    pub fn new(url: &str, factory: &dyn SurfaceFactory, dispatch: SurfaceDispatch) -> Self {
        let id = TabId::new();
        let sink = SurfaceEventSink::new(id, dispatch);
        let mut surface = factory.create_surface(sink.clone());
        TranslationModeInjector::install(surface.as_mut());

        let mut tab = Self {
            id,
            url: url.to_string(),
            title: None,
            can_go_back: false,
            can_go_forward: false,
            is_loading: false,
            screenshot: None,
            surface,
            sink,
            changes: EventEmitter::new(),
        };
        tab.load(url);
        tab
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    /// Last known address.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Address as the surface currently reports it, falling back to the
    /// cached one. Preferred for persistence since the cache can lag.
    pub fn live_url(&self) -> String {
        self.surface
            .current_url()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.url.clone())
    }

    /// Page title, or the bare host when the page has none.
    pub fn title(&self) -> String {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => display_host(&self.url),
        }
    }

    pub fn display_host(&self) -> String {
        display_host(&self.url)
    }

    pub fn can_go_back(&self) -> bool {
        self.can_go_back
    }

    pub fn can_go_forward(&self) -> bool {
        self.can_go_forward
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn screenshot(&self) -> Option<&Snapshot> {
        self.screenshot.as_ref()
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface.id()
    }

    pub fn surface_mut(&mut self) -> &mut dyn RenderSurface {
        self.surface.as_mut()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TabChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }

    pub fn state(&self, active: bool) -> TabState {
        TabState {
            id: self.id,
            url: self.url.clone(),
            title: self.title(),
            can_go_back: self.can_go_back,
            can_go_forward: self.can_go_forward,
            is_loading: self.is_loading,
            has_screenshot: self.screenshot.is_some(),
            active,
        }
    }

    // === Commands ===

    /// Loads address-bar input, searching when it does not look like a URL.
    /// Returns false for blank input.
    pub fn navigate(&mut self, input: &str, search_prefix: &str) -> bool {
        match normalize_input(input, search_prefix) {
            Some(target) => {
                self.set_url(target.clone());
                self.load(&target);
                true
            }
            None => false,
        }
    }

    pub fn go_back(&mut self) {
        self.surface.go_back();
    }

    pub fn go_forward(&mut self) {
        self.surface.go_forward();
    }

    pub fn reload(&mut self) {
        self.surface.reload();
    }

    pub fn stop_loading(&mut self) {
        self.surface.stop_loading();
    }

    /// The combined reload/stop button.
    pub fn reload_or_stop(&mut self) {
        if self.is_loading {
            self.stop_loading();
        } else {
            self.reload();
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.surface.set_visible(visible);
    }

    /// Starts a screenshot; it lands via `SurfaceEvent::SnapshotCaptured`.
    pub fn capture_screenshot(&mut self) {
        self.surface.capture_snapshot();
    }

    fn load(&mut self, url: &str) {
        if let Err(e) = self.surface.load(url) {
            warn!(tab_id = %self.id, url = %url, error = %e, "load failed");
        }
    }

    // === State updates, driven by the coordinator ===

    fn notify(&self, field: TabField) {
        self.changes.emit(&TabChange {
            tab_id: self.id,
            field,
        });
    }

    pub(crate) fn set_url(&mut self, url: String) {
        if self.url != url {
            debug!(tab_id = %self.id, url = %url, "url changed");
            self.url = url;
            self.notify(TabField::Url);
        }
    }

    pub(crate) fn set_title(&mut self, title: Option<String>) {
        if self.title != title {
            self.title = title;
            self.notify(TabField::Title);
        }
    }

    pub(crate) fn set_can_go_back(&mut self, value: bool) {
        if self.can_go_back != value {
            self.can_go_back = value;
            self.notify(TabField::CanGoBack);
        }
    }

    pub(crate) fn set_can_go_forward(&mut self, value: bool) {
        if self.can_go_forward != value {
            self.can_go_forward = value;
            self.notify(TabField::CanGoForward);
        }
    }

    pub(crate) fn set_loading(&mut self, value: bool) {
        if self.is_loading != value {
            self.is_loading = value;
            self.notify(TabField::Loading);
        }
    }

    pub(crate) fn set_screenshot(&mut self, snapshot: Snapshot) {
        self.screenshot = Some(snapshot);
        self.notify(TabField::Screenshot);
    }

    /// Copies everything the surface knows into the cached fields.
    pub(crate) fn refresh_from_surface(&mut self) {
        if let Some(url) = self.surface.current_url().filter(|u| !u.is_empty()) {
            self.set_url(url);
        }
        let title = self.surface.title();
        self.set_title(title);
        let loading = self.surface.is_loading();
        self.set_loading(loading);
        let back = self.surface.can_go_back();
        self.set_can_go_back(back);
        let forward = self.surface.can_go_forward();
        self.set_can_go_forward(forward);
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        // Late callbacks from the surface must not reach a dead tab.
        self.sink.detach();
    }
}
