//! Per-tab surface event handling.
//!
//! One coordinator is bound to each tab. It applies surface notifications to
//! the tab's fields and turns the rest (scrolling, page messages, new-window
//! requests) into [`CoordinatorAction`]s for the tab manager.

use tracing::{debug, warn};

use super::tab::Tab;
use crate::services::scroll_classifier::ScrollClassifier;
use crate::services::translation_mode::{TranslationModeInjector, MESSAGE_NAME};
use crate::surface::SurfaceEvent;
use crate::types::settings::ChromeSettings;
use crate::types::tab::ScrollDirection;

/// Something the coordinator cannot do on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorAction {
    Scroll(ScrollDirection),
    SelectedText(String),
    /// A new-window request, to be opened as a new tab.
    OpenTab(String),
    /// The tab's address changed; persistence should catch up.
    UrlChanged,
}

#[derive(Debug, Clone)]
pub struct TabCoordinator {
    scroll: ScrollClassifier,
    /// Cleared between navigation start and finish so selections posted by
    /// the outgoing document are dropped.
    accepting_messages: bool,
}

impl TabCoordinator {
    pub fn new(chrome: &ChromeSettings) -> Self {
        Self {
            scroll: ScrollClassifier::from_settings(chrome),
            accepting_messages: true,
        }
    }

    pub fn handle(
        &mut self,
        tab: &mut Tab,
        event: SurfaceEvent,
        translation_mode: bool,
    ) -> Vec<CoordinatorAction> {
        let url_before = tab.url().to_string();
        let mut actions = Vec::new();

        match event {
            SurfaceEvent::NavigationStarted => {
                // Ahead of the surface's own loading flag.
                tab.set_loading(true);
                self.accepting_messages = false;
            }
            SurfaceEvent::NavigationFinished => {
                tab.refresh_from_surface();
                self.accepting_messages = true;
                if translation_mode {
                    // The new document starts without the injected state.
                    TranslationModeInjector::apply(tab.surface_mut(), true);
                }
            }
            SurfaceEvent::NavigationFailed(reason) => {
                warn!(tab_id = %tab.id(), reason = %reason, "navigation failed");
                tab.refresh_from_surface();
                tab.set_loading(false);
                self.accepting_messages = true;
            }
            SurfaceEvent::CanGoBackChanged(value) => tab.set_can_go_back(value),
            SurfaceEvent::CanGoForwardChanged(value) => tab.set_can_go_forward(value),
            SurfaceEvent::LoadingChanged(value) => tab.set_loading(value),
            SurfaceEvent::UrlChanged(Some(url)) if !url.is_empty() => tab.set_url(url),
            SurfaceEvent::UrlChanged(_) => {}
            SurfaceEvent::TitleChanged(title) => tab.set_title(title),
            SurfaceEvent::Scrolled(y) => match self.scroll.classify(y) {
                ScrollDirection::None => {}
                direction => actions.push(CoordinatorAction::Scroll(direction)),
            },
            SurfaceEvent::ScriptMessage { name, body } => {
                if name != MESSAGE_NAME {
                    debug!(tab_id = %tab.id(), name = %name, "ignoring page message");
                } else if !self.accepting_messages {
                    debug!(tab_id = %tab.id(), "dropping selection from previous document");
                } else {
                    actions.push(CoordinatorAction::SelectedText(body));
                }
            }
            SurfaceEvent::NewWindowRequested(Some(url)) if !url.is_empty() => {
                actions.push(CoordinatorAction::OpenTab(url));
            }
            SurfaceEvent::NewWindowRequested(_) => {
                debug!(tab_id = %tab.id(), "new-window request without target");
            }
            SurfaceEvent::SnapshotCaptured(Ok(snapshot)) => tab.set_screenshot(snapshot),
            SurfaceEvent::SnapshotCaptured(Err(reason)) => {
                warn!(tab_id = %tab.id(), reason = %reason, "snapshot failed");
            }
            SurfaceEvent::ScriptFailed(reason) => {
                warn!(tab_id = %tab.id(), reason = %reason, "page script failed");
            }
        }

        if tab.url() != url_before {
            actions.push(CoordinatorAction::UrlChanged);
        }
        actions
    }
}
