//! Render surface boundary.
//!
//! A render surface is the opaque web-content host owned by exactly one tab.
//! Commands go in through [`RenderSurface`]; everything the surface observes
//! (navigation, loading, URL/title changes, scrolling, page messages,
//! new-window requests, snapshots) comes back as a [`SurfaceEvent`] through
//! the [`SurfaceEventSink`] handed to it at construction. The sink only
//! enqueues: state is mutated later, on the owner thread, when the queued
//! [`SurfaceMessage`] is dispatched.

pub mod headless;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::errors::SurfaceError;
use crate::types::tab::{Snapshot, TabId};

/// Identity of a concrete surface instance, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Notifications a surface reports back to its tab.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    NavigationStarted,
    NavigationFinished,
    NavigationFailed(String),
    CanGoBackChanged(bool),
    CanGoForwardChanged(bool),
    LoadingChanged(bool),
    UrlChanged(Option<String>),
    TitleChanged(Option<String>),
    /// Vertical content offset.
    Scrolled(f64),
    /// A named message posted from the page's script context.
    ScriptMessage { name: String, body: String },
    /// The page asked for a new window (e.g. a `target="_blank"` link).
    /// Surfaces never create a child surface for this; they report it and
    /// deny.
    NewWindowRequested(Option<String>),
    SnapshotCaptured(Result<Snapshot, String>),
    ScriptFailed(String),
}

/// A surface event tagged with the tab that owns the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMessage {
    pub tab_id: TabId,
    pub event: SurfaceEvent,
}

/// Delivery function shared by every sink, typically an mpsc sender feeding
/// the owner loop.
pub type SurfaceDispatch = Arc<dyn Fn(SurfaceMessage) + Send + Sync>;

/// Callback a surface uses to report events. Registered when the surface is
/// built and detached when the owning tab is torn down; events emitted after
/// detaching are dropped.
#[derive(Clone)]
pub struct SurfaceEventSink {
    tab_id: TabId,
    dispatch: SurfaceDispatch,
    attached: Arc<AtomicBool>,
}

impl SurfaceEventSink {
    pub fn new(tab_id: TabId, dispatch: SurfaceDispatch) -> Self {
        Self {
            tab_id,
            dispatch,
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn emit(&self, event: SurfaceEvent) {
        if self.attached.load(Ordering::Acquire) {
            (self.dispatch)(SurfaceMessage {
                tab_id: self.tab_id,
                event,
            });
        }
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// Commands and live state of one web-content host.
///
/// Query methods report the surface's own view, which may be ahead of the
/// owning tab's cached fields until queued events are dispatched.
pub trait RenderSurface {
    fn id(&self) -> SurfaceId;
    fn load(&mut self, url: &str) -> Result<(), SurfaceError>;
    fn go_back(&mut self);
    fn go_forward(&mut self);
    fn reload(&mut self);
    fn stop_loading(&mut self);
    fn current_url(&self) -> Option<String>;
    fn title(&self) -> Option<String>;
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;
    fn is_loading(&self) -> bool;
    fn set_visible(&mut self, visible: bool);
    /// Starts a snapshot; the result arrives as `SurfaceEvent::SnapshotCaptured`.
    fn capture_snapshot(&mut self);
    /// Queues a script in the current document. Failures after queuing are
    /// reported as `SurfaceEvent::ScriptFailed`.
    fn evaluate_script(&mut self, script: &str) -> Result<(), SurfaceError>;
    /// Routes page messages posted under `name` to `SurfaceEvent::ScriptMessage`.
    fn add_message_handler(&mut self, name: &str);
}

/// Builds surfaces for new tabs.
pub trait SurfaceFactory {
    fn create_surface(&self, events: SurfaceEventSink) -> Box<dyn RenderSurface>;
}

/// Script every surface installs at document creation so page scripts can
/// post named messages with `window.__eigoPost(name, body)`. Adapters map
/// the `post` call onto their native channel.
pub fn message_bridge_script(post: &str) -> String {
    format!(
        "window.__eigoPost = function(name, body) {{ {post}(JSON.stringify({{name: name, body: String(body)}})); }};"
    )
}
