//! Render surfaces backed by `wry` child webviews.
//!
//! Each tab gets its own child webview inside the main window. Engine
//! callbacks (page load, title, IPC, new-window requests) are translated to
//! [`SurfaceEvent`]s on the tab's sink; nothing here touches tab state.
//!
//! Child webviews on Linux need an X11 window.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tao::window::Window;
use tracing::{debug, error, warn};
use url::Url;
use wry::dpi::{LogicalPosition, LogicalSize};
use wry::{PageLoadEvent, Rect, WebView, WebViewBuilder};

use crate::surface::{
    message_bridge_script, RenderSurface, SurfaceEvent, SurfaceEventSink, SurfaceFactory, SurfaceId,
};
use crate::types::errors::SurfaceError;

/// Message name the scroll reporter posts under. Never handed to tabs as a
/// script message.
const SCROLL_MESSAGE: &str = "__scroll";

const SCROLL_REPORTER: &str = "window.addEventListener('scroll', function() { \
    if (window.__eigoPost) window.__eigoPost('__scroll', String(window.scrollY)); \
}, { passive: true });";

/// Region of the window content webviews occupy, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ContentArea {
    pub fn rect(&self) -> Rect {
        Rect {
            position: LogicalPosition::new(self.x, self.y).into(),
            size: LogicalSize::new(self.width, self.height).into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Back,
    Forward,
}

/// History as seen from page-load callbacks; the engine does not expose its
/// own back/forward list.
#[derive(Debug, Default)]
struct NavState {
    history: Vec<String>,
    index: Option<usize>,
    pending: Option<Step>,
    loading: bool,
    title: Option<String>,
}

impl NavState {
    fn started(&mut self, url: &str) {
        self.loading = true;
        match (self.pending.take(), self.index) {
            (Some(Step::Back), Some(i)) if i > 0 => self.index = Some(i - 1),
            (Some(Step::Forward), Some(i)) if i + 1 < self.history.len() => self.index = Some(i + 1),
            _ if self.current() == Some(url) => {}
            _ => {
                let next = self.index.map_or(0, |i| i + 1);
                self.history.truncate(next);
                self.history.push(url.to_string());
                self.index = Some(next);
            }
        }
        if let Some(i) = self.index {
            self.history[i] = url.to_string();
        }
    }

    fn current(&self) -> Option<&str> {
        self.index.and_then(|i| self.history.get(i)).map(String::as_str)
    }

    fn can_go_back(&self) -> bool {
        matches!(self.index, Some(i) if i > 0)
    }

    fn can_go_forward(&self) -> bool {
        matches!(self.index, Some(i) if i + 1 < self.history.len())
    }
}

type SharedNav = Arc<Mutex<NavState>>;

fn nav(state: &SharedNav) -> std::sync::MutexGuard<'_, NavState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Deserialize)]
struct BridgeMessage {
    name: String,
    body: String,
}

/// Builds child webviews in one window and keeps them laid out.
#[derive(Clone)]
pub struct WrySurfaceFactory {
    window: Rc<Window>,
    user_agent: String,
    area: Rc<Cell<ContentArea>>,
    views: Rc<RefCell<Vec<Weak<WebView>>>>,
    next_id: Rc<Cell<u64>>,
}

impl WrySurfaceFactory {
    pub fn new(window: Rc<Window>, user_agent: impl Into<String>) -> Self {
        Self {
            window,
            user_agent: user_agent.into(),
            area: Rc::new(Cell::new(ContentArea::default())),
            views: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Moves every live content webview to `area`.
    pub fn set_area(&self, area: ContentArea) {
        self.area.set(area);
        self.for_each_view(|view| {
            if let Err(e) = view.set_bounds(area.rect()) {
                warn!(error = %e, "failed to resize webview");
            }
        });
    }

    /// Hides every content webview, e.g. while the tab overview covers them.
    pub fn hide_all(&self) {
        self.for_each_view(|view| {
            if let Err(e) = view.set_visible(false) {
                warn!(error = %e, "failed to hide webview");
            }
        });
    }

    fn for_each_view(&self, f: impl Fn(&WebView)) {
        let mut views = self.views.borrow_mut();
        views.retain(|weak| weak.strong_count() > 0);
        for view in views.iter().filter_map(Weak::upgrade) {
            f(&view);
        }
    }
}

impl SurfaceFactory for WrySurfaceFactory {
    fn create_surface(&self, events: SurfaceEventSink) -> Box<dyn RenderSurface> {
        let id = SurfaceId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let nav_state: SharedNav = Arc::new(Mutex::new(NavState::default()));
        let handlers: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let bridge = message_bridge_script("window.ipc.postMessage");

        let ipc_sink = events.clone();
        let ipc_handlers = Arc::clone(&handlers);
        let load_sink = events.clone();
        let load_nav = Arc::clone(&nav_state);
        let title_sink = events.clone();
        let title_nav = Arc::clone(&nav_state);
        let window_sink = events.clone();

        let builder = WebViewBuilder::new()
            .with_bounds(self.area.get().rect())
            .with_visible(false)
            .with_user_agent(self.user_agent.as_str())
            .with_initialization_script(bridge.as_str())
            .with_initialization_script(SCROLL_REPORTER)
            .with_ipc_handler(move |request: wry::http::Request<String>| {
                let Ok(message) = serde_json::from_str::<BridgeMessage>(request.body()) else {
                    return;
                };
                if message.name == SCROLL_MESSAGE {
                    if let Ok(y) = message.body.parse::<f64>() {
                        ipc_sink.emit(SurfaceEvent::Scrolled(y));
                    }
                    return;
                }
                let known = ipc_handlers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .contains(&message.name);
                if known {
                    ipc_sink.emit(SurfaceEvent::ScriptMessage {
                        name: message.name,
                        body: message.body,
                    });
                }
            })
            .with_on_page_load_handler(move |event, url| match event {
                PageLoadEvent::Started => {
                    let (back, forward) = {
                        let mut state = nav(&load_nav);
                        state.started(&url);
                        (state.can_go_back(), state.can_go_forward())
                    };
                    load_sink.emit(SurfaceEvent::NavigationStarted);
                    load_sink.emit(SurfaceEvent::LoadingChanged(true));
                    load_sink.emit(SurfaceEvent::UrlChanged(Some(url)));
                    load_sink.emit(SurfaceEvent::CanGoBackChanged(back));
                    load_sink.emit(SurfaceEvent::CanGoForwardChanged(forward));
                }
                PageLoadEvent::Finished => {
                    nav(&load_nav).loading = false;
                    load_sink.emit(SurfaceEvent::UrlChanged(Some(url)));
                    load_sink.emit(SurfaceEvent::LoadingChanged(false));
                    load_sink.emit(SurfaceEvent::NavigationFinished);
                }
            })
            .with_document_title_changed_handler(move |title| {
                let title = Some(title).filter(|t| !t.is_empty());
                nav(&title_nav).title = title.clone();
                title_sink.emit(SurfaceEvent::TitleChanged(title));
            })
            .with_new_window_req_handler(move |url, _features| {
                debug!(url = %url, "new-window request");
                window_sink.emit(SurfaceEvent::NewWindowRequested(Some(url)));
                wry::NewWindowResponse::Deny
            });

        let webview = match builder.build_as_child(self.window.as_ref()) {
            Ok(view) => {
                let view = Rc::new(view);
                self.views.borrow_mut().push(Rc::downgrade(&view));
                Some(view)
            }
            Err(e) => {
                error!(error = %e, tab_id = %events.tab_id(), "failed to create webview");
                None
            }
        };

        Box::new(WrySurface {
            id,
            webview,
            events,
            nav: nav_state,
            handlers,
        })
    }
}

pub struct WrySurface {
    id: SurfaceId,
    webview: Option<Rc<WebView>>,
    events: SurfaceEventSink,
    nav: SharedNav,
    handlers: Arc<Mutex<HashSet<String>>>,
}

impl WrySurface {
    fn view(&self) -> Result<&WebView, SurfaceError> {
        self.webview
            .as_deref()
            .ok_or_else(|| SurfaceError::Unavailable("webview was not created".to_string()))
    }

    fn run(&self, script: &str) {
        if let Err(e) = self.evaluate_script_inner(script) {
            warn!(error = %e, "page command failed");
        }
    }

    fn evaluate_script_inner(&self, script: &str) -> Result<(), SurfaceError> {
        self.view()?
            .evaluate_script(script)
            .map_err(|e| SurfaceError::Script(e.to_string()))
    }
}

impl RenderSurface for WrySurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn load(&mut self, url: &str) -> Result<(), SurfaceError> {
        Url::parse(url).map_err(|e| SurfaceError::InvalidUrl(format!("{url}: {e}")))?;
        self.view()?
            .load_url(url)
            .map_err(|e| SurfaceError::Navigation(e.to_string()))
    }

    fn go_back(&mut self) {
        if self.can_go_back() {
            nav(&self.nav).pending = Some(Step::Back);
            self.run("history.back()");
        }
    }

    fn go_forward(&mut self) {
        if self.can_go_forward() {
            nav(&self.nav).pending = Some(Step::Forward);
            self.run("history.forward()");
        }
    }

    fn reload(&mut self) {
        if let Ok(view) = self.view() {
            if let Err(e) = view.reload() {
                warn!(error = %e, "reload failed");
            }
        }
    }

    fn stop_loading(&mut self) {
        self.run("window.stop()");
        nav(&self.nav).loading = false;
        self.events.emit(SurfaceEvent::LoadingChanged(false));
    }

    fn current_url(&self) -> Option<String> {
        self.webview
            .as_ref()
            .and_then(|view| view.url().ok())
            .filter(|url| !url.is_empty())
            .or_else(|| nav(&self.nav).current().map(str::to_string))
    }

    fn title(&self) -> Option<String> {
        nav(&self.nav).title.clone()
    }

    fn can_go_back(&self) -> bool {
        nav(&self.nav).can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        nav(&self.nav).can_go_forward()
    }

    fn is_loading(&self) -> bool {
        nav(&self.nav).loading
    }

    fn set_visible(&mut self, visible: bool) {
        if let Ok(view) = self.view() {
            if let Err(e) = view.set_visible(visible) {
                warn!(error = %e, "failed to change webview visibility");
            }
        }
    }

    fn capture_snapshot(&mut self) {
        // wry has no portable capture API.
        self.events.emit(SurfaceEvent::SnapshotCaptured(Err(
            "snapshots are not supported by this engine".to_string(),
        )));
    }

    fn evaluate_script(&mut self, script: &str) -> Result<(), SurfaceError> {
        self.evaluate_script_inner(script)
    }

    fn add_message_handler(&mut self, name: &str) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }
}
