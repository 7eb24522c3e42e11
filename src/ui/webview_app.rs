//! Desktop host using `wry` + `tao`.
//!
//! Architecture:
//! - One window. The browser chrome (toolbar, lookup panel, tab overview) is
//!   a child webview loaded from `resources/ui/chrome.html`.
//! - Each tab's page is its own child webview built by [`WrySurfaceFactory`].
//! - IPC from the chrome arrives via `window.ipc.postMessage()` and is
//!   forwarded to the event loop as [`HostEvent::Chrome`].
//! - Surface callbacks are queued by [`App`] and wake the event loop through
//!   [`HostEvent::Wake`]; the loop pumps them on the main thread.

use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tao::event::{Event, StartCause, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoopBuilder};
use tao::window::{Window, WindowBuilder};
use tracing::{debug, error, info, warn};
use wry::{WebView, WebViewBuilder};

use super::wry_surface::{ContentArea, WrySurfaceFactory};
use crate::app::{App, Wake};
use crate::managers::tab_manager::TabManagerTrait;
use crate::rpc_handler::{selection_json, tabs_json};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::events::BrowserEvent;
use crate::types::tab::{ScrollDirection, TabId};

const CHROME_HTML: &str = include_str!("../../resources/ui/chrome.html");

/// Height of the toolbar strip.
const TOOLBAR_HEIGHT: f64 = 96.0;
/// Extra chrome height while the lookup panel is open.
const LOOKUP_PANEL_HEIGHT: f64 = 300.0;

#[derive(Debug)]
enum HostEvent {
    /// Something was queued for the owner thread.
    Wake,
    /// A command posted by the chrome page.
    Chrome(String),
}

struct Host {
    app: App,
    window: Rc<Window>,
    chrome: WebView,
    factory: WrySurfaceFactory,
    /// Set by downward scrolling, cleared by upward scrolling.
    chrome_collapsed: bool,
    overview_shown: bool,
}

impl Host {
    /// Pumps queued work, then brings layout and chrome up to date.
    fn refresh(&mut self) {
        self.app.pump();
        for event in self.app.take_notifications() {
            match event {
                BrowserEvent::Scroll { direction, .. } => {
                    self.chrome_collapsed = direction == ScrollDirection::Down;
                }
                BrowserEvent::ActiveTabChanged { .. } => self.chrome_collapsed = false,
                _ => {}
            }
        }
        self.layout();
        self.render_chrome();
    }

    fn layout(&mut self) {
        let size = self.window.inner_size().to_logical::<f64>(self.window.scale_factor());
        let overview = self.app.tab_manager.is_overview_visible();

        if overview != self.overview_shown {
            self.overview_shown = overview;
            if overview {
                self.factory.hide_all();
            } else if let Some(id) = self.app.tab_manager.active_tab_id() {
                if let Some(tab) = self.app.tab_manager.tab_mut(id) {
                    tab.set_visible(true);
                }
            }
        }

        let lookup_open = !self.app.lookup.selected_text().is_empty();
        let chrome_height = if overview {
            size.height
        } else if lookup_open {
            (TOOLBAR_HEIGHT + LOOKUP_PANEL_HEIGHT).min(size.height)
        } else if self.chrome_collapsed {
            0.0
        } else {
            TOOLBAR_HEIGHT
        };

        let chrome_area = ContentArea {
            x: 0.0,
            y: 0.0,
            width: size.width,
            height: chrome_height,
        };
        if let Err(e) = self.chrome.set_bounds(chrome_area.rect()) {
            warn!(error = %e, "failed to resize chrome");
        }
        if let Err(e) = self.chrome.set_visible(chrome_height > 0.0) {
            warn!(error = %e, "failed to toggle chrome");
        }

        self.factory.set_area(ContentArea {
            x: 0.0,
            y: chrome_height,
            width: size.width,
            height: (size.height - chrome_height).max(0.0),
        });
    }

    fn render_chrome(&self) {
        let state = json!({
            "browser": tabs_json(&self.app),
            "lookup": selection_json(&self.app),
            "collapsed": self.chrome_collapsed,
        });
        let script = format!("window.eigoRender && window.eigoRender({})", state);
        if let Err(e) = self.chrome.evaluate_script(&script) {
            debug!(error = %e, "chrome not ready");
        }
    }

    fn handle_chrome(&mut self, message: &str) {
        let Ok(msg) = serde_json::from_str::<Value>(message) else {
            warn!("malformed chrome message");
            return;
        };
        let Some(cmd) = msg.get("cmd").and_then(|v| v.as_str()) else {
            return;
        };
        let tab_arg = msg
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(TabId::parse);
        let active = self.app.tab_manager.active_tab_id();
        let tm = &mut self.app.tab_manager;

        let result = match (cmd, active) {
            ("navigate", Some(id)) => {
                let input = msg.get("input").and_then(|v| v.as_str()).unwrap_or("");
                tm.navigate(id, input)
            }
            ("back", Some(id)) => tm.go_back(id),
            ("forward", Some(id)) => tm.go_forward(id),
            ("reload", Some(id)) => tm.reload_or_stop(id),
            ("new_tab", _) => {
                tm.add_tab(None);
                Ok(())
            }
            ("close_tab", _) => match tab_arg.or(active) {
                Some(id) => tm.close_tab(id),
                None => Ok(()),
            },
            ("select_tab", _) => match tab_arg {
                Some(id) => tm.select_from_overview(id),
                None => Ok(()),
            },
            ("overview_open", _) => {
                tm.open_tab_overview();
                Ok(())
            }
            ("overview_close", _) => {
                tm.close_tab_overview();
                Ok(())
            }
            ("translation", _) => {
                let enabled = msg.get("enabled").and_then(|v| v.as_bool()).unwrap_or(false);
                tm.set_translation_mode(enabled);
                Ok(())
            }
            ("explain", _) => {
                self.app.fetch_explanation();
                Ok(())
            }
            ("chat", _) => {
                let input = msg.get("input").and_then(|v| v.as_str()).unwrap_or("");
                self.app.send_chat(input);
                Ok(())
            }
            ("speak", _) => {
                if self.app.lookup.is_speaking() {
                    self.app.stop_speaking();
                } else {
                    self.app.speak_selection();
                }
                Ok(())
            }
            ("dismiss_lookup", _) => {
                self.app.lookup.reset();
                Ok(())
            }
            ("ready", _) => Ok(()),
            (other, _) => {
                debug!(cmd = %other, "unhandled chrome command");
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(cmd = %cmd, error = %e, "chrome command failed");
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.app.tab_manager.save_session() {
            warn!(error = %e, "session save on exit failed");
        }
        self.app.stop_speaking();
        info!("window closed");
    }

    fn control_flow(&self) -> ControlFlow {
        match self.app.tab_manager.next_scheduled_save() {
            Some(at) => ControlFlow::WaitUntil(at.into_std()),
            None => ControlFlow::Wait,
        }
    }
}

fn user_agent() -> String {
    let mut engine = SettingsEngine::new(None);
    match engine.load() {
        Ok(settings) => settings.general.user_agent,
        Err(_) => engine.get_settings().general.user_agent.clone(),
    }
}

// ─── Main entry point ───

pub fn run() {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return;
        }
    };
    // Lookups and speech are spawned onto this runtime from the main thread.
    let _guard = runtime.enter();

    let event_loop = EventLoopBuilder::<HostEvent>::with_user_event().build();

    let window = match WindowBuilder::new()
        .with_title("Eigo Browser")
        .with_inner_size(tao::dpi::LogicalSize::new(430.0, 900.0))
        .build(&event_loop)
    {
        Ok(window) => Rc::new(window),
        Err(e) => {
            error!(error = %e, "failed to create window");
            return;
        }
    };

    let wake_proxy = Mutex::new(event_loop.create_proxy());
    let wake: Wake = Arc::new(move || {
        let proxy = wake_proxy.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = proxy.send_event(HostEvent::Wake);
    });

    let factory = WrySurfaceFactory::new(Rc::clone(&window), user_agent());
    let app = match App::open(Box::new(factory.clone()), None, Some(wake)) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to start");
            return;
        }
    };

    let chrome_proxy = event_loop.create_proxy();
    let chrome = match WebViewBuilder::new()
        .with_html(CHROME_HTML)
        .with_ipc_handler(move |request: wry::http::Request<String>| {
            let _ = chrome_proxy.send_event(HostEvent::Chrome(request.body().clone()));
        })
        .with_devtools(cfg!(debug_assertions))
        .build_as_child(window.as_ref())
    {
        Ok(view) => view,
        Err(e) => {
            error!(error = %e, "failed to create chrome webview");
            return;
        }
    };

    let mut host = Host {
        app,
        window,
        chrome,
        factory,
        chrome_collapsed: false,
        overview_shown: false,
    };

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::NewEvents(StartCause::Init)
            | Event::NewEvents(StartCause::ResumeTimeReached { .. }) => host.refresh(),
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                host.shutdown();
                *control_flow = ControlFlow::Exit;
                return;
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(_),
                ..
            } => host.layout(),
            Event::WindowEvent {
                event: WindowEvent::Focused(focused),
                ..
            } => {
                // Desktop stand-in for app foreground/background.
                if focused {
                    host.app.handle_foreground();
                } else {
                    host.app.handle_background();
                }
                host.refresh();
            }
            Event::UserEvent(HostEvent::Wake) => host.refresh(),
            Event::UserEvent(HostEvent::Chrome(message)) => {
                host.handle_chrome(&message);
                host.refresh();
            }
            _ => {}
        }
        *control_flow = host.control_flow();
    });
}
