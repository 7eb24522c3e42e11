//! RPC method handler for the JSON-lines control protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested. `handle_method`
//! dispatches a method call to the tab manager, lookup session and settings
//! held by [`App`].

use crate::app::App;
use crate::managers::tab_manager::TabManagerTrait;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::services::translation_mode::MESSAGE_NAME;
use crate::surface::{SurfaceEvent, SurfaceMessage};
use crate::types::tab::TabId;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

/// Encode bytes to base64 string.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

fn str_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

/// `tab_id` from params, or the active tab when absent.
fn tab_param(app: &App, params: &Value) -> Result<TabId, String> {
    match str_param(params, "tab_id") {
        Some(raw) => TabId::parse(raw).ok_or_else(|| format!("invalid tab_id: {}", raw)),
        None => app
            .tab_manager
            .active_tab_id()
            .ok_or_else(|| "no active tab".to_string()),
    }
}

/// `tab_id`, or a position in the tab list given as `index`.
fn required_tab_param(app: &App, params: &Value) -> Result<TabId, String> {
    if let Some(index) = params.get("index").and_then(|v| v.as_u64()) {
        return app
            .tab_manager
            .tab_id_at(index as usize)
            .map_err(|e| e.to_string());
    }
    let raw = str_param(params, "tab_id").ok_or("missing tab_id")?;
    TabId::parse(raw).ok_or_else(|| format!("invalid tab_id: {}", raw))
}

/// Tabs, active tab, overview and translation-mode state.
pub fn tabs_json(app: &App) -> Value {
    let tm = &app.tab_manager;
    json!({
        "tabs": tm.tab_states(),
        "active_tab_id": tm.active_tab_id(),
        "overview_visible": tm.is_overview_visible(),
        "translation_mode": tm.is_translation_mode(),
    })
}

/// The lookup session as shown to the user.
pub fn selection_json(app: &App) -> Value {
    let lookup = &app.lookup;
    json!({
        "text": lookup.selected_text(),
        "dictionary": lookup.dictionary(),
        "explanation": lookup.explanation(),
        "error": lookup.error_message(),
        "chat": lookup.chat_messages(),
        "loading": lookup.is_loading(),
        "speaking": lookup.is_speaking(),
    })
}

/// Queues a page-side event for a tab as if its surface had reported it.
fn inject(app: &mut App, tab_id: TabId, event: SurfaceEvent) -> Value {
    app.tab_manager
        .handle_surface_message(SurfaceMessage { tab_id, event });
    app.pump();
    json!({"ok": true})
}

/// Dispatch a method call.
///
/// Queued surface and app events are drained before the call so results
/// reflect everything reported so far.
pub fn handle_method(app: &mut App, method: &str, params: &Value) -> Result<Value, String> {
    app.pump();

    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Tabs ───
        "tabs.list" => Ok(tabs_json(app)),
        "tabs.add" => {
            let url = str_param(params, "url");
            let id = app.tab_manager.add_tab(url);
            app.pump();
            Ok(json!({"id": id}))
        }
        "tabs.close" => {
            let id = required_tab_param(app, params)?;
            app.tab_manager.close_tab(id).map_err(|e| e.to_string())?;
            app.pump();
            Ok(tabs_json(app))
        }
        "tabs.switch" => {
            let id = required_tab_param(app, params)?;
            app.tab_manager.switch_to_tab(id).map_err(|e| e.to_string())?;
            app.pump();
            Ok(tabs_json(app))
        }
        "tabs.navigate" => {
            let id = tab_param(app, params)?;
            let input = str_param(params, "input").ok_or("missing input")?;
            app.tab_manager.navigate(id, input).map_err(|e| e.to_string())?;
            app.pump();
            let tab = app.tab_manager.get_tab(id).ok_or("tab closed")?;
            Ok(json!(tab.state(app.tab_manager.active_tab_id() == Some(id))))
        }
        "tabs.back" | "tabs.forward" | "tabs.reload" | "tabs.stop" => {
            let id = tab_param(app, params)?;
            let tm = &mut app.tab_manager;
            match method {
                "tabs.back" => tm.go_back(id),
                "tabs.forward" => tm.go_forward(id),
                "tabs.reload" => tm.reload_or_stop(id),
                _ => tm.stop_loading(id),
            }
            .map_err(|e| e.to_string())?;
            app.pump();
            Ok(json!({"ok": true}))
        }
        "tabs.screenshot" => {
            let id = tab_param(app, params)?;
            let tab = app.tab_manager.get_tab(id).ok_or("tab not found")?;
            match tab.screenshot() {
                Some(s) => Ok(json!({"width": s.width, "height": s.height, "data": base64_encode(&s.data)})),
                None => Ok(Value::Null),
            }
        }

        // ─── Overview ───
        "overview.open" => {
            app.tab_manager.open_tab_overview();
            app.pump();
            Ok(tabs_json(app))
        }
        "overview.close" => {
            app.tab_manager.close_tab_overview();
            app.pump();
            Ok(tabs_json(app))
        }
        "overview.select" => {
            let id = required_tab_param(app, params)?;
            app.tab_manager
                .select_from_overview(id)
                .map_err(|e| e.to_string())?;
            app.pump();
            Ok(tabs_json(app))
        }

        // ─── Translation mode & lookups ───
        "translation.set" => {
            let enabled = params
                .get("enabled")
                .and_then(|v| v.as_bool())
                .ok_or("missing enabled")?;
            app.tab_manager.set_translation_mode(enabled);
            app.pump();
            Ok(json!({"enabled": enabled}))
        }
        "selection.get" => Ok(selection_json(app)),
        "lookup.explain" => {
            let started = app.fetch_explanation();
            Ok(json!({"started": started}))
        }
        "lookup.chat" => {
            let input = str_param(params, "input").ok_or("missing input")?;
            let started = app.send_chat(input);
            Ok(json!({"started": started}))
        }
        "lookup.speak" => {
            let started = app.speak_selection();
            Ok(json!({"started": started}))
        }

        // ─── Page events (headless hosts) ───
        "page.scroll" => {
            let id = tab_param(app, params)?;
            let y = params.get("y").and_then(|v| v.as_f64()).ok_or("missing y")?;
            Ok(inject(app, id, SurfaceEvent::Scrolled(y)))
        }
        "page.select_text" => {
            let id = tab_param(app, params)?;
            let text = str_param(params, "text").ok_or("missing text")?.to_string();
            Ok(inject(
                app,
                id,
                SurfaceEvent::ScriptMessage {
                    name: MESSAGE_NAME.to_string(),
                    body: text,
                },
            ))
        }
        "page.open_window" => {
            let id = tab_param(app, params)?;
            let url = str_param(params, "url").ok_or("missing url")?.to_string();
            Ok(inject(app, id, SurfaceEvent::NewWindowRequested(Some(url))))
        }

        // ─── Inbound hand-off & lifecycle ───
        "inbound.open_url" => {
            let link = str_param(params, "link").ok_or("missing link")?;
            app.handle_open_link(link);
            app.pump();
            Ok(tabs_json(app))
        }
        "app.background" => {
            app.handle_background();
            Ok(json!({"ok": true}))
        }
        "app.foreground" => {
            app.handle_foreground();
            app.pump();
            Ok(tabs_json(app))
        }
        "session.save" => {
            app.tab_manager.save_session().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Settings ───
        "settings.get" => {
            let settings = app.settings_engine.get_settings();
            serde_json::to_value(settings).map_err(|e| e.to_string())
        }
        "settings.set" => {
            let key = str_param(params, "key").ok_or("missing key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            app.settings_engine
                .set_value(key, value)
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
