//! Unit tests for inbound URL hand-off: scheme links, the shared slot, and
//! how the app opens what they deliver.

use std::rc::Rc;
use std::sync::Arc;

use eigo_browser::app::{App, AppEvent, AppParts};
use eigo_browser::managers::session_manager::KeyValueSessionStore;
use eigo_browser::managers::tab_manager::TabManagerTrait;
use eigo_browser::services::key_value_store::{KeyValueStore, MemoryKeyValueStore};
use eigo_browser::services::settings_engine::SettingsEngine;
use eigo_browser::services::speech::{SpeechDone, SpeechService};
use eigo_browser::services::url_handoff::{build_open_url, parse_open_url, SharedUrlSlot};
use eigo_browser::surface::headless::HeadlessSurfaceFactory;
use eigo_browser::types::settings::BrowserSettings;
use rstest::rstest;
use tempfile::TempDir;

const SCHEME: &str = "eigobrowser";
const SHARED_KEY: &str = "SharedURL";

struct Silent;

impl SpeechService for Silent {
    fn speak(&mut self, _text: &str, _language: &str, on_done: SpeechDone) {
        on_done();
    }

    fn stop(&mut self) {}
}

fn app_with_slot(dir: &TempDir, shared: &Rc<MemoryKeyValueStore>) -> App {
    let config = dir.path().join("settings.json").to_string_lossy().to_string();
    let mut app = App::from_parts(AppParts {
        settings: BrowserSettings::default(),
        settings_engine: SettingsEngine::new(Some(config)),
        factory: Box::new(HeadlessSurfaceFactory::new()),
        session_store: Box::new(KeyValueSessionStore::new(Box::new(MemoryKeyValueStore::new()))),
        shared_slot: SharedUrlSlot::new(Box::new(Rc::clone(shared)), SHARED_KEY),
        explain: None,
        speech: Box::new(Silent),
        wake: None,
    });
    app.pump();
    app
}

fn active_url(app: &App) -> String {
    app.tab_manager.active_tab().unwrap().url().to_string()
}

// === Scheme links ===

#[rstest]
#[case("eigobrowser://open?url=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1", Some("https://example.com/a?b=1"))]
#[case("eigobrowser://open?url=https://example.com/", Some("https://example.com/"))]
#[case("eigobrowser://open?other=1&url=https%3A%2F%2Fx.org", Some("https://x.org"))]
#[case("eigobrowser://close?url=https%3A%2F%2Fexample.com", None)]
#[case("otherapp://open?url=https%3A%2F%2Fexample.com", None)]
#[case("eigobrowser://open", None)]
#[case("eigobrowser://open?url=", None)]
#[case("eigobrowser://open?url=not%20a%20url", None)]
#[case("not a link", None)]
fn test_parse_open_url(#[case] link: &str, #[case] expected: Option<&str>) {
    assert_eq!(parse_open_url(link, SCHEME).as_deref(), expected);
}

#[rstest]
#[case("https://example.com/")]
#[case("https://example.com/search?q=a b&lang=en")]
#[case("https://example.com/path#frag")]
fn test_built_link_parses_back(#[case] target: &str) {
    let link = build_open_url(target, SCHEME);
    assert!(link.starts_with("eigobrowser://open?url="));
    assert_eq!(parse_open_url(&link, SCHEME).as_deref(), Some(target));
}

// === Shared slot ===

#[test]
fn test_take_pending_returns_and_clears() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let slot = SharedUrlSlot::new(Box::new(Rc::clone(&kv)), SHARED_KEY);

    slot.offer("https://shared.example/").unwrap();

    assert_eq!(
        slot.take_pending().unwrap().as_deref(),
        Some("https://shared.example/")
    );
    assert_eq!(kv.get(SHARED_KEY).unwrap(), None);
    assert_eq!(slot.take_pending().unwrap(), None);
}

#[test]
fn test_offer_replaces_pending_url() {
    let slot = SharedUrlSlot::new(Box::new(MemoryKeyValueStore::new()), SHARED_KEY);
    slot.offer("https://first.example/").unwrap();
    slot.offer("https://second.example/").unwrap();
    assert_eq!(
        slot.take_pending().unwrap().as_deref(),
        Some("https://second.example/")
    );
}

#[test]
fn test_malformed_shared_value_is_dropped_and_cleared() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    kv.set(SHARED_KEY, "definitely not a url").unwrap();
    let slot = SharedUrlSlot::new(Box::new(Rc::clone(&kv)), SHARED_KEY);

    assert_eq!(slot.take_pending().unwrap(), None);
    assert_eq!(kv.get(SHARED_KEY).unwrap(), None);
}

// === App integration ===

#[test]
fn test_open_link_adds_active_tab() {
    let dir = TempDir::new().unwrap();
    let shared = Rc::new(MemoryKeyValueStore::new());
    let mut app = app_with_slot(&dir, &shared);

    app.handle_open_link("eigobrowser://open?url=https%3A%2F%2Fnews.example%2F");
    app.pump();

    assert_eq!(app.tab_manager.tab_count(), 2);
    assert_eq!(active_url(&app), "https://news.example/");
}

#[test]
fn test_foreign_link_is_ignored() {
    let dir = TempDir::new().unwrap();
    let shared = Rc::new(MemoryKeyValueStore::new());
    let mut app = app_with_slot(&dir, &shared);

    app.handle_open_link("someoneelse://open?url=https%3A%2F%2Fnews.example%2F");

    assert_eq!(app.tab_manager.tab_count(), 1);
}

#[test]
fn test_open_url_closes_overview() {
    let dir = TempDir::new().unwrap();
    let shared = Rc::new(MemoryKeyValueStore::new());
    let mut app = app_with_slot(&dir, &shared);
    app.tab_manager.open_tab_overview();

    app.open_url("https://a.example/");

    assert!(!app.tab_manager.is_overview_visible());
    assert_eq!(active_url(&app), "https://a.example/");
}

#[test]
fn test_foreground_drains_shared_slot_once() {
    let dir = TempDir::new().unwrap();
    let shared = Rc::new(MemoryKeyValueStore::new());
    let mut app = app_with_slot(&dir, &shared);
    shared.set(SHARED_KEY, "https://shared.example/").unwrap();

    app.handle_foreground();
    app.handle_foreground();

    assert_eq!(app.tab_manager.tab_count(), 2);
    assert_eq!(active_url(&app), "https://shared.example/");
    assert_eq!(shared.get(SHARED_KEY).unwrap(), None);
}

#[test]
fn test_foreground_with_empty_slot_does_nothing() {
    let dir = TempDir::new().unwrap();
    let shared = Rc::new(MemoryKeyValueStore::new());
    let mut app = app_with_slot(&dir, &shared);

    app.handle_foreground();

    assert_eq!(app.tab_manager.tab_count(), 1);
}

#[test]
fn test_inbound_events_are_handled_on_pump() {
    let dir = TempDir::new().unwrap();
    let shared = Rc::new(MemoryKeyValueStore::new());
    let mut app = app_with_slot(&dir, &shared);
    let inbound = app.inbound();

    inbound
        .send(AppEvent::OpenLink(build_open_url("https://queued.example/", SCHEME)))
        .unwrap();
    assert_eq!(app.tab_manager.tab_count(), 1);

    app.pump();

    assert_eq!(app.tab_manager.tab_count(), 2);
    assert_eq!(active_url(&app), "https://queued.example/");
}

#[test]
fn test_wake_called_for_inbound_work() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let dir = TempDir::new().unwrap();
    let wakes = Arc::new(AtomicUsize::new(0));
    let w = wakes.clone();
    let config = dir.path().join("settings.json").to_string_lossy().to_string();
    let mut app = App::from_parts(AppParts {
        settings: BrowserSettings::default(),
        settings_engine: SettingsEngine::new(Some(config)),
        factory: Box::new(HeadlessSurfaceFactory::new()),
        session_store: Box::new(KeyValueSessionStore::new(Box::new(MemoryKeyValueStore::new()))),
        shared_slot: SharedUrlSlot::new(Box::new(MemoryKeyValueStore::new()), SHARED_KEY),
        explain: None,
        speech: Box::new(Silent),
        wake: Some(Arc::new(move || {
            w.fetch_add(1, Ordering::SeqCst);
        })),
    });

    assert!(wakes.load(Ordering::SeqCst) > 0, "bootstrap events wake the host");
    app.pump();
    let before = wakes.load(Ordering::SeqCst);

    app.open_url("https://woken.example/");

    assert!(wakes.load(Ordering::SeqCst) > before);
}
