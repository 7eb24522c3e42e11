//! Unit tests for session persistence: the key-value session store, the
//! debounced save and restore through the TabManager.

use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eigo_browser::app::{App, AppParts};
use eigo_browser::database::Database;
use eigo_browser::managers::session_manager::{
    KeyValueSessionStore, SaveDebouncer, SessionStore, ACTIVE_TAB_INDEX_KEY, SAVED_TAB_URLS_KEY,
};
use eigo_browser::managers::tab_manager::{TabManager, TabManagerConfig, TabManagerTrait};
use eigo_browser::services::key_value_store::{
    KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore,
};
use eigo_browser::services::settings_engine::SettingsEngine;
use eigo_browser::services::speech::{SpeechDone, SpeechService};
use eigo_browser::services::url_handoff::SharedUrlSlot;
use eigo_browser::surface::headless::HeadlessSurfaceFactory;
use eigo_browser::surface::SurfaceMessage;
use eigo_browser::types::errors::SessionError;
use eigo_browser::types::session::SessionSnapshot;
use eigo_browser::types::settings::BrowserSettings;
use tempfile::TempDir;
use tokio::time::Instant;

const DEFAULT_URL: &str = "https://www.reddit.com/";

struct Session {
    manager: TabManager,
    queue: Arc<Mutex<Vec<SurfaceMessage>>>,
}

impl Session {
    fn open(kv: &Rc<MemoryKeyValueStore>, restore_on_launch: bool) -> Self {
        let queue = Arc::new(Mutex::new(Vec::new()));
        let q = queue.clone();
        let config = TabManagerConfig {
            default_url: DEFAULT_URL.to_string(),
            restore_on_launch,
            save_debounce: Duration::from_millis(1000),
            ..TabManagerConfig::default()
        };
        let mut manager = TabManager::new(
            config,
            Box::new(HeadlessSurfaceFactory::new()),
            Arc::new(move |m| q.lock().unwrap().push(m)),
            Box::new(KeyValueSessionStore::new(Box::new(Rc::clone(kv)))),
        );
        manager.initialize();
        let mut session = Self { manager, queue };
        session.pump();
        session
    }

    fn pump(&mut self) {
        loop {
            let batch: Vec<SurfaceMessage> = std::mem::take(&mut *self.queue.lock().unwrap());
            if batch.is_empty() {
                break;
            }
            for message in batch {
                self.manager.handle_surface_message(message);
            }
        }
    }

    fn urls(&self) -> Vec<String> {
        self.manager
            .tab_ids()
            .into_iter()
            .map(|id| self.manager.get_tab(id).unwrap().url().to_string())
            .collect()
    }

    fn active_index(&self) -> usize {
        let active = self.manager.active_tab_id().unwrap();
        self.manager.index_of(active).unwrap()
    }
}

fn stored_urls(kv: &MemoryKeyValueStore) -> Option<Vec<String>> {
    kv.get(SAVED_TAB_URLS_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

fn seed(kv: &MemoryKeyValueStore, urls: &[&str], active: Option<&str>) {
    kv.set(SAVED_TAB_URLS_KEY, &serde_json::to_string(urls).unwrap())
        .unwrap();
    if let Some(active) = active {
        kv.set(ACTIVE_TAB_INDEX_KEY, active).unwrap();
    }
}

// === KeyValueSessionStore ===

#[test]
fn test_store_writes_both_keys() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let store = KeyValueSessionStore::new(Box::new(Rc::clone(&kv)));

    store
        .save(&SessionSnapshot {
            urls: vec!["https://a.com/".to_string(), "https://b.com/".to_string()],
            active_index: 1,
        })
        .unwrap();

    assert_eq!(
        kv.get(SAVED_TAB_URLS_KEY).unwrap().as_deref(),
        Some(r#"["https://a.com/","https://b.com/"]"#)
    );
    assert_eq!(kv.get(ACTIVE_TAB_INDEX_KEY).unwrap().as_deref(), Some("1"));
}

#[test]
fn test_store_restore_nothing_saved() {
    let store = KeyValueSessionStore::new(Box::new(MemoryKeyValueStore::new()));
    assert_eq!(store.restore().unwrap(), None);
}

#[test]
fn test_store_restore_empty_list_is_none() {
    let kv = MemoryKeyValueStore::new();
    seed(&kv, &[], Some("0"));
    let store = KeyValueSessionStore::new(Box::new(kv));
    assert_eq!(store.restore().unwrap(), None);
}

#[test]
fn test_store_missing_index_defaults_to_zero() {
    let kv = MemoryKeyValueStore::new();
    seed(&kv, &["https://a.com/"], None);
    let store = KeyValueSessionStore::new(Box::new(kv));

    let snapshot = store.restore().unwrap().unwrap();
    assert_eq!(snapshot.active_index, 0);
}

#[test]
fn test_store_corrupt_urls_is_serialization_error() {
    let kv = MemoryKeyValueStore::new();
    kv.set(SAVED_TAB_URLS_KEY, "not json").unwrap();
    let store = KeyValueSessionStore::new(Box::new(kv));

    assert!(matches!(
        store.restore(),
        Err(SessionError::Serialization(_))
    ));
}

#[test]
fn test_store_corrupt_index_is_serialization_error() {
    let kv = MemoryKeyValueStore::new();
    seed(&kv, &["https://a.com/"], Some("two"));
    let store = KeyValueSessionStore::new(Box::new(kv));

    assert!(matches!(
        store.restore(),
        Err(SessionError::Serialization(_))
    ));
}

#[test]
fn test_store_clear_removes_keys() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    seed(&kv, &["https://a.com/"], Some("0"));
    let store = KeyValueSessionStore::new(Box::new(Rc::clone(&kv)));

    store.clear().unwrap();

    assert_eq!(kv.get(SAVED_TAB_URLS_KEY).unwrap(), None);
    assert_eq!(kv.get(ACTIVE_TAB_INDEX_KEY).unwrap(), None);
}

#[test]
fn test_failed_save_keeps_previous_session_whole() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eigo.db");
    let store = KeyValueSessionStore::new(Box::new(SqliteKeyValueStore::new(
        Database::open(&path).unwrap(),
    )));
    let first = SessionSnapshot {
        urls: vec!["https://a.com/".to_string(), "https://b.com/".to_string()],
        active_index: 1,
    };
    store.save(&first).unwrap();

    Database::open(&path)
        .unwrap()
        .connection()
        .execute_batch(&format!(
            "CREATE TRIGGER reject_index BEFORE UPDATE ON kv_store WHEN NEW.key = '{ACTIVE_TAB_INDEX_KEY}'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;"
        ))
        .unwrap();

    let second = SessionSnapshot {
        urls: vec!["https://c.com/".to_string()],
        active_index: 0,
    };
    assert!(store.save(&second).is_err());
    assert_eq!(store.restore().unwrap(), Some(first));
}

// === SaveDebouncer ===

#[test]
fn test_debouncer_restarts_quiet_period() {
    let start = Instant::now();
    let mut debouncer = SaveDebouncer::new(Duration::from_millis(1000));

    debouncer.schedule(start);
    debouncer.schedule(start + Duration::from_millis(600));

    assert!(!debouncer.is_due(start + Duration::from_millis(1000)));
    assert!(debouncer.take_due(start + Duration::from_millis(1600)));
    assert!(!debouncer.is_pending());
}

// === Through the TabManager ===

#[test]
fn test_rapid_navigation_writes_once_with_final_url() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let mut session = Session::open(&kv, true);
    let tab = session.manager.active_tab_id().unwrap();

    for url in ["https://a.com/", "https://b.com/", "https://c.com/"] {
        session.manager.navigate(tab, url).unwrap();
        session.pump();
    }

    assert_eq!(stored_urls(&kv), None, "nothing written before the quiet period");
    assert!(!session.manager.poll_scheduled_save(Instant::now()));

    let deadline = session.manager.next_scheduled_save().unwrap();
    assert!(session.manager.poll_scheduled_save(deadline));
    assert_eq!(stored_urls(&kv), Some(vec!["https://c.com/".to_string()]));

    assert!(session.manager.next_scheduled_save().is_none());
    assert!(!session.manager.poll_scheduled_save(deadline + Duration::from_secs(10)));
}

#[test]
fn test_structural_change_saves_immediately_and_cancels_pending() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let mut session = Session::open(&kv, true);
    let first = session.manager.active_tab_id().unwrap();

    session.manager.navigate(first, "https://a.com/").unwrap();
    session.pump();
    assert!(session.manager.next_scheduled_save().is_some());

    session.manager.add_tab(Some("https://b.com/"));
    session.pump();

    assert!(session.manager.next_scheduled_save().is_none());
    assert_eq!(
        stored_urls(&kv),
        Some(vec!["https://a.com/".to_string(), "https://b.com/".to_string()])
    );
    assert_eq!(kv.get(ACTIVE_TAB_INDEX_KEY).unwrap().as_deref(), Some("1"));
}

#[test]
fn test_background_saves_immediately() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let mut session = Session::open(&kv, true);
    assert_eq!(stored_urls(&kv), None);

    session.manager.handle_app_backgrounded();

    assert_eq!(stored_urls(&kv), Some(vec![DEFAULT_URL.to_string()]));
}

#[test]
fn test_session_survives_relaunch() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    {
        let mut session = Session::open(&kv, true);
        session.manager.add_tab(Some("https://a.com/"));
        let b = session.manager.add_tab(Some("https://b.com/"));
        session.pump();
        session.manager.add_tab(Some("https://c.com/"));
        session.manager.switch_to_tab(b).unwrap();
    }

    let session = Session::open(&kv, true);
    assert_eq!(
        session.urls(),
        vec![DEFAULT_URL, "https://a.com/", "https://b.com/", "https://c.com/"]
    );
    assert_eq!(session.active_index(), 2);
}

#[test]
fn test_out_of_range_index_clamps_to_last() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    seed(&kv, &["https://a.com/", "https://b.com/"], Some("5"));

    let session = Session::open(&kv, true);

    assert_eq!(session.urls(), vec!["https://a.com/", "https://b.com/"]);
    assert_eq!(session.active_index(), 1);
}

#[test]
fn test_corrupt_session_falls_back_to_default_tab() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    kv.set(SAVED_TAB_URLS_KEY, "{oops").unwrap();

    let session = Session::open(&kv, true);

    assert_eq!(session.urls(), vec![DEFAULT_URL]);
}

#[test]
fn test_restore_disabled_ignores_saved_session() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    seed(&kv, &["https://a.com/", "https://b.com/"], Some("1"));

    let session = Session::open(&kv, false);

    assert_eq!(session.urls(), vec![DEFAULT_URL]);
}

// === Through the owner loop ===

struct Silent;

impl SpeechService for Silent {
    fn speak(&mut self, _text: &str, _language: &str, _on_done: SpeechDone) {}

    fn stop(&mut self) {}
}

fn app_over(kv: &Rc<MemoryKeyValueStore>, dir: &TempDir) -> App {
    let config = dir.path().join("settings.json").to_string_lossy().to_string();
    App::from_parts(AppParts {
        settings: BrowserSettings::default(),
        settings_engine: SettingsEngine::new(Some(config)),
        factory: Box::new(HeadlessSurfaceFactory::new()),
        session_store: Box::new(KeyValueSessionStore::new(Box::new(Rc::clone(kv)))),
        shared_slot: SharedUrlSlot::new(Box::new(MemoryKeyValueStore::new()), "SharedURL"),
        explain: None,
        speech: Box::new(Silent),
        wake: None,
    })
}

#[tokio::test(start_paused = true)]
async fn test_owner_loop_writes_debounced_save_after_quiet_period() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let dir = TempDir::new().unwrap();
    let mut app = app_over(&kv, &dir);
    app.pump();

    let tab = app.tab_manager.active_tab_id().unwrap();
    app.tab_manager.navigate(tab, "https://a.com/").unwrap();
    app.tab_manager.navigate(tab, "https://b.com/").unwrap();
    app.pump();
    assert_eq!(stored_urls(&kv), None);

    let start = Instant::now();
    app.wait_for_work().await;

    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert_eq!(stored_urls(&kv), Some(vec!["https://b.com/".to_string()]));
    assert!(app.tab_manager.next_scheduled_save().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_owner_loop_restarts_quiet_period_on_new_navigation() {
    let kv = Rc::new(MemoryKeyValueStore::new());
    let dir = TempDir::new().unwrap();
    let mut app = app_over(&kv, &dir);
    app.pump();

    let tab = app.tab_manager.active_tab_id().unwrap();
    app.tab_manager.navigate(tab, "https://a.com/").unwrap();
    app.pump();

    tokio::time::advance(Duration::from_millis(600)).await;
    app.tab_manager.navigate(tab, "https://b.com/").unwrap();
    app.pump();
    let restarted = Instant::now();

    tokio::time::advance(Duration::from_millis(600)).await;
    app.pump();
    assert_eq!(stored_urls(&kv), None, "quiet period restarted by the second navigation");

    app.wait_for_work().await;
    assert!(restarted.elapsed() >= Duration::from_millis(1000));
    assert_eq!(stored_urls(&kv), Some(vec!["https://b.com/".to_string()]));
}
