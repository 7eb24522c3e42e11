//! Unit tests for per-tab surface event handling.
//!
//! A scripted page simulator stands in for the surface: it reports nothing
//! by itself, so each test feeds the coordinator exactly the events it wants.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use eigo_browser::managers::session_manager::KeyValueSessionStore;
use eigo_browser::managers::tab::Tab;
use eigo_browser::managers::tab_coordinator::{CoordinatorAction, TabCoordinator};
use eigo_browser::managers::tab_manager::{TabManager, TabManagerConfig, TabManagerTrait};
use eigo_browser::services::key_value_store::MemoryKeyValueStore;
use eigo_browser::services::translation_mode::{ENABLE_SCRIPT, MESSAGE_NAME};
use eigo_browser::surface::{
    RenderSurface, SurfaceDispatch, SurfaceEvent, SurfaceEventSink, SurfaceFactory, SurfaceId,
    SurfaceMessage,
};
use eigo_browser::types::errors::SurfaceError;
use eigo_browser::types::settings::ChromeSettings;
use eigo_browser::types::tab::{ScrollDirection, Snapshot, TabChange, TabField};

#[derive(Default)]
struct PageState {
    url: Option<String>,
    title: Option<String>,
    loading: bool,
    can_go_back: bool,
    scripts: Vec<String>,
    loads: Vec<String>,
}

struct PageSimulator {
    id: SurfaceId,
    state: Arc<Mutex<PageState>>,
}

impl RenderSurface for PageSimulator {
    fn id(&self) -> SurfaceId {
        self.id
    }
    fn load(&mut self, url: &str) -> Result<(), SurfaceError> {
        self.state.lock().unwrap().loads.push(url.to_string());
        Ok(())
    }
    fn go_back(&mut self) {}
    fn go_forward(&mut self) {}
    fn reload(&mut self) {}
    fn stop_loading(&mut self) {}
    fn current_url(&self) -> Option<String> {
        self.state.lock().unwrap().url.clone()
    }
    fn title(&self) -> Option<String> {
        self.state.lock().unwrap().title.clone()
    }
    fn can_go_back(&self) -> bool {
        self.state.lock().unwrap().can_go_back
    }
    fn can_go_forward(&self) -> bool {
        false
    }
    fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }
    fn set_visible(&mut self, _visible: bool) {}
    fn capture_snapshot(&mut self) {}
    fn evaluate_script(&mut self, script: &str) -> Result<(), SurfaceError> {
        self.state.lock().unwrap().scripts.push(script.to_string());
        Ok(())
    }
    fn add_message_handler(&mut self, _name: &str) {}
}

#[derive(Clone, Default)]
struct SimulatorFactory {
    created: Arc<AtomicU64>,
    state: Arc<Mutex<PageState>>,
}

impl SurfaceFactory for SimulatorFactory {
    fn create_surface(&self, _events: SurfaceEventSink) -> Box<dyn RenderSurface> {
        let id = SurfaceId(self.created.fetch_add(1, Ordering::SeqCst));
        Box::new(PageSimulator {
            id,
            state: self.state.clone(),
        })
    }
}

fn noop_dispatch() -> SurfaceDispatch {
    Arc::new(|_| {})
}

fn setup() -> (Tab, TabCoordinator, SimulatorFactory, Arc<Mutex<Vec<TabChange>>>) {
    let factory = SimulatorFactory::default();
    let tab = Tab::new("https://start.com/", &factory, noop_dispatch());
    let changes = Arc::new(Mutex::new(Vec::new()));
    let c = changes.clone();
    tab.subscribe(move |change| c.lock().unwrap().push(change.clone()));
    (tab, TabCoordinator::new(&ChromeSettings::default()), factory, changes)
}

fn fields(changes: &Arc<Mutex<Vec<TabChange>>>) -> Vec<TabField> {
    changes.lock().unwrap().iter().map(|c| c.field).collect()
}

fn selection(text: &str) -> SurfaceEvent {
    SurfaceEvent::ScriptMessage {
        name: MESSAGE_NAME.to_string(),
        body: text.to_string(),
    }
}

// ─── Navigation lifecycle ───

#[test]
fn test_navigation_started_marks_loading() {
    let (mut tab, mut coordinator, _, changes) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::NavigationStarted, false);
    assert!(tab.is_loading());
    assert_eq!(fields(&changes), vec![TabField::Loading]);
}

#[test]
fn test_navigation_finished_copies_surface_state() {
    let (mut tab, mut coordinator, factory, _) = setup();
    {
        let mut page = factory.state.lock().unwrap();
        page.url = Some("https://final.com/".into());
        page.title = Some("Final".into());
        page.can_go_back = true;
    }

    let actions = coordinator.handle(&mut tab, SurfaceEvent::NavigationFinished, false);
    assert_eq!(tab.url(), "https://final.com/");
    assert_eq!(tab.title(), "Final");
    assert!(tab.can_go_back());
    assert_eq!(actions, vec![CoordinatorAction::UrlChanged]);
}

#[test]
fn test_navigation_failed_clears_loading() {
    let (mut tab, mut coordinator, _, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::NavigationStarted, false);
    coordinator.handle(&mut tab, SurfaceEvent::NavigationFailed("offline".into()), false);
    assert!(!tab.is_loading());
}

#[test]
fn test_finish_reapplies_translation_mode() {
    let (mut tab, mut coordinator, factory, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::NavigationFinished, true);
    assert_eq!(factory.state.lock().unwrap().scripts, vec![ENABLE_SCRIPT.to_string()]);
}

#[test]
fn test_finish_without_translation_mode_sends_no_script() {
    let (mut tab, mut coordinator, factory, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::NavigationFinished, false);
    assert!(factory.state.lock().unwrap().scripts.is_empty());
}

// ─── Field updates ───

#[test]
fn test_url_change_reports_action_once() {
    let (mut tab, mut coordinator, _, changes) = setup();
    let first = coordinator.handle(&mut tab, SurfaceEvent::UrlChanged(Some("https://x.com/".into())), false);
    let second = coordinator.handle(&mut tab, SurfaceEvent::UrlChanged(Some("https://x.com/".into())), false);

    assert_eq!(first, vec![CoordinatorAction::UrlChanged]);
    assert!(second.is_empty());
    assert_eq!(fields(&changes), vec![TabField::Url]);
}

#[test]
fn test_missing_url_is_ignored() {
    let (mut tab, mut coordinator, _, _) = setup();
    assert!(coordinator.handle(&mut tab, SurfaceEvent::UrlChanged(None), false).is_empty());
    assert!(coordinator
        .handle(&mut tab, SurfaceEvent::UrlChanged(Some(String::new())), false)
        .is_empty());
    assert_eq!(tab.url(), "https://start.com/");
}

#[test]
fn test_empty_title_falls_back_to_host() {
    let (mut tab, mut coordinator, _, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::TitleChanged(Some(" ".into())), false);
    assert_eq!(tab.title(), "start.com");
}

#[test]
fn test_snapshot_is_cached() {
    let (mut tab, mut coordinator, _, changes) = setup();
    let snapshot = Snapshot {
        width: 10,
        height: 20,
        data: vec![1, 2, 3],
    };
    coordinator.handle(&mut tab, SurfaceEvent::SnapshotCaptured(Ok(snapshot.clone())), false);
    assert_eq!(tab.screenshot(), Some(&snapshot));
    assert_eq!(fields(&changes), vec![TabField::Screenshot]);
}

#[test]
fn test_failed_snapshot_keeps_previous() {
    let (mut tab, mut coordinator, _, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::SnapshotCaptured(Err("gpu".into())), false);
    assert!(tab.screenshot().is_none());
}

// ─── Page messages ───

#[test]
fn test_selection_is_forwarded() {
    let (mut tab, mut coordinator, _, _) = setup();
    let actions = coordinator.handle(&mut tab, selection("serendipity"), true);
    assert_eq!(actions, vec![CoordinatorAction::SelectedText("serendipity".into())]);
}

#[test]
fn test_selection_during_navigation_is_dropped() {
    let (mut tab, mut coordinator, _, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::NavigationStarted, true);
    assert!(coordinator.handle(&mut tab, selection("stale"), true).is_empty());

    coordinator.handle(&mut tab, SurfaceEvent::NavigationFinished, true);
    assert_eq!(
        coordinator.handle(&mut tab, selection("fresh"), true),
        vec![CoordinatorAction::SelectedText("fresh".into())]
    );
}

#[test]
fn test_unknown_message_name_is_ignored() {
    let (mut tab, mut coordinator, _, _) = setup();
    let event = SurfaceEvent::ScriptMessage {
        name: "somethingElse".into(),
        body: "x".into(),
    };
    assert!(coordinator.handle(&mut tab, event, true).is_empty());
}

// ─── Scrolling ───

#[test]
fn test_scroll_offsets_become_directions() {
    let (mut tab, mut coordinator, _, _) = setup();
    let mut directions = Vec::new();
    for y in [0.0, 5.0, 40.0, 80.0, 55.0] {
        for action in coordinator.handle(&mut tab, SurfaceEvent::Scrolled(y), false) {
            if let CoordinatorAction::Scroll(direction) = action {
                directions.push(direction);
            }
        }
    }
    assert_eq!(
        directions,
        vec![
            ScrollDirection::Up,
            ScrollDirection::Up,
            ScrollDirection::Up,
            ScrollDirection::Down,
            ScrollDirection::Up,
        ]
    );
}

#[test]
fn test_small_scroll_reports_nothing() {
    let (mut tab, mut coordinator, _, _) = setup();
    coordinator.handle(&mut tab, SurfaceEvent::Scrolled(200.0), false);
    assert!(coordinator.handle(&mut tab, SurfaceEvent::Scrolled(205.0), false).is_empty());
}

// ─── New windows ───

#[test]
fn test_new_window_request_becomes_open_tab() {
    let (mut tab, mut coordinator, factory, _) = setup();
    let surface = tab.surface_id();
    let actions = coordinator.handle(
        &mut tab,
        SurfaceEvent::NewWindowRequested(Some("https://popup.com/".into())),
        false,
    );

    assert_eq!(actions, vec![CoordinatorAction::OpenTab("https://popup.com/".into())]);
    assert_eq!(tab.surface_id(), surface);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_new_window_without_target_is_ignored() {
    let (mut tab, mut coordinator, _, _) = setup();
    assert!(coordinator
        .handle(&mut tab, SurfaceEvent::NewWindowRequested(None), false)
        .is_empty());
}

#[test]
fn test_new_window_through_manager_adds_exactly_one_surface() {
    let factory = SimulatorFactory::default();
    let mut manager = TabManager::new(
        TabManagerConfig::default(),
        Box::new(factory.clone()),
        noop_dispatch(),
        Box::new(KeyValueSessionStore::new(Box::new(MemoryKeyValueStore::new()))),
    );
    manager.initialize();
    let source = manager.active_tab_id().unwrap();
    let source_surface = manager.get_tab(source).unwrap().surface_id();
    let created_before = factory.created.load(Ordering::SeqCst);

    manager.handle_surface_message(SurfaceMessage {
        tab_id: source,
        event: SurfaceEvent::NewWindowRequested(Some("https://popup.com/".into())),
    });

    assert_eq!(factory.created.load(Ordering::SeqCst), created_before + 1);
    assert_eq!(manager.get_tab(source).unwrap().surface_id(), source_surface);
    assert_eq!(manager.tab_count(), 2);
}

#[test]
fn test_new_tab_starts_loading_its_url() {
    let (_tab, _, factory, _) = setup();
    assert_eq!(factory.state.lock().unwrap().loads, vec!["https://start.com/".to_string()]);
}
