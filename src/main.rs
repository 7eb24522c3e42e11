//! Eigo Browser: a tabbed browser shell with a tap-to-look-up translation mode.
//!
//! With the `gui` feature this opens the desktop window. Without it, runs a
//! console walkthrough on headless surfaces with in-memory stores.

#[cfg(feature = "gui")]
fn main() {
    init_tracing();
    eigo_browser::ui::webview_app::run();
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eigo_browser=info")),
        )
        .init();
}

#[cfg(not(feature = "gui"))]
fn main() {
    init_tracing();

    println!();
    println!("Eigo Browser v{} (demo mode)", env!("CARGO_PKG_VERSION"));
    println!();

    let (mut app, factory) = demo::build_app();
    demo::tabs(&mut app);
    demo::overview(&mut app);
    demo::translation_mode(&mut app, &factory);
    demo::scrolling(&mut app);
    demo::handoff(&mut app);
    demo::session(&mut app);

    println!();
    println!("Demo finished.");
}

#[cfg(not(feature = "gui"))]
mod demo {
    use eigo_browser::app::{App, AppParts};
    use eigo_browser::managers::session_manager::KeyValueSessionStore;
    use eigo_browser::managers::tab_manager::TabManagerTrait;
    use eigo_browser::services::key_value_store::MemoryKeyValueStore;
    use eigo_browser::services::settings_engine::SettingsEngine;
    use eigo_browser::services::speech::CommandSpeech;
    use eigo_browser::services::translation_mode::MESSAGE_NAME;
    use eigo_browser::services::url_handoff::{build_open_url, SharedUrlSlot};
    use eigo_browser::surface::headless::HeadlessSurfaceFactory;
    use eigo_browser::surface::{SurfaceEvent, SurfaceMessage};
    use eigo_browser::types::settings::BrowserSettings;
    use tracing::warn;

    fn section(name: &str) {
        println!("---------------------------------------------------------------");
        println!("  {}", name);
        println!("---------------------------------------------------------------");
    }

    fn print_tabs(app: &App) {
        for state in app.tab_manager.tab_states() {
            let marker = if state.active { "*" } else { " " };
            println!("  {} {:<28} {}", marker, state.title, state.url);
        }
    }

    fn print_notifications(app: &mut App) {
        for event in app.take_notifications() {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("    event: {}", line);
            }
        }
    }

    pub fn build_app() -> (App, HeadlessSurfaceFactory) {
        let settings = BrowserSettings::default();
        let factory = HeadlessSurfaceFactory::new();
        factory.set_page_title(&settings.general.default_url, "Reddit");
        factory.set_page_title("https://bbc.com/", "BBC - Home");

        let config_path = std::env::temp_dir()
            .join("eigo-browser-demo-settings.json")
            .to_string_lossy()
            .to_string();

        let mut app = App::from_parts(AppParts {
            settings_engine: SettingsEngine::new(Some(config_path)),
            factory: Box::new(factory.clone()),
            session_store: Box::new(KeyValueSessionStore::new(Box::new(MemoryKeyValueStore::new()))),
            shared_slot: SharedUrlSlot::new(
                Box::new(MemoryKeyValueStore::new()),
                settings.handoff.shared_url_key.clone(),
            ),
            speech: Box::new(CommandSpeech::new(settings.translation.speech_command.clone())),
            explain: None,
            wake: None,
            settings,
        });
        app.pump();
        app.take_notifications();
        (app, factory)
    }

    pub fn tabs(app: &mut App) {
        section("Tabs");
        app.tab_manager.add_tab(None);
        let third = app.tab_manager.add_tab(Some("https://example.com"));
        app.pump();
        print_tabs(app);

        if let Err(e) = app.tab_manager.navigate(third, "rust ownership") {
            warn!(error = %e, "demo search failed");
        }
        app.pump();
        println!("  after searching in the third tab:");
        print_tabs(app);

        if let Err(e) = app.tab_manager.close_tab(third) {
            warn!(error = %e, "demo close failed");
        }
        app.pump();
        println!("  after closing it:");
        print_tabs(app);
        app.take_notifications();
    }

    pub fn overview(app: &mut App) {
        section("Tab overview");
        app.tab_manager.open_tab_overview();
        app.pump();
        if let Some(tab) = app.tab_manager.active_tab() {
            println!("  screenshot cached: {}", tab.screenshot().is_some());
        }
        let first = app.tab_manager.tab_ids()[0];
        if let Err(e) = app.tab_manager.select_from_overview(first) {
            warn!(error = %e, "demo overview selection failed");
        }
        app.pump();
        println!("  overview visible: {}", app.tab_manager.is_overview_visible());
        print_tabs(app);
        app.take_notifications();
    }

    pub fn translation_mode(app: &mut App, factory: &HeadlessSurfaceFactory) {
        section("Translation mode");
        app.tab_manager.set_translation_mode(true);
        app.pump();
        print_notifications(app);

        if let Some(tab) = app.tab_manager.active_tab() {
            let scripts = factory
                .record(tab.surface_id())
                .map(|r| r.scripts.len())
                .unwrap_or(0);
            println!("  scripts sent to the active tab: {}", scripts);

            let tab_id = tab.id();
            app.tab_manager.handle_surface_message(SurfaceMessage {
                tab_id,
                event: SurfaceEvent::ScriptMessage {
                    name: MESSAGE_NAME.to_string(),
                    body: "serendipity".to_string(),
                },
            });
            app.pump();
            println!("  selected: {:?}", app.lookup.selected_text());
            println!("  dictionary loading: {}", app.lookup.is_loading());
        }

        app.tab_manager.set_translation_mode(false);
        app.pump();
        app.take_notifications();
    }

    pub fn scrolling(app: &mut App) {
        section("Scroll-driven chrome");
        let Some(tab_id) = app.tab_manager.active_tab_id() else {
            return;
        };
        for y in [0.0, 5.0, 40.0, 80.0, 55.0, 200.0, 120.0] {
            app.tab_manager.handle_surface_message(SurfaceMessage {
                tab_id,
                event: SurfaceEvent::Scrolled(y),
            });
        }
        app.pump();
        print_notifications(app);
    }

    pub fn handoff(app: &mut App) {
        section("Inbound URLs");
        let link = build_open_url("https://news.ycombinator.com/", &app.settings().handoff.url_scheme);
        println!("  link: {}", link);
        app.handle_open_link(&link);

        if app.shared_slot().offer("https://en.wikipedia.org/wiki/Rust").is_ok() {
            app.handle_foreground();
        }
        app.pump();
        print_tabs(app);
        app.take_notifications();
    }

    pub fn session(app: &mut App) {
        section("Session");
        let snapshot = app.tab_manager.session_snapshot();
        println!("  {} tabs, active index {}", snapshot.urls.len(), snapshot.active_index);
        match app.tab_manager.save_session() {
            Ok(()) => println!("  saved"),
            Err(e) => println!("  save failed: {}", e),
        }
    }
}
