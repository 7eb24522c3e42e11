//! Application composition root.
//!
//! [`App`] owns the settings, the tab manager, the lookup session, the shared
//! URL slot and the two queues that feed the owner thread: surface messages
//! and [`AppEvent`]s. Hosts either call [`App::pump`] from their own event
//! loop or drive [`App::wait_for_work`] from async code.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::managers::lookup_session::{LookupOutcome, LookupRequest, LookupSession, SpeechFinished};
use crate::managers::session_manager::{KeyValueSessionStore, SessionStore};
use crate::managers::tab_manager::{TabManager, TabManagerConfig, TabManagerTrait};
use crate::platform;
use crate::services::explain_client::{ExplainClient, ExplainService};
use crate::services::key_value_store::SqliteKeyValueStore;
use crate::services::settings_engine::{apply_env_overrides, SettingsEngine, SettingsEngineTrait};
use crate::services::speech::{CommandSpeech, SpeechService};
use crate::services::url_handoff::{parse_open_url, SharedUrlSlot};
use crate::surface::{SurfaceDispatch, SurfaceFactory, SurfaceMessage};
use crate::types::errors::ExplainError;
use crate::types::events::BrowserEvent;
use crate::types::settings::BrowserSettings;
use crate::types::tab::TabField;

/// Overrides the directory holding the SQLite files.
pub const ENV_DATA_DIR: &str = "EIGO_DATA_DIR";

const SESSION_DB_FILE: &str = "eigo.db";
const SHARED_DB_FILE: &str = "shared.db";

/// Work for the owner thread that does not come from a surface.
#[derive(Debug)]
pub enum AppEvent {
    /// Re-emitted tab manager notification.
    Browser(BrowserEvent),
    /// A `scheme://open?url=...` link delivered by the OS.
    OpenLink(String),
    Foreground,
    Background,
    Lookup(LookupOutcome),
    SpeechFinished(SpeechFinished),
}

/// Called after anything is queued for the owner thread, so hosts with
/// their own event loop can wake up and call [`App::pump`].
pub type Wake = Arc<dyn Fn() + Send + Sync>;

/// Everything [`App::from_parts`] wires together.
pub struct AppParts {
    pub settings: BrowserSettings,
    pub settings_engine: SettingsEngine,
    pub factory: Box<dyn SurfaceFactory>,
    pub session_store: Box<dyn SessionStore>,
    pub shared_slot: SharedUrlSlot,
    pub explain: Option<Arc<dyn ExplainService>>,
    pub speech: Box<dyn SpeechService>,
    pub wake: Option<Wake>,
}

pub struct App {
    pub settings_engine: SettingsEngine,
    pub tab_manager: TabManager,
    pub lookup: LookupSession,
    settings: BrowserSettings,
    shared_slot: SharedUrlSlot,
    explain: Option<Arc<dyn ExplainService>>,
    speech: Box<dyn SpeechService>,
    surface_rx: UnboundedReceiver<SurfaceMessage>,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
    wake: Option<Wake>,
    outbox: Vec<BrowserEvent>,
}

enum Work {
    Surface(SurfaceMessage),
    App(AppEvent),
    SaveDue,
}

/// `EIGO_DATA_DIR` if set, otherwise the platform data directory.
pub fn resolve_data_dir<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_DATA_DIR)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(platform::get_data_dir)
}

impl App {
    /// Opens the on-disk stores and loads settings from `config_path` (or the
    /// platform default), applying environment overrides.
    ///
    /// Unreadable settings fall back to defaults; an unusable backend URL
    /// disables lookups instead of failing startup.
    pub fn open(
        factory: Box<dyn SurfaceFactory>,
        config_path: Option<String>,
        wake: Option<Wake>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings_engine = SettingsEngine::new(config_path);
        let mut settings = match settings_engine.load() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "settings unreadable, using defaults");
                BrowserSettings::default()
            }
        };
        apply_env_overrides(&mut settings, |k| std::env::var(k).ok());

        let data_dir = resolve_data_dir(|k| std::env::var(k).ok());
        std::fs::create_dir_all(&data_dir)?;
        info!(data_dir = %data_dir.display(), "opening stores");

        let session_db = Database::open(data_dir.join(SESSION_DB_FILE))?;
        let shared_db = Database::open(data_dir.join(SHARED_DB_FILE))?;

        let explain: Option<Arc<dyn ExplainService>> = match ExplainClient::new(&settings.backend) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "explanation backend disabled");
                None
            }
        };

        Ok(Self::from_parts(AppParts {
            speech: Box::new(CommandSpeech::new(settings.translation.speech_command.clone())),
            shared_slot: SharedUrlSlot::new(
                Box::new(SqliteKeyValueStore::new(shared_db)),
                settings.handoff.shared_url_key.clone(),
            ),
            session_store: Box::new(KeyValueSessionStore::new(Box::new(SqliteKeyValueStore::new(
                session_db,
            )))),
            settings,
            settings_engine,
            factory,
            explain,
            wake,
        }))
    }

    /// Wires the parts together and restores the session.
    pub fn from_parts(parts: AppParts) -> Self {
        let (surface_tx, surface_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let wake = parts.wake.clone();
        let dispatch: SurfaceDispatch = Arc::new(move |message| {
            if surface_tx.send(message).is_ok() {
                if let Some(wake) = &wake {
                    wake();
                }
            }
        });

        let mut tab_manager = TabManager::new(
            TabManagerConfig::from_settings(&parts.settings),
            parts.factory,
            dispatch,
            parts.session_store,
        );

        let relay_tx = events_tx.clone();
        let relay_wake = parts.wake.clone();
        tab_manager.subscribe(move |event| {
            if relay_tx.send(AppEvent::Browser(event.clone())).is_ok() {
                if let Some(wake) = &relay_wake {
                    wake();
                }
            }
        });
        tab_manager.initialize();

        Self {
            settings_engine: parts.settings_engine,
            tab_manager,
            lookup: LookupSession::new(parts.settings.translation.clone()),
            settings: parts.settings,
            shared_slot: parts.shared_slot,
            explain: parts.explain,
            speech: parts.speech,
            surface_rx,
            events_tx,
            events_rx,
            wake: parts.wake,
            outbox: Vec::new(),
        }
    }

    /// Settings the running components were built with.
    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Sender for inbound events from other threads (URL scheme handler,
    /// lifecycle notifications).
    pub fn inbound(&self) -> UnboundedSender<AppEvent> {
        self.events_tx.clone()
    }

    /// Browser events seen since the last call.
    pub fn take_notifications(&mut self) -> Vec<BrowserEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Handles everything queued so far, then any due debounced save.
    /// Returns how many queued items were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut round = 0;
            while let Ok(message) = self.surface_rx.try_recv() {
                self.tab_manager.handle_surface_message(message);
                round += 1;
            }
            while let Ok(event) = self.events_rx.try_recv() {
                self.handle_app_event(event);
                round += 1;
            }
            if round == 0 {
                break;
            }
            handled += round;
        }
        self.tab_manager.poll_scheduled_save(Instant::now());
        handled
    }

    /// Waits for the next queued item or the debounced save deadline and
    /// handles it. Call [`pump`](Self::pump) afterwards to drain the rest.
    pub async fn wait_for_work(&mut self) {
        let deadline = self.tab_manager.next_scheduled_save();
        let save_due = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let work = tokio::select! {
            Some(message) = self.surface_rx.recv() => Work::Surface(message),
            Some(event) = self.events_rx.recv() => Work::App(event),
            _ = save_due => Work::SaveDue,
        };

        match work {
            Work::Surface(message) => self.tab_manager.handle_surface_message(message),
            Work::App(event) => self.handle_app_event(event),
            Work::SaveDue => {
                self.tab_manager.poll_scheduled_save(Instant::now());
            }
        }
    }

    /// Owner loop for hosts without an event loop of their own.
    pub async fn run(&mut self) {
        loop {
            self.wait_for_work().await;
            self.pump();
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Browser(event) => {
                self.observe(&event);
                self.outbox.push(event);
            }
            AppEvent::OpenLink(link) => self.handle_open_link(&link),
            AppEvent::Foreground => self.handle_foreground(),
            AppEvent::Background => self.handle_background(),
            AppEvent::Lookup(outcome) => {
                self.lookup.complete(outcome);
            }
            AppEvent::SpeechFinished(done) => {
                self.lookup.speech_finished(done);
            }
        }
    }

    /// Keeps the lookup session in step with the tabs.
    fn observe(&mut self, event: &BrowserEvent) {
        let active = self.tab_manager.active_tab_id();
        match event {
            BrowserEvent::SelectedText { tab_id, text } if Some(*tab_id) == active => {
                if let Some(request) = self.lookup.set_selected_text(text) {
                    self.spawn_lookup(request);
                }
            }
            BrowserEvent::ActiveTabChanged { .. } => self.lookup.reset(),
            BrowserEvent::TabChanged(change)
                if change.field == TabField::Url && Some(change.tab_id) == active =>
            {
                self.lookup.reset()
            }
            _ => {}
        }
    }

    // === Inbound URLs ===

    /// Opens `url` in a new active tab, closing the overview first.
    pub fn open_url(&mut self, url: &str) {
        info!(url = %url, "opening inbound URL");
        self.tab_manager.close_tab_overview();
        self.tab_manager.add_tab(Some(url));
    }

    /// Handles a `scheme://open?url=...` link; anything else is ignored.
    pub fn handle_open_link(&mut self, link: &str) {
        match parse_open_url(link, &self.settings.handoff.url_scheme) {
            Some(url) => self.open_url(&url),
            None => debug!(link = %link, "ignoring inbound link"),
        }
    }

    /// Drains the shared slot written by the share extension.
    pub fn handle_foreground(&mut self) {
        match self.shared_slot.take_pending() {
            Ok(Some(url)) => self.open_url(&url),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "shared URL slot unreadable"),
        }
    }

    pub fn handle_background(&mut self) {
        self.tab_manager.handle_app_backgrounded();
    }

    pub fn shared_slot(&self) -> &SharedUrlSlot {
        &self.shared_slot
    }

    // === Lookups ===

    pub fn fetch_explanation(&mut self) -> bool {
        match self.lookup.fetch_explanation() {
            Some(request) => {
                self.spawn_lookup(request);
                true
            }
            None => false,
        }
    }

    pub fn send_chat(&mut self, input: &str) -> bool {
        match self.lookup.send_chat(input) {
            Some(request) => {
                self.spawn_lookup(request);
                true
            }
            None => false,
        }
    }

    /// Starts reading the selection; completion comes back as
    /// [`AppEvent::SpeechFinished`].
    pub fn speak_selection(&mut self) -> bool {
        let tx = self.events_tx.clone();
        let wake = self.wake.clone();
        self.lookup.speak_selection(self.speech.as_mut(), move |done| {
            if tx.send(AppEvent::SpeechFinished(done)).is_ok() {
                if let Some(wake) = wake {
                    wake();
                }
            }
        })
    }

    pub fn stop_speaking(&mut self) {
        self.lookup.stop_speaking(self.speech.as_mut());
    }

    /// Runs a backend request on the tokio runtime; the outcome comes back
    /// as [`AppEvent::Lookup`].
    fn spawn_lookup(&mut self, request: LookupRequest) {
        let fail = |request: &LookupRequest, error: ExplainError| LookupOutcome {
            generation: request.generation,
            kind: request.kind,
            result: Err(error),
        };

        let Some(service) = self.explain.clone() else {
            let outcome = fail(&request, ExplainError::Api("Backend not configured".to_string()));
            self.lookup.complete(outcome);
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, lookup skipped");
            let outcome = fail(&request, ExplainError::Api("No async runtime".to_string()));
            self.lookup.complete(outcome);
            return;
        };

        let tx = self.events_tx.clone();
        let wake = self.wake.clone();
        runtime.spawn(async move {
            let outcome = request.run(service.as_ref()).await;
            if tx.send(AppEvent::Lookup(outcome)).is_ok() {
                if let Some(wake) = wake {
                    wake();
                }
            }
        });
    }
}
