//! In-process render surface with no rendering engine behind it.
//!
//! Navigations complete immediately and report the same event sequence a
//! real engine would (start, loading, url, title, history flags, finish).
//! Scripts are recorded rather than executed. Used by the console demo, the
//! control server and the tests; [`HeadlessSurfaceFactory`] keeps a shared
//! log so callers can inspect what each surface was asked to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use url::Url;

use super::{RenderSurface, SurfaceEvent, SurfaceEventSink, SurfaceFactory, SurfaceId};
use crate::types::errors::SurfaceError;
use crate::types::tab::Snapshot;

const VIEWPORT: (u32, u32) = (390, 844);

/// What a single headless surface has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRecord {
    pub loads: Vec<String>,
    pub scripts: Vec<String>,
    pub message_handlers: Vec<String>,
    pub visible: bool,
    pub snapshots_requested: usize,
}

#[derive(Default)]
struct HeadlessLog {
    records: HashMap<SurfaceId, SurfaceRecord>,
    titles: HashMap<String, String>,
}

type SharedLog = Arc<Mutex<HeadlessLog>>;

fn lock(log: &SharedLog) -> std::sync::MutexGuard<'_, HeadlessLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory for [`HeadlessSurface`]s. Clones share the id counter and log.
#[derive(Clone, Default)]
pub struct HeadlessSurfaceFactory {
    next_id: Arc<AtomicU64>,
    log: SharedLog,
}

impl HeadlessSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later load of `url` report `title`.
    pub fn set_page_title(&self, url: &str, title: &str) {
        lock(&self.log).titles.insert(url.to_string(), title.to_string());
    }

    pub fn created_count(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn record(&self, id: SurfaceId) -> Option<SurfaceRecord> {
        lock(&self.log).records.get(&id).cloned()
    }
}

impl SurfaceFactory for HeadlessSurfaceFactory {
    fn create_surface(&self, events: SurfaceEventSink) -> Box<dyn RenderSurface> {
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.log).records.insert(id, SurfaceRecord::default());
        debug!(surface = id.0, tab_id = %events.tab_id(), "headless surface created");
        Box::new(HeadlessSurface {
            id,
            events,
            log: Arc::clone(&self.log),
            history: Vec::new(),
            index: None,
            title: None,
        })
    }
}

pub struct HeadlessSurface {
    id: SurfaceId,
    events: SurfaceEventSink,
    log: SharedLog,
    history: Vec<String>,
    index: Option<usize>,
    title: Option<String>,
}

impl HeadlessSurface {
    fn with_record(&self, f: impl FnOnce(&mut SurfaceRecord)) {
        let mut log = lock(&self.log);
        if let Some(record) = log.records.get_mut(&self.id) {
            f(record);
        }
    }

    /// Reports a full navigation to the history entry at `self.index`.
    fn commit_current(&mut self) {
        let Some(url) = self.index.and_then(|i| self.history.get(i)).cloned() else {
            return;
        };
        self.title = lock(&self.log).titles.get(&url).cloned();
        self.with_record(|r| r.loads.push(url.clone()));

        self.events.emit(SurfaceEvent::NavigationStarted);
        self.events.emit(SurfaceEvent::LoadingChanged(true));
        self.events.emit(SurfaceEvent::UrlChanged(Some(url)));
        self.events.emit(SurfaceEvent::TitleChanged(self.title.clone()));
        self.events.emit(SurfaceEvent::CanGoBackChanged(self.can_go_back()));
        self.events.emit(SurfaceEvent::CanGoForwardChanged(self.can_go_forward()));
        self.events.emit(SurfaceEvent::LoadingChanged(false));
        self.events.emit(SurfaceEvent::NavigationFinished);
    }
}

impl RenderSurface for HeadlessSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn load(&mut self, url: &str) -> Result<(), SurfaceError> {
        let parsed = Url::parse(url).map_err(|e| SurfaceError::InvalidUrl(format!("{url}: {e}")))?;
        let next = self.index.map_or(0, |i| i + 1);
        self.history.truncate(next);
        self.history.push(parsed.to_string());
        self.index = Some(next);
        self.commit_current();
        Ok(())
    }

    fn go_back(&mut self) {
        if let Some(i) = self.index.filter(|i| *i > 0) {
            self.index = Some(i - 1);
            self.commit_current();
        }
    }

    fn go_forward(&mut self) {
        if let Some(i) = self.index.filter(|i| i + 1 < self.history.len()) {
            self.index = Some(i + 1);
            self.commit_current();
        }
    }

    fn reload(&mut self) {
        self.commit_current();
    }

    fn stop_loading(&mut self) {}

    fn current_url(&self) -> Option<String> {
        self.index.and_then(|i| self.history.get(i)).cloned()
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn can_go_back(&self) -> bool {
        matches!(self.index, Some(i) if i > 0)
    }

    fn can_go_forward(&self) -> bool {
        matches!(self.index, Some(i) if i + 1 < self.history.len())
    }

    fn is_loading(&self) -> bool {
        false
    }

    fn set_visible(&mut self, visible: bool) {
        self.with_record(|r| r.visible = visible);
    }

    fn capture_snapshot(&mut self) {
        self.with_record(|r| r.snapshots_requested += 1);
        // Nothing is rendered, so the frame is blank at viewport size.
        self.events.emit(SurfaceEvent::SnapshotCaptured(Ok(Snapshot {
            width: VIEWPORT.0,
            height: VIEWPORT.1,
            data: Vec::new(),
        })));
    }

    fn evaluate_script(&mut self, script: &str) -> Result<(), SurfaceError> {
        self.with_record(|r| r.scripts.push(script.to_string()));
        Ok(())
    }

    fn add_message_handler(&mut self, name: &str) {
        self.with_record(|r| {
            if !r.message_handlers.iter().any(|h| h == name) {
                r.message_handlers.push(name.to_string());
            }
        });
    }
}
