//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::config::SiteLayout;
use crate::error::AppError;
use crate::models::{
    ItemHandle, JobRecord, Locator, RunKind, ScrapeRun, SnapshotKey, SnapshotMeta, StopReason,
};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::{BrowserSession, SessionFactory, SnapshotStore};

// ---------------------------------------------------------------------------
// MockSession
// ---------------------------------------------------------------------------

/// Text a fake listing shows once opened.
#[derive(Debug, Clone)]
pub struct FakeListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub info_block: String,
}

impl FakeListing {
    pub fn new(title: &str, extras: &str) -> Self {
        Self {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "-Toronto, ON".to_string(),
            description: format!("Description of {title}"),
            info_block: format!("{title}\nAcme\n-\nToronto, ON\n{extras}"),
        }
    }
}

/// `pages` pages of `per_page` listings titled `Job {page}-{item}` (both 1-based).
pub fn make_pages(pages: u32, per_page: u32) -> Vec<Vec<FakeListing>> {
    (1..=pages)
        .map(|p| {
            (1..=per_page)
                .map(|i| FakeListing::new(&format!("Job {p}-{i}"), "$50,000 a year - Full-time"))
                .collect()
        })
        .collect()
}

/// Observable state shared by a mock session and its clones.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub searches: Vec<(String, String)>,
    /// 0-based index into the fake pages.
    pub current_page: usize,
    pub opened: Option<usize>,
    pub navigations: u32,
    pub interstitial_checks: u32,
    pub closed: bool,
}

#[derive(Debug, Clone, Default)]
struct Failures {
    search: bool,
    listing_pages: Vec<usize>,
    /// (page, item index)
    opens: Vec<(usize, usize)>,
    /// (page, item index)
    detail_timeouts: Vec<(usize, usize)>,
    next_pages: Vec<usize>,
}

/// In-memory stand-in for a browsing session over fixed result pages.
///
/// Failure injection uses 1-based page numbers and 0-based item indexes.
#[derive(Clone)]
pub struct MockSession {
    pages: Arc<Vec<Vec<FakeListing>>>,
    layout: SiteLayout,
    failures: Failures,
    state: Arc<Mutex<SessionState>>,
}

impl MockSession {
    pub fn with_pages(pages: Vec<Vec<FakeListing>>) -> Self {
        Self {
            pages: Arc::new(pages),
            layout: SiteLayout::default(),
            failures: Failures::default(),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn fail_search(&mut self) {
        self.failures.search = true;
    }

    pub fn fail_listing(&mut self, page: usize) {
        self.failures.listing_pages.push(page);
    }

    pub fn fail_open(&mut self, page: usize, index: usize) {
        self.failures.opens.push((page, index));
    }

    pub fn time_out_detail(&mut self, page: usize, index: usize) {
        self.failures.detail_timeouts.push((page, index));
    }

    pub fn fail_next(&mut self, page: usize) {
        self.failures.next_pages.push(page);
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    fn page_number(&self) -> usize {
        self.state.lock().unwrap().current_page + 1
    }

    fn opened_listing(&self) -> Option<FakeListing> {
        let state = self.state.lock().unwrap();
        let index = state.opened?;
        self.pages.get(state.current_page)?.get(index).cloned()
    }
}

impl BrowserSession for MockSession {
    async fn search(&mut self, query: &str, location: &str) -> Result<(), AppError> {
        if self.failures.search {
            return Err(AppError::SearchInput("query input not found".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.searches.push((query.to_string(), location.to_string()));
        state.current_page = 0;
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), AppError> {
        if *locator != self.layout.detail_container {
            return Ok(());
        }
        let page = self.page_number();
        let opened = self.state.lock().unwrap().opened;
        let timed_out = match opened {
            Some(index) => self.failures.detail_timeouts.contains(&(page, index)),
            None => true,
        };
        if timed_out {
            return Err(AppError::ElementTimeout {
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn current_item_handles(&mut self, locator: &Locator) -> Result<Vec<ItemHandle>, AppError> {
        let page = self.page_number();
        if self.failures.listing_pages.contains(&page) {
            return Err(AppError::Browser("target closed".into()));
        }
        let count = self.pages.get(page - 1).map_or(0, Vec::len);
        Ok((0..count)
            .map(|index| ItemHandle {
                locator: locator.clone(),
                index,
            })
            .collect())
    }

    async fn open(&mut self, handle: &ItemHandle) -> Result<(), AppError> {
        let page = self.page_number();
        if self.failures.opens.contains(&(page, handle.index)) {
            return Err(AppError::Browser("element is not attached".into()));
        }
        let mut state = self.state.lock().unwrap();
        let count = self.pages.get(state.current_page).map_or(0, Vec::len);
        if handle.index >= count {
            return Err(AppError::Browser(format!("no item at {}", handle.index)));
        }
        state.opened = Some(handle.index);
        Ok(())
    }

    async fn read_text(&mut self, locator: &Locator) -> Result<String, AppError> {
        let listing = self
            .opened_listing()
            .ok_or_else(|| AppError::Browser("no detail view open".into()))?;
        let layout = &self.layout;
        let text = if *locator == layout.title {
            listing.title
        } else if *locator == layout.company {
            listing.company
        } else if *locator == layout.location {
            listing.location
        } else if *locator == layout.description {
            listing.description
        } else if *locator == layout.info_block {
            listing.info_block
        } else {
            return Err(AppError::Browser(format!("no element for {locator}")));
        };
        Ok(text)
    }

    async fn dismiss_interstitial(&mut self) -> bool {
        self.state.lock().unwrap().interstitial_checks += 1;
        false
    }

    async fn find_next(&mut self) -> Result<Option<Locator>, AppError> {
        let page = self.page_number();
        if self.failures.next_pages.contains(&page) {
            return Err(AppError::Browser("pagination lookup failed".into()));
        }
        Ok((page < self.pages.len()).then(|| self.layout.next_page.clone()))
    }

    async fn navigate(&mut self, _next: &Locator) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.current_page += 1;
        state.opened = None;
        state.navigations += 1;
        Ok(())
    }

    async fn close(self) {
        self.state.lock().unwrap().closed = true;
    }
}

// ---------------------------------------------------------------------------
// MockSessionFactory
// ---------------------------------------------------------------------------

/// Factory handing out clones of one mock session.
#[derive(Clone)]
pub struct MockSessionFactory {
    session: MockSession,
    open_error: Arc<Mutex<Option<AppError>>>,
    pub opens: Arc<Mutex<u32>>,
}

impl MockSessionFactory {
    pub fn new(session: MockSession) -> Self {
        Self {
            session,
            open_error: Arc::new(Mutex::new(None)),
            opens: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_open_error(error: AppError) -> Self {
        Self {
            session: MockSession::with_pages(vec![]),
            open_error: Arc::new(Mutex::new(Some(error))),
            opens: Arc::new(Mutex::new(0)),
        }
    }

    pub fn open_count(&self) -> u32 {
        *self.opens.lock().unwrap()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }
}

impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession, AppError> {
        *self.opens.lock().unwrap() += 1;
        if let Some(e) = self.open_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.session.clone())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MockEntry {
    run: ScrapeRun,
    corrupt: bool,
}

/// In-memory snapshot store that records saves and deletes.
#[derive(Clone, Default)]
pub struct MockStore {
    entries: Arc<Mutex<Vec<MockEntry>>>,
    pub saved: Arc<Mutex<Vec<Uuid>>>,
    pub deleted: Arc<Mutex<Vec<Uuid>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
    list_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_runs(runs: Vec<ScrapeRun>) -> Self {
        let store = Self::default();
        for run in runs {
            store.insert(run);
        }
        store
    }

    pub fn with_save_error(error: AppError) -> Self {
        let store = Self::default();
        *store.save_error.lock().unwrap() = Some(error);
        store
    }

    pub fn with_list_error(error: AppError) -> Self {
        let store = Self::default();
        *store.list_error.lock().unwrap() = Some(error);
        store
    }

    pub fn insert(&self, run: ScrapeRun) {
        self.entries.lock().unwrap().push(MockEntry {
            run,
            corrupt: false,
        });
    }

    /// A snapshot whose metadata cannot be read back.
    pub fn insert_corrupt(&self, run: ScrapeRun) {
        self.entries.lock().unwrap().push(MockEntry { run, corrupt: true });
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.entries.lock().unwrap().iter().map(|e| e.run.id).collect()
    }
}

impl SnapshotStore for MockStore {
    async fn list_meta(
        &self,
        key: &SnapshotKey,
    ) -> Result<Vec<Result<SnapshotMeta, AppError>>, AppError> {
        if let Some(e) = self.list_error.lock().unwrap().take() {
            return Err(e);
        }
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| e.run.key() == *key)
            .map(|e| {
                if e.corrupt {
                    Err(AppError::CacheMetadata {
                        snapshot: e.run.id.to_string(),
                        reason: "unknown kind 'maxi'".into(),
                    })
                } else {
                    Ok(e.run.meta())
                }
            })
            .collect())
    }

    async fn load(&self, _key: &SnapshotKey, id: Uuid) -> Result<ScrapeRun, AppError> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .find(|e| e.run.id == id)
            .map(|e| e.run.clone())
            .ok_or_else(|| AppError::Store(format!("snapshot {id} not found")))
    }

    async fn save(&self, run: &ScrapeRun) -> Result<SnapshotMeta, AppError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        self.saved.lock().unwrap().push(run.id);
        self.insert(run.clone());
        Ok(run.meta())
    }

    async fn delete(&self, _key: &SnapshotKey, id: Uuid) -> Result<(), AppError> {
        self.deleted.lock().unwrap().push(id);
        self.entries.lock().unwrap().retain(|e| e.run.id != id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock crawl reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match &event {
            CrawlEvent::Started { .. } => "Started",
            CrawlEvent::PageStarted { .. } => "PageStarted",
            CrawlEvent::PageFailed { .. } => "PageFailed",
            CrawlEvent::ItemSkipped { .. } => "ItemSkipped",
            CrawlEvent::PageAborted { .. } => "PageAborted",
            CrawlEvent::PageCompleted { .. } => "PageCompleted",
            CrawlEvent::NextCheckFailed { .. } => "NextCheckFailed",
            CrawlEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

pub fn make_record(title: &str) -> JobRecord {
    JobRecord {
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "Toronto, ON".to_string(),
        description: "Build things".to_string(),
        salary_base: None,
        salary_upper: None,
        employment_type: Some("Full-time".to_string()),
        responsive: false,
    }
}

/// A run for "Software Developer" in "Toronto, ON", created `age` ago.
pub fn make_run(pages_actual: u32, kind: RunKind, age: TimeDelta) -> ScrapeRun {
    let stop = match kind {
        RunKind::Full => StopReason::Exhausted,
        RunKind::Partial => StopReason::BudgetReached,
    };
    let mut run = ScrapeRun::new(
        "Software Developer",
        "Toronto, ON",
        pages_actual,
        pages_actual,
        vec![make_record(&format!("{pages_actual} page run"))],
        stop,
    );
    run.created_at = Utc::now() - age;
    run
}
