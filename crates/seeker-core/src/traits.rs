use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ItemHandle, Locator, ScrapeRun, SnapshotKey, SnapshotMeta};

/// One live browsing session against the search site.
///
/// Provides navigation primitives only; paging policy lives in
/// [`crate::paginate::PaginationEngine`]. Every method mutates the session's
/// navigation state, so a session is never shared between crawls.
pub trait BrowserSession: Send {
    /// Fill in and submit the search form.
    ///
    /// Fails with [`AppError::SearchInput`] if the form controls cannot be found.
    fn search(
        &mut self,
        query: &str,
        location: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Wait until an element matching `locator` is present.
    ///
    /// Fails with [`AppError::ElementTimeout`] once `timeout` elapses.
    fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Handles for every result item currently on the page. An empty page is `Ok(vec![])`.
    fn current_item_handles(
        &mut self,
        locator: &Locator,
    ) -> impl Future<Output = Result<Vec<ItemHandle>, AppError>> + Send;

    /// Activate a result item so its detail view is shown.
    fn open(&mut self, handle: &ItemHandle) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Rendered text of the first element matching `locator`.
    fn read_text(
        &mut self,
        locator: &Locator,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Close a blocking overlay if one is showing. Returns whether one was closed.
    fn dismiss_interstitial(&mut self) -> impl Future<Output = bool> + Send;

    /// Locator of the next-page control, or `None` at the pagination boundary.
    fn find_next(&mut self) -> impl Future<Output = Result<Option<Locator>, AppError>> + Send;

    /// Follow a next-page control returned by [`Self::find_next`].
    fn navigate(&mut self, next: &Locator) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Tear the session down.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens a fresh [`BrowserSession`] for each crawl.
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession;

    fn open(&self) -> impl Future<Output = Result<Self::Session, AppError>> + Send;
}

/// Persists scrape run snapshots with metadata kept separately from records.
pub trait SnapshotStore: Send + Sync + Clone {
    /// Metadata of every snapshot stored under `key`, in no particular order.
    ///
    /// Each entry is its own `Result` so one unreadable snapshot does not hide the rest.
    fn list_meta(
        &self,
        key: &SnapshotKey,
    ) -> impl Future<Output = Result<Vec<Result<SnapshotMeta, AppError>>, AppError>> + Send;

    /// Load a full snapshot, records included.
    fn load(
        &self,
        key: &SnapshotKey,
        id: Uuid,
    ) -> impl Future<Output = Result<ScrapeRun, AppError>> + Send;

    /// Save a run under its key.
    fn save(&self, run: &ScrapeRun) -> impl Future<Output = Result<SnapshotMeta, AppError>> + Send;

    /// Delete a snapshot. Deleting a missing snapshot is not an error.
    fn delete(
        &self,
        key: &SnapshotKey,
        id: Uuid,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
