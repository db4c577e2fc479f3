use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::StopReason;

/// Events emitted while crawling, for monitoring/logging.
#[derive(Debug, Clone, Copy)]
pub enum CrawlEvent<'a> {
    Started {
        query: &'a str,
        location: &'a str,
        pages_requested: u32,
    },
    PageStarted {
        page: u32,
        pages_requested: u32,
    },
    /// Listing lookup failed; the crawl stops here.
    PageFailed {
        page: u32,
        error: &'a AppError,
    },
    ItemSkipped {
        page: u32,
        index: usize,
        error: &'a AppError,
    },
    /// A detail wait timed out; the remaining items of the page are skipped.
    PageAborted {
        page: u32,
        index: usize,
        remaining: usize,
        error: &'a AppError,
    },
    PageCompleted {
        page: u32,
        items: usize,
        extracted: usize,
        elapsed: Duration,
    },
    NextCheckFailed {
        page: u32,
        error: &'a AppError,
    },
    Finished {
        pages_actual: u32,
        records: usize,
        stop: StopReason,
    },
}

/// Receives crawl events. Reporting is a side effect only.
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::Started {
                query,
                location,
                pages_requested,
            } => {
                tracing::info!(%query, %location, %pages_requested, "Crawl started");
            }
            CrawlEvent::PageStarted {
                page,
                pages_requested,
            } => {
                tracing::info!("Gathering data from page {page} of {pages_requested}");
            }
            CrawlEvent::PageFailed { page, error } => {
                tracing::error!(%page, %error, "Could not list items, stopping crawl");
            }
            CrawlEvent::ItemSkipped { page, index, error } => {
                tracing::warn!(%page, %index, %error, "Skipped item");
            }
            CrawlEvent::PageAborted {
                page,
                index,
                remaining,
                error,
            } => {
                tracing::warn!(%page, %index, %remaining, %error, "Abandoned rest of page");
            }
            CrawlEvent::PageCompleted {
                page,
                items,
                extracted,
                elapsed,
            } => {
                tracing::info!(
                    %page,
                    %items,
                    %extracted,
                    elapsed_ms = %elapsed.as_millis(),
                    "Page {page} done in {:.1}s",
                    elapsed.as_secs_f64()
                );
            }
            CrawlEvent::NextCheckFailed { page, error } => {
                tracing::warn!(%page, %error, "Next-page check failed, stopping crawl");
            }
            CrawlEvent::Finished {
                pages_actual,
                records,
                stop,
            } => {
                tracing::info!(%pages_actual, %records, %stop, "Crawl finished");
            }
        }
    }
}

/// Per-crawl log file, named after the crawl's start time.
///
/// Every event is also forwarded to [`TracingCrawlReporter`]. Write failures are ignored.
pub struct RunLogReporter {
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLogReporter {
    /// Create `run-<started_at>.log` (millisecond precision) inside `dir`, creating `dir` if needed.
    pub fn create(dir: &Path, started_at: DateTime<Utc>) -> Result<Self, AppError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Config(format!("Cannot create log dir {}: {e}", dir.display()))
        })?;
        let path = dir.join(format!("run-{}.log", started_at.format("%Y-%m-%dT%H-%M-%S%.3f")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::Config(format!("Cannot open {}: {e}", path.display())))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line(event: &CrawlEvent<'_>) -> String {
        match event {
            CrawlEvent::Started {
                query,
                location,
                pages_requested,
            } => format!("crawl started: {query} in {location}, {pages_requested} page(s)"),
            CrawlEvent::PageStarted {
                page,
                pages_requested,
            } => format!("page {page} of {pages_requested} started"),
            CrawlEvent::PageFailed { page, error } => format!("page {page} failed: {error}"),
            CrawlEvent::ItemSkipped { page, index, error } => {
                format!("page {page} item {index} skipped: {error}")
            }
            CrawlEvent::PageAborted {
                page,
                index,
                remaining,
                error,
            } => format!("page {page} abandoned at item {index} ({remaining} left): {error}"),
            CrawlEvent::PageCompleted {
                page,
                items,
                extracted,
                elapsed,
            } => format!(
                "Page {page} done in {}s ({extracted}/{items} items)",
                elapsed.as_secs_f64()
            ),
            CrawlEvent::NextCheckFailed { page, error } => {
                format!("page {page} next check failed: {error}")
            }
            CrawlEvent::Finished {
                pages_actual,
                records,
                stop,
            } => format!("crawl finished: {pages_actual} page(s), {records} record(s), {stop}"),
        }
    }
}

impl CrawlReporter for RunLogReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let line = Self::line(&event);
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{} {line}", Utc::now().to_rfc3339());
        }
        TracingCrawlReporter.report(event);
    }
}
