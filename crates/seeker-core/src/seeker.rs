use chrono::{DateTime, Utc};

use crate::cache::{CachePolicy, RunCache};
use crate::config::SeekerConfig;
use crate::error::AppError;
use crate::models::{JobRecord, ScrapeRun};
use crate::paginate::PaginationEngine;
use crate::report::{CrawlReporter, RunLogReporter, TracingCrawlReporter};
use crate::traits::{BrowserSession, SessionFactory, SnapshotStore};

/// Where a run handed back by [`JobSeeker::fetch_run`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    Cache,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: ScrapeRun,
    pub source: RunSource,
}

/// Answers dataset requests: cache first, crawl on a miss, persist what was crawled.
///
/// Generic over the browser and the snapshot store so tests run without either.
pub struct JobSeeker<F, S>
where
    F: SessionFactory,
    S: SnapshotStore,
{
    sessions: F,
    cache: RunCache<S>,
    engine: PaginationEngine,
    config: SeekerConfig,
}

impl<F, S> JobSeeker<F, S>
where
    F: SessionFactory,
    S: SnapshotStore,
{
    pub fn new(sessions: F, store: S, config: SeekerConfig) -> Self {
        Self {
            sessions,
            cache: RunCache::new(store, CachePolicy::from_config(&config)),
            engine: PaginationEngine::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &SeekerConfig {
        &self.config
    }

    pub fn cache(&self) -> &RunCache<S> {
        &self.cache
    }

    /// Records for the request, or an empty dataset if nothing could be produced.
    pub async fn initialize(
        &self,
        query: &str,
        location: &str,
        pages_requested: u32,
    ) -> Vec<JobRecord> {
        match self.fetch_run(query, location, pages_requested).await {
            Ok(outcome) => outcome.run.records,
            Err(e) => {
                tracing::error!(%query, %location, error = %e, "No dataset produced");
                Vec::new()
            }
        }
    }

    /// Resolve from cache, or crawl and persist a new run.
    ///
    /// A cache lookup failure falls through to a crawl and a persist failure is
    /// only logged. Errors come from bad input or a crawl that could not start.
    pub async fn fetch_run(
        &self,
        query: &str,
        location: &str,
        pages_requested: u32,
    ) -> Result<RunOutcome, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidRequest("Query must not be empty".into()));
        }
        if pages_requested == 0 {
            return Err(AppError::InvalidRequest(
                "At least one page must be requested".into(),
            ));
        }

        match self.cache.resolve(query, location, pages_requested).await {
            Ok(Some(run)) => {
                return Ok(RunOutcome {
                    run,
                    source: RunSource::Cache,
                });
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache lookup failed, crawling"),
        }

        let started_at = Utc::now();
        let reporter = self.reporter(started_at);

        let mut session = self.sessions.open().await?;
        let crawled = self
            .engine
            .crawl(
                &mut session,
                query,
                location,
                pages_requested,
                reporter.as_ref(),
            )
            .await;
        session.close().await;
        let report = crawled?;

        let run = ScrapeRun::new(
            query,
            location,
            pages_requested,
            report.pages_actual,
            report.records,
            report.stop,
        );

        if let Err(e) = self.cache.persist(&run).await {
            tracing::error!(snapshot = %run.id, error = %e, "Failed to persist run");
        }

        Ok(RunOutcome {
            run,
            source: RunSource::Fresh,
        })
    }

    fn reporter(&self, started_at: DateTime<Utc>) -> Box<dyn CrawlReporter> {
        let Some(dir) = &self.config.log_dir else {
            return Box::new(TracingCrawlReporter);
        };
        match RunLogReporter::create(dir, started_at) {
            Ok(reporter) => {
                tracing::info!(path = %reporter.path().display(), "Writing crawl log");
                Box::new(reporter)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Crawl log unavailable");
                Box::new(TracingCrawlReporter)
            }
        }
    }
}
