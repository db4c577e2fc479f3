//! Reuse of recent scrape runs, with bounded retention per (query, location).

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::config::SeekerConfig;
use crate::error::AppError;
use crate::models::{RunKind, ScrapeRun, SnapshotKey, SnapshotMeta};
use crate::traits::SnapshotStore;

/// When a snapshot may be reused and how many are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Snapshots older than this are never reused.
    pub staleness: TimeDelta,
    /// Snapshots kept per key after a persist.
    pub retention: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            staleness: TimeDelta::hours(20),
            retention: 5,
        }
    }
}

impl CachePolicy {
    pub fn from_config(config: &SeekerConfig) -> Self {
        Self {
            staleness: config.staleness,
            retention: config.retention,
        }
    }

    fn is_stale(&self, meta: &SnapshotMeta, now: DateTime<Utc>) -> bool {
        now - meta.created_at > self.staleness
    }
}

/// A partial run cannot answer a request for more pages than it covered.
fn is_sufficient(meta: &SnapshotMeta, pages_requested: u32) -> bool {
    meta.kind == RunKind::Full || meta.pages_actual >= pages_requested
}

/// The snapshot with the most pages; the newest wins a tie.
fn select_best(metas: &[SnapshotMeta]) -> Option<&SnapshotMeta> {
    metas
        .iter()
        .max_by_key(|m| (m.pages_actual, m.created_at))
}

/// Decides cache hits and owns snapshot retention.
#[derive(Clone)]
pub struct RunCache<S: SnapshotStore> {
    store: S,
    policy: CachePolicy,
}

impl<S: SnapshotStore> RunCache<S> {
    pub fn new(store: S, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// A stored run that satisfies the request, if any.
    pub async fn resolve(
        &self,
        query: &str,
        location: &str,
        pages_requested: u32,
    ) -> Result<Option<ScrapeRun>, AppError> {
        self.resolve_at(query, location, pages_requested, Utc::now())
            .await
    }

    /// Like [`Self::resolve`], judging staleness as of `now`.
    pub async fn resolve_at(
        &self,
        query: &str,
        location: &str,
        pages_requested: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<ScrapeRun>, AppError> {
        let key = SnapshotKey::new(query, location);
        let metas = self.readable_meta(&key).await?;

        let Some(best) = select_best(&metas) else {
            tracing::debug!(key = %key, "No snapshot stored");
            return Ok(None);
        };

        if !is_sufficient(best, pages_requested) {
            tracing::info!(
                key = %key,
                snapshot = %best.id,
                pages_actual = best.pages_actual,
                pages_requested,
                "Partial snapshot too small, crawling"
            );
            return Ok(None);
        }

        if self.policy.is_stale(best, now) {
            tracing::info!(
                key = %key,
                snapshot = %best.id,
                age_hours = (now - best.created_at).num_hours(),
                "Snapshot is stale, crawling"
            );
            return Ok(None);
        }

        match self.store.load(&key, best.id).await {
            Ok(run) => {
                tracing::info!(
                    key = %key,
                    snapshot = %run.id,
                    kind = %run.kind,
                    pages_actual = run.pages_actual,
                    records = run.records.len(),
                    "Reusing snapshot"
                );
                Ok(Some(run))
            }
            Err(e) => {
                tracing::warn!(key = %key, snapshot = %best.id, error = %e, "Snapshot payload unreadable, crawling");
                Ok(None)
            }
        }
    }

    /// Save `run`, then evict the oldest snapshots of its key beyond the retention limit.
    ///
    /// Returns the ids that were evicted.
    pub async fn persist(&self, run: &ScrapeRun) -> Result<Vec<Uuid>, AppError> {
        let key = run.key();
        self.store.save(run).await?;
        tracing::info!(
            key = %key,
            snapshot = %run.id,
            kind = %run.kind,
            pages_actual = run.pages_actual,
            records = run.records.len(),
            "Snapshot saved"
        );

        let mut metas = self.readable_meta(&key).await?;
        if metas.len() <= self.policy.retention {
            return Ok(Vec::new());
        }

        metas.sort_by_key(|m| m.created_at);
        let excess = metas.len() - self.policy.retention;
        let mut evicted = Vec::with_capacity(excess);
        for meta in metas.into_iter().take(excess) {
            self.store.delete(&key, meta.id).await?;
            tracing::info!(key = %key, snapshot = %meta.id, created_at = %meta.created_at, "Evicted snapshot");
            evicted.push(meta.id);
        }
        Ok(evicted)
    }

    /// Every snapshot of a key, newest first. Unreadable ones are kept as errors.
    pub async fn history(
        &self,
        query: &str,
        location: &str,
    ) -> Result<Vec<Result<SnapshotMeta, AppError>>, AppError> {
        let key = SnapshotKey::new(query, location);
        let mut entries = self.store.list_meta(&key).await?;
        entries.sort_by(|a, b| match (a, b) {
            (Ok(a), Ok(b)) => b.created_at.cmp(&a.created_at),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => std::cmp::Ordering::Equal,
        });
        Ok(entries)
    }

    async fn readable_meta(&self, key: &SnapshotKey) -> Result<Vec<SnapshotMeta>, AppError> {
        let entries = self.store.list_meta(key).await?;
        let mut metas = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Ok(meta) => metas.push(meta),
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable snapshot"),
            }
        }
        Ok(metas)
    }
}
