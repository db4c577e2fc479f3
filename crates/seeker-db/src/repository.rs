use chrono::{DateTime, Utc};
use seeker_core::error::AppError;
use seeker_core::models::{JobRecord, RunKind, ScrapeRun, SnapshotKey, SnapshotMeta};
use seeker_core::traits::SnapshotStore;
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

const META_COLUMNS: &str =
    "id, query, location, kind, pages_requested, pages_actual, record_count, created_at";

/// Snapshot persistence in the `scrape_runs` table.
///
/// Metadata lives in typed columns; the records are a JSONB payload that
/// [`SnapshotStore::list_meta`] never selects.
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: Pool<Postgres>,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Metadata of every snapshot under `key`, newest first.
    pub async fn list_meta(
        &self,
        key: &SnapshotKey,
    ) -> Result<Vec<Result<SnapshotMeta, AppError>>, AppError> {
        let rows = sqlx::query_as::<_, MetaRow>(&format!(
            "SELECT {META_COLUMNS} FROM scrape_runs WHERE snapshot_key = $1 ORDER BY created_at DESC"
        ))
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(SnapshotMeta::try_from).collect())
    }

    pub async fn load(&self, key: &SnapshotKey, id: Uuid) -> Result<ScrapeRun, AppError> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {META_COLUMNS}, records FROM scrape_runs WHERE snapshot_key = $1 AND id = $2"
        ))
        .bind(key.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Store(format!("Snapshot {id} not found under {key}")))?;

        let meta = SnapshotMeta::try_from(row.meta)?;
        Ok(ScrapeRun {
            id: meta.id,
            query: meta.query,
            location: meta.location,
            pages_requested: meta.pages_requested,
            pages_actual: meta.pages_actual,
            created_at: meta.created_at,
            records: row.records.0,
            kind: meta.kind,
        })
    }

    pub async fn save(&self, run: &ScrapeRun) -> Result<SnapshotMeta, AppError> {
        let meta = run.meta();
        sqlx::query(
            r#"
            INSERT INTO scrape_runs
                (id, snapshot_key, query, location, kind, pages_requested, pages_actual, record_count, records, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(meta.id)
        .bind(meta.key.as_str())
        .bind(&meta.query)
        .bind(&meta.location)
        .bind(meta.kind.as_str())
        .bind(i64::from(meta.pages_requested))
        .bind(i64::from(meta.pages_actual))
        .bind(meta.record_count as i64)
        .bind(Json(&run.records))
        .bind(meta.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(snapshot = %meta.id, key = %meta.key, "Inserted scrape run");
        Ok(meta)
    }

    pub async fn delete(&self, key: &SnapshotKey, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM scrape_runs WHERE snapshot_key = $1 AND id = $2")
            .bind(key.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct MetaRow {
    id: Uuid,
    query: String,
    location: String,
    kind: String,
    pages_requested: i64,
    pages_actual: i64,
    record_count: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RunRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    records: Json<Vec<JobRecord>>,
}

impl TryFrom<MetaRow> for SnapshotMeta {
    type Error = AppError;

    fn try_from(row: MetaRow) -> Result<Self, Self::Error> {
        let unreadable = |reason: String| AppError::CacheMetadata {
            snapshot: row.id.to_string(),
            reason,
        };
        let kind: RunKind = row.kind.parse().map_err(unreadable)?;
        let pages_requested = u32::try_from(row.pages_requested)
            .map_err(|_| unreadable(format!("pages_requested {}", row.pages_requested)))?;
        let pages_actual = u32::try_from(row.pages_actual)
            .map_err(|_| unreadable(format!("pages_actual {}", row.pages_actual)))?;
        let record_count = usize::try_from(row.record_count)
            .map_err(|_| unreadable(format!("record_count {}", row.record_count)))?;

        Ok(SnapshotMeta {
            id: row.id,
            key: SnapshotKey::new(&row.query, &row.location),
            query: row.query,
            location: row.location,
            kind,
            created_at: row.created_at,
            pages_requested,
            pages_actual,
            record_count,
        })
    }
}

// -- Trait implementation --

impl SnapshotStore for SnapshotRepository {
    async fn list_meta(
        &self,
        key: &SnapshotKey,
    ) -> Result<Vec<Result<SnapshotMeta, AppError>>, AppError> {
        SnapshotRepository::list_meta(self, key).await
    }

    async fn load(&self, key: &SnapshotKey, id: Uuid) -> Result<ScrapeRun, AppError> {
        SnapshotRepository::load(self, key, id).await
    }

    async fn save(&self, run: &ScrapeRun) -> Result<SnapshotMeta, AppError> {
        SnapshotRepository::save(self, run).await
    }

    async fn delete(&self, key: &SnapshotKey, id: Uuid) -> Result<(), AppError> {
        SnapshotRepository::delete(self, key, id).await
    }
}
