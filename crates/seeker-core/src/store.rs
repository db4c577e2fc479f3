//! Snapshot store on the local filesystem.
//!
//! Layout: `<root>/<key>/<id>.meta.json` beside `<root>/<key>/<id>.records.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{JobRecord, ScrapeRun, SnapshotKey, SnapshotMeta};
use crate::traits::SnapshotStore;

const META_SUFFIX: &str = ".meta.json";
const RECORDS_SUFFIX: &str = ".records.json";

/// File-backed [`SnapshotStore`]. Metadata is read without touching the payload.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &SnapshotKey) -> PathBuf {
        let name: String = key
            .as_str()
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.root.join(name)
    }

    fn meta_path(&self, key: &SnapshotKey, id: Uuid) -> PathBuf {
        self.key_dir(key).join(format!("{id}{META_SUFFIX}"))
    }

    fn records_path(&self, key: &SnapshotKey, id: Uuid) -> PathBuf {
        self.key_dir(key).join(format!("{id}{RECORDS_SUFFIX}"))
    }

    async fn read_meta(path: &Path) -> Result<SnapshotMeta, AppError> {
        let snapshot = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .trim_end_matches(META_SUFFIX)
            .to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| AppError::CacheMetadata {
            snapshot: snapshot.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::CacheMetadata {
            snapshot,
            reason: e.to_string(),
        })
    }
}

fn store_err(action: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::Store(format!("Failed to {action} {}: {e}", path.display()))
}

async fn remove_if_present(path: &Path) -> Result<(), AppError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(store_err("remove", path, e)),
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn list_meta(
        &self,
        key: &SnapshotKey,
    ) -> Result<Vec<Result<SnapshotMeta, AppError>>, AppError> {
        let dir = self.key_dir(key);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_err("list", &dir, e)),
        };

        let mut metas = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| store_err("list", &dir, e))?
        {
            let path = entry.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_SUFFIX));
            if is_meta {
                metas.push(Self::read_meta(&path).await);
            }
        }
        Ok(metas)
    }

    async fn load(&self, key: &SnapshotKey, id: Uuid) -> Result<ScrapeRun, AppError> {
        let meta = Self::read_meta(&self.meta_path(key, id)).await?;
        let path = self.records_path(key, id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| store_err("read", &path, e))?;
        let records: Vec<JobRecord> = serde_json::from_slice(&bytes)?;

        Ok(ScrapeRun {
            id: meta.id,
            query: meta.query,
            location: meta.location,
            pages_requested: meta.pages_requested,
            pages_actual: meta.pages_actual,
            created_at: meta.created_at,
            records,
            kind: meta.kind,
        })
    }

    async fn save(&self, run: &ScrapeRun) -> Result<SnapshotMeta, AppError> {
        let key = run.key();
        let dir = self.key_dir(&key);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| store_err("create", &dir, e))?;

        // Payload first: a snapshot is only listed once its metadata exists.
        let records_path = self.records_path(&key, run.id);
        tokio::fs::write(&records_path, serde_json::to_vec(&run.records)?)
            .await
            .map_err(|e| store_err("write", &records_path, e))?;

        let meta = run.meta();
        let meta_path = self.meta_path(&key, run.id);
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?)
            .await
            .map_err(|e| store_err("write", &meta_path, e))?;

        tracing::debug!(path = %meta_path.display(), "Wrote snapshot");
        Ok(meta)
    }

    async fn delete(&self, key: &SnapshotKey, id: Uuid) -> Result<(), AppError> {
        remove_if_present(&self.meta_path(key, id)).await?;
        remove_if_present(&self.records_path(key, id)).await
    }
}
