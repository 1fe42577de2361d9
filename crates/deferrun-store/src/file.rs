//! File system backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use deferrun_core::JobError;

use crate::backend::{StoreBackend, payload_file_name};
use crate::schema::Envelope;

const JOBS_FILE: &str = "jobs.json";
const PAYLOADS_DIR: &str = "payloads";
const TMP_PREFIX: &str = ".";
const TMP_SUFFIX: &str = ".deferrun-tmp";

/// File system based backend.
///
/// The whole collection lives in one JSON file; payloads sit next to it:
/// ```text
/// {data_dir}/
/// ├── jobs.json
/// └── payloads/
///     ├── {uuid}.py
///     └── {uuid}.xlsx
/// ```
///
/// Every write goes to a hidden sibling `.{name}.deferrun-tmp` file which is
/// synced and then renamed over the target, so readers only ever see a
/// complete file. Payload names always start with the job id, so the temp
/// pattern never matches a payload whatever its extension.
pub struct FileBackend {
    /// Base storage path.
    data_dir: PathBuf,
}

impl FileBackend {
    /// Create a file backend rooted at `data_dir`.
    ///
    /// A relative `data_dir` is resolved against the current directory, so
    /// payload paths handed out later are always absolute. Creates the
    /// directory layout and clears temp files left by an interrupted write.
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, JobError> {
        let data_dir = data_dir.into();
        let data_dir = std::path::absolute(&data_dir).map_err(|e| {
            JobError::Storage(format!("Failed to resolve data directory {:?}: {}", data_dir, e))
        })?;
        fs::create_dir_all(data_dir.join(PAYLOADS_DIR)).await.map_err(|e| {
            JobError::Storage(format!(
                "Failed to create data directory {:?}: {}",
                data_dir, e
            ))
        })?;

        let backend = Self { data_dir };
        backend.clear_stale_temp_files().await;

        debug!("FileBackend initialized at {:?}", backend.data_dir);
        Ok(backend)
    }

    /// Base storage path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the collection file.
    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir.join(JOBS_FILE)
    }

    /// Directory holding payloads.
    pub fn payloads_dir(&self) -> PathBuf {
        self.data_dir.join(PAYLOADS_DIR)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = std::ffi::OsString::from(TMP_PREFIX);
        if let Some(file_name) = path.file_name() {
            name.push(file_name);
        }
        name.push(TMP_SUFFIX);
        path.with_file_name(name)
    }

    fn is_temp_file(path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| n.starts_with(TMP_PREFIX) && n.ends_with(TMP_SUFFIX))
    }

    async fn clear_stale_temp_files(&self) {
        for dir in [self.data_dir.clone(), self.payloads_dir()] {
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if Self::is_temp_file(&path) {
                    match fs::remove_file(&path).await {
                        Ok(()) => debug!("Removed stale temp file {:?}", path),
                        Err(e) => warn!("Failed to remove stale temp file {:?}: {}", path, e),
                    }
                }
            }
        }
    }

    /// Write `bytes` to `path` via a synced temp file and a rename.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), JobError> {
        let tmp = Self::temp_path(path);

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, path).await?;
            Self::sync_parent(path).await
        }
        .await;

        if let Err(e) = result {
            fs::remove_file(&tmp).await.ok();
            return Err(JobError::Storage(format!(
                "Failed to write {:?}: {}",
                path, e
            )));
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn sync_parent(path: &Path) -> std::io::Result<()> {
        match path.parent() {
            Some(parent) => fs::File::open(parent).await?.sync_all().await,
            None => Ok(()),
        }
    }

    #[cfg(not(unix))]
    async fn sync_parent(_path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn load(&self) -> Result<Option<Envelope>, JobError> {
        let path = self.jobs_path();

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(JobError::Storage(format!(
                    "Failed to read {:?}: {}",
                    path, e
                )));
            }
        };

        let envelope: Envelope = serde_json::from_slice(&content).map_err(|e| {
            JobError::Storage(format!("Failed to parse {:?}: {}", path, e))
        })?;

        debug!("Loaded {} job record(s) from {:?}", envelope.jobs.len(), path);
        Ok(Some(envelope))
    }

    async fn persist(&self, envelope: &Envelope) -> Result<(), JobError> {
        let content = serde_json::to_vec_pretty(envelope)?;
        Self::write_atomic(&self.jobs_path(), &content).await?;
        debug!("Persisted {} job record(s)", envelope.jobs.len());
        Ok(())
    }

    async fn write_payload(
        &self,
        id: &Uuid,
        display_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, JobError> {
        let path = self.payloads_dir().join(payload_file_name(id, display_name));
        Self::write_atomic(&path, bytes).await?;
        debug!("Saved payload for job '{}' to {:?}", id, path);
        Ok(path)
    }

    async fn remove_payload(&self, path: &Path) -> Result<(), JobError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed payload {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JobError::Storage(format!(
                "Failed to remove payload {:?}: {}",
                path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_backend_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().join("store")).await.unwrap();
        assert!(backend.payloads_dir().is_dir());
        assert!(backend.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_persist_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();

        let envelope = Envelope {
            version: 1,
            jobs: vec![serde_json::json!({"id": "x"})],
        };
        backend.persist(&envelope).await.unwrap();

        assert!(backend.jobs_path().exists());
        assert!(!FileBackend::temp_path(&backend.jobs_path()).exists());
        assert_eq!(backend.load().await.unwrap(), Some(envelope));
    }

    #[tokio::test]
    async fn test_file_backend_corrupt_file_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();
        std::fs::write(backend.jobs_path(), b"{ not json").unwrap();

        let result = backend.load().await;
        assert!(matches!(result, Err(JobError::Storage(_))));
    }

    #[tokio::test]
    async fn test_file_backend_clears_stale_temp() {
        let temp_dir = TempDir::new().unwrap();
        let stale = FileBackend::temp_path(&temp_dir.path().join(JOBS_FILE));
        std::fs::write(&stale, b"half written").unwrap();
        let payloads = temp_dir.path().join(PAYLOADS_DIR);
        std::fs::create_dir_all(&payloads).unwrap();
        let stale_payload = FileBackend::temp_path(&payloads.join(format!("{}.py", Uuid::new_v4())));
        std::fs::write(&stale_payload, b"half written").unwrap();

        let _backend = FileBackend::new(temp_dir.path()).await.unwrap();
        assert!(!stale.exists());
        assert!(!stale_payload.exists());
    }

    #[tokio::test]
    async fn test_file_backend_keeps_payloads_with_temp_like_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();

        let mut kept = Vec::new();
        for name in ["notes.tmp", "draft.deferrun-tmp", "archive.TMP"] {
            let path = backend
                .write_payload(&Uuid::new_v4(), name, b"keep me")
                .await
                .unwrap();
            kept.push(path);
        }
        drop(backend);

        let _reopened = FileBackend::new(temp_dir.path()).await.unwrap();
        for path in kept {
            assert_eq!(std::fs::read(&path).unwrap(), b"keep me", "{:?}", path);
        }
    }

    #[tokio::test]
    async fn test_file_backend_resolves_relative_data_dir() {
        let temp_dir = TempDir::new_in(".").unwrap();
        let relative = Path::new(".").join(temp_dir.path().file_name().unwrap());

        let backend = FileBackend::new(&relative).await.unwrap();
        assert!(backend.data_dir().is_absolute());

        let path = backend
            .write_payload(&Uuid::new_v4(), "job.sh", b"true")
            .await
            .unwrap();
        assert!(path.is_absolute());
        assert_eq!(std::fs::read(&path).unwrap(), b"true");
    }

    #[tokio::test]
    async fn test_file_backend_payload_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).await.unwrap();
        let id = Uuid::new_v4();

        let path = backend
            .write_payload(&id, "script.py", b"print('hi')")
            .await
            .unwrap();
        assert_eq!(path, backend.payloads_dir().join(format!("{}.py", id)));
        assert_eq!(std::fs::read(&path).unwrap(), b"print('hi')");

        backend.remove_payload(&path).await.unwrap();
        assert!(!path.exists());
        backend.remove_payload(&path).await.unwrap();
    }

    #[test]
    fn test_temp_path() {
        let tmp = FileBackend::temp_path(Path::new("/data/jobs.json"));
        assert_eq!(tmp, PathBuf::from("/data/jobs.json.tmp"));
    }
}
