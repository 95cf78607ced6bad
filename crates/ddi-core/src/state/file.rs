// # File Record Store
//
// File-based implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Keeps resource records across process restarts. Losing a record means
// losing track of the identity token that ties a resource to its remote
// object, so writes are atomic and a backup of the previous file is kept.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON parse failure on load
// - Automatic backup: `.backup` copy of the last good file
// - Recovery: falls back to the backup if the main file is corrupted
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "web-host": {
//       "type_name": "record:host",
//       "reference": "record:host/1a",
//       "internal_id": "0d5c7c4e-...",
//       "fields": { "name": "web.lab" },
//       "attributes": { "site": "hq" },
//       "last_reconciled": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::RecordStoreConfig;
use crate::record::ResourceRecord;
use crate::traits::record_store::{RecordStore, RecordStoreFactory};

/// Record file format version
const RECORD_FILE_VERSION: &str = "1.0";

/// File-based record store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use ddi_core::state::FileRecordStore;
/// use ddi_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/ddi/records.json").await?;
///     for name in store.list().await? {
///         println!("tracking {}", name);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    records: HashMap<String, ResourceRecord>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RecordFileFormat {
    version: String,
    records: HashMap<String, ResourceRecord>,
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing record file
    /// 3. Fall back to the backup if the file is corrupted
    /// 4. Start empty if neither can be read
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create record directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                records,
                dirty: false,
            })),
        })
    }

    /// Load records, recovering from the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, ResourceRecord>, Error> {
        match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded {} records from {}", records.len(), path.display());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Record file {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with no records.");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("Recovered {} records from backup", records.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore record file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(records)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with no records.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load records from a file; parse failures surface as `Error::Json`
    async fn load(path: &Path) -> Result<HashMap<String, ResourceRecord>, Error> {
        if !path.exists() {
            tracing::debug!("Record file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to read record file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: RecordFileFormat = serde_json::from_str(&content)?;

        if file.version != RECORD_FILE_VERSION {
            tracing::warn!(
                "Record file version mismatch: expected {}, got {}. Attempting to load anyway.",
                RECORD_FILE_VERSION,
                file.version
            );
        }

        Ok(file.records)
    }

    /// Write all records atomically
    async fn write(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let file = RecordFileFormat {
            version: RECORD_FILE_VERSION.to_string(),
            records: state.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        tracing::trace!("Records written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, name: &str) -> Result<Option<ResourceRecord>, Error> {
        let state = self.state.read().await;
        Ok(state.records.get(name).cloned())
    }

    async fn put(&self, name: &str, record: &ResourceRecord) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            state.records.insert(name.to_string(), record.clone());
            state.dirty = true;
        }

        // Immediate write for durability
        self.write().await
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if state.records.remove(name).is_none() {
                return Ok(());
            }
            state.dirty = true;
        }

        self.write().await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.records.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write().await } else { Ok(()) }
    }
}

/// Factory for creating file record stores
pub struct FileRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for FileRecordStoreFactory {
    async fn create(&self, config: &RecordStoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            RecordStoreConfig::File { path } => Ok(Box::new(FileRecordStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file record store")),
        }
    }
}
