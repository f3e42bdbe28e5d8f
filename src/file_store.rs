//! JSON file persistence.
//!
//! The whole data set lives in one document:
//!
//! ```json
//! {"version": 1, "records": [ ... ]}
//! ```
//!
//! Each call reads the file, applies the change and writes it back through a
//! sibling temp file that is renamed over the original.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{RecordBackend, RecordTable};
use crate::error::{DossierError, Result};
use crate::models::{Record, RecordBody, ResourceKind};
use crate::patch::RecordPatch;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    records: RecordTable,
}

/// Backend storing every owner's records in a single JSON file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<RecordTable> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RecordTable::default())
            }
            Err(err) => return Err(err.into()),
        };
        if content.trim().is_empty() {
            return Ok(RecordTable::default());
        }

        let doc: Document = serde_json::from_str(&content)?;
        if doc.version != FORMAT_VERSION {
            return Err(DossierError::Remote(format!(
                "unsupported data file version {} in {}",
                doc.version,
                self.path.display()
            )));
        }
        Ok(doc.records)
    }

    async fn save(&self, records: RecordTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let doc = Document {
            version: FORMAT_VERSION,
            records,
        };
        let json = serde_json::to_string_pretty(&doc)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| DossierError::Config(format!("invalid data file: {}", self.path.display())))?
            .to_string_lossy();
        let temp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

        let written = async {
            write_private(&temp_path, json.as_bytes()).await?;
            tokio::fs::rename(&temp_path, &self.path).await
        }
        .await;
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        debug!(path = %self.path.display(), "wrote data file");
        Ok(())
    }
}

/// Write `bytes` to a fresh file that only the current user can read.
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // A leftover from an interrupted write may carry wider permissions.
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl RecordBackend for FileBackend {
    async fn list(&self, kind: ResourceKind, owner: &str) -> Result<Vec<Record>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.list(kind, owner))
    }

    async fn create(&self, kind: ResourceKind, owner: &str, draft: RecordBody) -> Result<Record> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let record = table.create(kind, owner, draft)?;
        self.save(table).await?;
        Ok(record)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        owner: &str,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let record = table.update(kind, owner, id, patch)?;
        self.save(table).await?;
        Ok(record)
    }

    async fn delete(&self, kind: ResourceKind, owner: &str, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        if table.delete(kind, owner, id) {
            self.save(table).await?;
        }
        Ok(())
    }
}
