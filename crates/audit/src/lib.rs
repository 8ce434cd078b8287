// In crates/audit/src/lib.rs

//! Append-only audit trail. One [`CycleRecord`] per symbol per cycle is the
//! durable contract replay tooling depends on, so the sink flushes every
//! record before reporting success.

pub mod error;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use core_types::CycleRecord;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub use error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct AuditSettings {
    pub log_path: PathBuf,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record. The caller treats this as fire-and-forget and only
    /// logs a failure; the sink must not lose acknowledged records.
    async fn append(&self, record: &CycleRecord) -> Result<()>;
}

/// One JSON object per line, flushed per write.
pub struct JsonlAuditSink {
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlAuditSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, record: &CycleRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(symbol = %record.symbol, "Audit record appended");
        Ok(())
    }
}
