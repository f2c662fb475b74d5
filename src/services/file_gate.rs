//! File Readiness Gate
//!
//! Blocks a query until its attachments finish processing. Polls the
//! external status provider on a fixed interval, fails fast on the first
//! errored file, and gives up with a structured timeout when the deadline
//! passes. Image attachments are usable as-is and skip the wait entirely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::utils::error::{EngineError, EngineResult};

/// Processing state reported by the external provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// One attachment's status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub filename: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl FileRecord {
    pub fn new(file_id: impl Into<String>, filename: impl Into<String>, status: FileStatus) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            status,
            error_detail: None,
        }
    }

    pub fn with_error(mut self, detail: impl Into<String>) -> Self {
        self.status = FileStatus::Error;
        self.error_detail = Some(detail.into());
        self
    }
}

/// External file-status provider, polled and never pushed.
#[async_trait]
pub trait FileStatusRepository: Send + Sync {
    /// Fetch one file's current status. An `Err` is treated as that
    /// file's failure, not silently skipped.
    async fn get(&self, file_id: &str) -> Result<FileRecord, String>;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

fn is_image_filename(filename: &str) -> bool {
    filename
        .rsplit('.')
        .next()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Waits for a query's attachments before execution may start.
pub struct FileReadinessGate {
    repository: Arc<dyn FileStatusRepository>,
    poll_interval: Duration,
    timeout: Duration,
}

impl FileReadinessGate {
    pub fn new(
        repository: Arc<dyn FileStatusRepository>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            repository,
            poll_interval,
            timeout,
        }
    }

    /// Resolve when every file is completed. Fails the moment any file
    /// reports an error, or once `timeout` passes with files still
    /// unfinished.
    pub async fn wait(
        &self,
        file_ids: &[String],
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        if file_ids.is_empty() {
            return Ok(());
        }

        let deadline = Instant::now() + self.timeout;
        let mut pending: Vec<String> = file_ids.to_vec();

        loop {
            let mut still_pending = Vec::new();
            for file_id in &pending {
                let record = match self.repository.get(file_id).await {
                    Ok(record) => record,
                    Err(detail) => {
                        warn!(file_id = %file_id, %detail, "status fetch failed, failing wait");
                        return Err(EngineError::FileProcessing {
                            file_id: file_id.clone(),
                            detail: format!("status fetch failed: {}", detail),
                        });
                    }
                };

                if record.status == FileStatus::Error {
                    // Fail fast, siblings do not get another round.
                    return Err(EngineError::FileProcessing {
                        file_id: file_id.clone(),
                        detail: record
                            .error_detail
                            .unwrap_or_else(|| "file processing failed".to_string()),
                    });
                }

                if is_image_filename(&record.filename) {
                    debug!(file_id = %file_id, "image attachment, skipping wait");
                    continue;
                }

                if record.status != FileStatus::Completed {
                    still_pending.push(file_id.clone());
                }
            }

            pending = still_pending;
            if pending.is_empty() {
                info!(files = file_ids.len(), "all attachments ready");
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!(pending = pending.len(), "attachment wait timed out");
                return Err(EngineError::FileProcessingTimeout {
                    timeout_secs: self.timeout.as_secs(),
                    pending: pending.len(),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = sleep(self.poll_interval) => {}
            }
        }
    }
}
