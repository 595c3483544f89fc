//! Operation tracker: retried simple mutations, and uploads/downloads with
//! live progress and cooperative cancellation.
//!
//! Transfers live in an in-memory registry keyed by operation id. Each entry
//! owns its progress record, its cancellation token and the senders of every
//! progress stream handed out for it. Records are never mutated after they
//! reach a terminal state, and are dropped from the registry a short grace
//! period later so observers can still read the final state.

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{FileApi, ProgressFn, UploadFile};
use crate::config::Config;
use crate::error::{OperationError, OperationNotFound, TransferError};
use crate::models::{
    CreateDirectoryRequest, DeleteRequest, MoveRequest, MutationKind, OperationKind,
    OperationProgress, OperationResponse, OperationStatus, RenameRequest,
};
use crate::progress::{BatchProgressStream, EtaEstimator, ProgressStream};
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::validator::{ensure_valid_name, NameRules};

const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(1);

struct OperationSlot {
    progress: OperationProgress,
    cancel: CancellationToken,
    subscribers: Vec<mpsc::UnboundedSender<OperationProgress>>,
    started_at: Instant,
    eta: EtaEstimator,
}

struct TrackerInner {
    api: Arc<dyn FileApi>,
    operations: DashMap<String, OperationSlot>,
    retry: RetryPolicy,
    cleanup_grace: Duration,
}

#[derive(Clone)]
pub struct OperationTracker {
    inner: Arc<TrackerInner>,
}

impl OperationTracker {
    pub fn new(api: Arc<dyn FileApi>) -> Self {
        Self::with_settings(api, RetryPolicy::default(), DEFAULT_CLEANUP_GRACE)
    }

    pub fn from_config(api: Arc<dyn FileApi>, config: &Config) -> Self {
        Self::with_settings(api, config.retry_policy(), config.cleanup_grace())
    }

    pub fn with_settings(api: Arc<dyn FileApi>, retry: RetryPolicy, cleanup_grace: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                api,
                operations: DashMap::new(),
                retry,
                cleanup_grace,
            }),
        }
    }

    // simple mutations

    pub async fn rename(&self, old_path: &str, new_name: &str) -> Result<OperationResponse, OperationError> {
        ensure_valid_name(new_name, &NameRules::default())?;
        let request = RenameRequest {
            old_path: old_path.to_string(),
            new_name: new_name.trim().to_string(),
        };
        tracing::debug!("Renaming {} to {}", old_path, request.new_name);
        self.run_mutation(MutationKind::Rename, &request).await
    }

    pub async fn move_item(&self, source_path: &str, target_path: &str) -> Result<OperationResponse, OperationError> {
        let request = MoveRequest {
            source_path: source_path.to_string(),
            target_path: target_path.to_string(),
        };
        tracing::debug!("Moving {} to {}", source_path, target_path);
        self.run_mutation(MutationKind::Move, &request).await
    }

    pub async fn delete(&self, path: &str) -> Result<OperationResponse, OperationError> {
        tracing::debug!("Deleting {}", path);
        self.run_mutation(MutationKind::Delete, &DeleteRequest { path: path.to_string() })
            .await
    }

    pub async fn create_directory(&self, path: &str, name: &str) -> Result<OperationResponse, OperationError> {
        ensure_valid_name(name, &NameRules::labelled("Folder name").forbidding_dots())?;
        let request = CreateDirectoryRequest {
            path: path.to_string(),
            name: name.trim().to_string(),
        };
        tracing::debug!("Creating directory {} in {}", request.name, path);
        self.run_mutation(MutationKind::CreateDirectory, &request).await
    }

    async fn run_mutation<R: Serialize>(
        &self,
        kind: MutationKind,
        request: &R,
    ) -> Result<OperationResponse, OperationError> {
        let verb = kind.verb();
        let body = serde_json::to_value(request)
            .map_err(|e| operation_failed(kind, &format!("failed to encode request: {}", e)))?;
        let api: &dyn FileApi = self.inner.api.as_ref();

        let outcome = retry_with_policy(&self.inner.retry, verb, move || {
            api.mutate(kind.endpoint(), body.clone())
        })
        .await;

        match outcome {
            Ok(response) if response.success => {
                tracing::info!("✅ {} succeeded", verb);
                Ok(response)
            }
            // the server answered, retrying will not change its mind
            Ok(response) => {
                let raw = response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "request rejected".to_string());
                Err(operation_failed(kind, &raw))
            }
            Err(e) => Err(operation_failed(kind, &e.to_string())),
        }
    }

    // transfers

    /// Start uploading `file` into the remote directory `target_path`.
    ///
    /// The transfer runs as a task on the current tokio runtime. Called
    /// outside a runtime, the operation ends in `Error` straight away.
    pub fn upload(&self, file: UploadFile, target_path: &str) -> ProgressStream {
        self.start_upload(file, target_path).1
    }

    /// upload several files independently, observed as one stream
    pub fn upload_many(&self, files: Vec<UploadFile>, target_path: &str) -> BatchProgressStream {
        tracing::debug!("Uploading {} files to {}", files.len(), target_path);
        let streams = files
            .into_iter()
            .map(|file| self.start_upload(file, target_path))
            .collect();
        BatchProgressStream::new(streams)
    }

    fn start_upload(&self, file: UploadFile, target_path: &str) -> (OperationProgress, ProgressStream) {
        let kind = OperationKind::Upload;
        let (initial, cancel, stream) = self.register(kind, file.name.clone(), Some(file.size));
        let id = initial.id.clone();
        let target = target_path.to_string();
        let tracker = self.clone();

        self.spawn_transfer(&initial.id, kind, async move {
            let progress = tracker.progress_fn(&id);
            match tracker.inner.api.upload(file, &target, progress, cancel).await {
                Ok(response) if response.success => tracker.complete(&id, None),
                Ok(response) => {
                    let raw = response.error.or(response.message).unwrap_or_default();
                    tracker.fail(&id, &raw, classify_transfer_failure(kind, None, &raw, false));
                }
                Err(e) => tracker.fail(&id, &e.to_string(), classify_transfer_error(kind, &e)),
            }
        });

        (initial, stream)
    }

    /// start fetching `remote_path` into the local file `destination`;
    /// needs a tokio runtime the same way `upload` does
    pub fn download(&self, remote_path: &str, destination: impl Into<PathBuf>) -> ProgressStream {
        let kind = OperationKind::Download;
        let file_name = remote_path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("unknown")
            .to_string();
        let (initial, cancel, stream) = self.register(kind, file_name, None);
        let id = initial.id;
        let remote = remote_path.to_string();
        let destination = destination.into();
        let tracker = self.clone();

        self.spawn_transfer(stream.id(), kind, async move {
            let progress = tracker.progress_fn(&id);
            match tracker.inner.api.download(&remote, &destination, progress, cancel).await {
                Ok(received) => tracker.complete(&id, Some(received)),
                Err(e) => tracker.fail(&id, &e.to_string(), classify_transfer_error(kind, &e)),
            }
        });

        stream
    }

    // transfers run on the ambient tokio runtime; without one they fail at once
    fn spawn_transfer<F>(&self, operation_id: &str, kind: OperationKind, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(e) => self.fail(
                operation_id,
                &e.to_string(),
                format!("Could not start {}: no async runtime", kind.verb()),
            ),
        }
    }

    /// Cancel a pending or running transfer. Returns false (and changes
    /// nothing) when the id is unknown or already finished.
    pub fn cancel(&self, operation_id: &str) -> bool {
        let cancelled = self.update(operation_id, |slot| {
            slot.cancel.cancel();
            slot.progress.status = OperationStatus::Cancelled;
            slot.progress.estimated_seconds_remaining = None;
        });
        if cancelled {
            tracing::info!("🛑 Cancelled operation {}", operation_id);
        } else {
            tracing::debug!("Ignoring cancel for inactive operation {}", operation_id);
        }
        cancelled
    }

    /// snapshots of every pending or running transfer, oldest first
    pub fn active_operations(&self) -> Vec<OperationProgress> {
        let mut active: Vec<(Instant, OperationProgress)> = self
            .inner
            .operations
            .iter()
            .filter(|slot| slot.progress.status.is_active())
            .map(|slot| (slot.started_at, slot.progress.clone()))
            .collect();
        active.sort_by_key(|(started_at, _)| *started_at);
        active.into_iter().map(|(_, progress)| progress).collect()
    }

    /// subscribe to a registered transfer
    pub fn progress(&self, operation_id: &str) -> Result<ProgressStream, OperationNotFound> {
        let mut slot = self
            .inner
            .operations
            .get_mut(operation_id)
            .ok_or_else(|| OperationNotFound(operation_id.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(slot.progress.clone());
        if slot.progress.status.is_active() {
            slot.subscribers.push(tx);
        }
        Ok(ProgressStream::new(operation_id.to_string(), rx))
    }

    pub fn snapshot(&self, operation_id: &str) -> Result<OperationProgress, OperationNotFound> {
        self.inner
            .operations
            .get(operation_id)
            .map(|slot| slot.progress.clone())
            .ok_or_else(|| OperationNotFound(operation_id.to_string()))
    }

    fn register(
        &self,
        kind: OperationKind,
        file_name: String,
        total_bytes: Option<u64>,
    ) -> (OperationProgress, CancellationToken, ProgressStream) {
        let id = format!("op_{}", Uuid::new_v4().simple());
        let progress = OperationProgress::pending(id.clone(), kind, file_name, total_bytes);
        let cancel = CancellationToken::new();

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(progress.clone());

        tracing::debug!("Registered {} of {} as {}", kind.verb(), progress.file_name, id);
        self.inner.operations.insert(
            id.clone(),
            OperationSlot {
                progress: progress.clone(),
                cancel: cancel.clone(),
                subscribers: vec![tx],
                started_at: Instant::now(),
                eta: EtaEstimator::new(),
            },
        );

        (progress, cancel, ProgressStream::new(id, rx))
    }

    fn progress_fn(&self, operation_id: &str) -> ProgressFn {
        let tracker = self.clone();
        let id = operation_id.to_string();
        Arc::new(move |loaded, total| tracker.record_tick(&id, loaded, total))
    }

    fn record_tick(&self, operation_id: &str, loaded: u64, total: Option<u64>) {
        let now = Instant::now();
        self.update(operation_id, |slot| {
            let total = total.filter(|t| *t > 0).or(slot.progress.total_bytes);
            let progress = &mut slot.progress;
            progress.status = OperationStatus::InProgress;
            progress.bytes_transferred = Some(loaded);

            if let Some(total) = total.filter(|t| *t > 0) {
                progress.total_bytes = Some(total);
                // 100 is reserved for completion
                let percent = (loaded as f64 / total as f64 * 100.0).round().clamp(0.0, 99.0) as u8;
                progress.progress_percent = progress.progress_percent.max(percent);

                let eta = slot.eta.sample(loaded, total, now.duration_since(slot.started_at));
                progress.estimated_seconds_remaining = Some(eta.round() as u64);
            }
            tracing::trace!("{} {}: {}/{:?} bytes", progress.kind.verb(), progress.id, loaded, total);
        });
    }

    fn complete(&self, operation_id: &str, received: Option<u64>) {
        self.update(operation_id, |slot| {
            let progress = &mut slot.progress;
            if progress.total_bytes.is_none() {
                progress.total_bytes = received.or(progress.bytes_transferred);
            }
            progress.bytes_transferred = progress.total_bytes;
            progress.progress_percent = 100;
            progress.estimated_seconds_remaining = None;
            progress.status = OperationStatus::Completed;
            tracing::info!("✅ {} completed: {}", progress.kind.verb(), progress.file_name);
        });
    }

    fn fail(&self, operation_id: &str, raw: &str, message: String) {
        self.update(operation_id, |slot| {
            let progress = &mut slot.progress;
            tracing::error!(
                "❌ {} of {} failed: {} ({})",
                progress.kind.verb(),
                progress.file_name,
                message,
                raw
            );
            progress.status = OperationStatus::Error;
            progress.estimated_seconds_remaining = None;
            progress.error = Some(message);
        });
    }

    // apply `f` to a live record and fan the new snapshot out; terminal records are frozen
    fn update(&self, operation_id: &str, f: impl FnOnce(&mut OperationSlot)) -> bool {
        let reached_terminal = {
            let Some(mut slot) = self.inner.operations.get_mut(operation_id) else {
                return false;
            };
            if slot.progress.status.is_terminal() {
                return false;
            }

            f(&mut *slot);

            let snapshot = slot.progress.clone();
            slot.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
            if snapshot.status.is_terminal() {
                slot.subscribers.clear();
            }
            snapshot.status.is_terminal()
        };

        if reached_terminal {
            self.schedule_cleanup(operation_id.to_string());
        }
        true
    }

    fn schedule_cleanup(&self, operation_id: String) {
        let inner = self.inner.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(inner.cleanup_grace).await;
                    remove_finished(&inner, &operation_id);
                });
            }
            Err(_) => remove_finished(&inner, &operation_id),
        }
    }
}

fn remove_finished(inner: &TrackerInner, operation_id: &str) {
    let removed = inner
        .operations
        .remove_if(operation_id, |_, slot| slot.progress.status.is_terminal());
    if removed.is_some() {
        tracing::trace!("Dropped finished operation {}", operation_id);
    }
}

fn operation_failed(kind: MutationKind, raw: &str) -> OperationError {
    let message = classify_operation_error(kind, raw);
    tracing::error!("{} operation failed: {} -> {}", kind.verb(), raw, message);
    OperationError::Failed {
        operation: kind,
        message,
    }
}

/// user-facing message for a failed rename/move/delete/create-directory
pub fn classify_operation_error(kind: MutationKind, raw: &str) -> String {
    let verb = kind.verb();
    let text = raw.to_lowercase();

    if text.contains("permission") {
        format!("Permission denied: Cannot {} this item", verb)
    } else if text.contains("not found") {
        format!("Item not found: Cannot {} non-existent item", verb)
    } else if text.contains("exists") {
        format!("Item already exists: Cannot {} to existing location", verb)
    } else if text.contains("space") {
        format!("Insufficient disk space: Cannot {} item", verb)
    } else {
        format!("Failed to {} item", verb)
    }
}

/// user-facing message for a failed upload or download
pub fn classify_transfer_error(kind: OperationKind, error: &TransferError) -> String {
    match error {
        TransferError::Cancelled(_) => {
            let verb = kind.verb();
            let mut capitalized = verb[..1].to_uppercase();
            capitalized.push_str(&verb[1..]);
            format!("{} cancelled by user", capitalized)
        }
        TransferError::Network(e) => {
            let network = e.status().is_none();
            classify_transfer_failure(kind, e.status(), &e.to_string(), network)
        }
        TransferError::Io(e) => {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                format!("Permission denied: Cannot {} this file", kind.verb())
            } else {
                "Could not access the local file".to_string()
            }
        }
    }
}

fn classify_transfer_failure(kind: OperationKind, status: Option<u16>, raw: &str, network: bool) -> String {
    let verb = kind.verb();
    let text = raw.to_lowercase();
    let mentions = |needle: &str| text.contains(needle);

    if status == Some(413) || mentions("too large") {
        format!("File is too large to {}", verb)
    } else if status == Some(415) || mentions("unsupported") {
        "File type is not supported".to_string()
    } else if status == Some(403) || mentions("permission") {
        format!("Permission denied: Cannot {} this file", verb)
    } else if status == Some(507) || mentions("space") || mentions("storage") {
        "Insufficient storage space on the server".to_string()
    } else if status == Some(409) || mentions("exists") || mentions("conflict") {
        "A file with this name already exists".to_string()
    } else if status == Some(401) {
        "Your session has expired. Please log in again".to_string()
    } else if status == Some(404) || mentions("not found") {
        "File or destination folder not found".to_string()
    } else if status == Some(503) {
        "Service temporarily unavailable. Please try again later".to_string()
    } else if network {
        "Network error: Please check your connection".to_string()
    } else {
        format!("Server error occurred during {}", verb)
    }
}
