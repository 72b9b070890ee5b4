//! Session façade: the call surface a transport layer drives.
//!
//! [`SessionService`] ties the [`SessionStore`], the [`ChunkValidator`] and
//! the [`MergeOrchestrator`] together. Media work (probing and merging) is
//! bounded by a worker semaphore; snapshot writes run on the blocking pool.
//!
//! Each live session has a gate. Uploads hold it shared and `end_session`
//! holds it exclusively, so a merge never sees a chunk change underneath it
//! and an upload that waited on a merge is rejected once the session is
//! completed.

mod types;

pub use types::*;

use bytes::Bytes;
use dashmap::DashMap;
use reelforged_av::{
    ChunkValidator, FfmpegMergeTool, FfprobeProbe, MergeOrchestrator, ToolRegistry,
};
use reelforged_common::paths::{chunk_file_name, display_name, output_file_name};
use reelforged_common::{Chunk, ContainerFormat, Error, Metadata, Result, SessionId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::sync::{RwLock, Semaphore};

use crate::config::Config;
use crate::store::SessionStore;

/// One uploaded chunk, as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub number: u32,
    pub payload: Bytes,
    pub timestamp: i64,
    pub mime_type: Option<String>,
}

pub struct SessionService {
    store: Arc<SessionStore>,
    validator: ChunkValidator,
    orchestrator: MergeOrchestrator,
    workers: Arc<Semaphore>,
    gates: DashMap<SessionId, Arc<RwLock<()>>>,
}

impl SessionService {
    pub fn new(
        store: Arc<SessionStore>,
        validator: ChunkValidator,
        orchestrator: MergeOrchestrator,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            validator,
            orchestrator,
            workers: Arc::new(Semaphore::new(max_concurrent.max(1))),
            gates: DashMap::new(),
        }
    }

    /// Build the service from configuration: discover the tools, open the
    /// store (recovering existing sessions) and wire the ffmpeg backends.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (validator, orchestrator) = media_pipeline(config);
        let store = SessionStore::open(&config.storage.upload_dir)?;

        Ok(Self::new(
            Arc::new(store),
            validator,
            orchestrator,
            config.workers.max_concurrent,
        ))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn validator(&self) -> &ChunkValidator {
        &self.validator
    }

    pub fn orchestrator(&self) -> &MergeOrchestrator {
        &self.orchestrator
    }

    /// Open a new session and return its id.
    pub async fn start_session(&self, metadata: Metadata) -> Result<SessionId> {
        let id = SessionId::new();
        let dir = self.store.session_dir(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(&dir, format!("failed to create session dir: {e}")))?;

        let store = self.store.clone();
        blocking(move || store.create(id, metadata)).await?;

        tracing::info!(session_id = %id, "Started session");
        Ok(id)
    }

    /// Store, validate and record one chunk.
    ///
    /// An invalid chunk is not an error: it is recorded with
    /// `is_valid = false` and reported in the receipt. The payload is staged
    /// under a hidden name and only takes its chunk file name once the record
    /// is accepted, so a rejected upload leaves nothing behind.
    pub async fn add_chunk(&self, id: SessionId, upload: ChunkUpload) -> Result<ChunkReceipt> {
        if self.store.get(&id)?.completed {
            return Err(Error::SessionCompleted(id.to_string()));
        }

        let gate = self.gate(id);
        let _shared = gate.read().await;
        if self.store.get(&id)?.completed {
            self.release_gate(&id);
            return Err(Error::SessionCompleted(id.to_string()));
        }

        let format = ContainerFormat::from_mime_or_default(upload.mime_type.as_deref());
        let dir = self.store.session_dir(&id);
        let file_name = chunk_file_name(upload.number, format);
        let path = dir.join(&file_name);
        let staged = stage_payload(&dir, &file_name, &upload.payload).await?;

        let valid = {
            let _permit = self.acquire_worker().await?;
            self.validator.validate(&staged).await
        };

        let chunk = Chunk {
            number: upload.number,
            path: path.clone(),
            timestamp: upload.timestamp,
            mime_type: upload.mime_type,
            is_valid: valid,
        };
        let store = self.store.clone();
        let replaced = blocking(move || store.add_chunk(&id, chunk)).await?;

        let target = path.clone();
        blocking(move || {
            staged.persist(&target).map_err(|e| {
                Error::storage(&target, format!("failed to move chunk into place: {}", e.error))
            })
        })
        .await?;

        if let Some(old) = replaced {
            tracing::info!(session_id = %id, chunk = upload.number, "Replaced earlier upload");
            if old.path != path {
                if let Err(e) = tokio::fs::remove_file(&old.path).await {
                    tracing::warn!("Failed to remove superseded chunk {}: {e}", old.path.display());
                }
            }
        }

        tracing::info!(
            session_id = %id,
            chunk = upload.number,
            size = upload.payload.len(),
            valid,
            "Stored chunk {}",
            display_name(&path)
        );
        Ok(ChunkReceipt {
            number: upload.number,
            valid,
            path,
        })
    }

    /// Merge the session's valid chunks and complete the session.
    ///
    /// The session is completed whatever the merge result. A second call on
    /// a completed session performs no work and returns
    /// [`EndSessionOutcome::AlreadyCompleted`]. Concurrent calls for the
    /// same session are serialized.
    pub async fn end_session(&self, id: SessionId) -> Result<EndSessionOutcome> {
        if !self.store.exists(&id) {
            return Err(Error::session_not_found(id));
        }

        let gate = self.gate(id);
        let _exclusive = gate.write().await;

        let session = self.store.get(&id)?;
        if session.completed {
            self.release_gate(&id);
            tracing::info!(session_id = %id, "Session already completed");
            return Ok(EndSessionOutcome::AlreadyCompleted {
                output_path: session.output_path,
            });
        }

        let chunks = session.mergeable_chunks();
        if chunks.is_empty() {
            tracing::warn!(
                session_id = %id,
                total = session.chunks.len(),
                "No valid chunks to merge"
            );
            self.complete(id, None).await?;
            self.release_gate(&id);
            return Ok(EndSessionOutcome::NoValidChunks {
                total_chunks: session.chunks.len(),
            });
        }

        let format = session.output_format();
        let inputs: Vec<PathBuf> = chunks.iter().map(|c| c.path.clone()).collect();
        let merged_chunks: Vec<String> = inputs.iter().map(|p| display_name(p)).collect();
        let output = self.store.session_dir(&id).join(output_file_name(format));

        tracing::info!(
            session_id = %id,
            valid = inputs.len(),
            total = session.chunks.len(),
            %format,
            "Merging chunks: {}",
            merged_chunks.join(", ")
        );

        let merged = {
            let _permit = self.acquire_worker().await?;
            self.orchestrator.merge(&inputs, &output).await
        };

        let outcome = match merged {
            Ok(result) => match result.strategy {
                Some(strategy) => {
                    self.complete(id, Some(result.output.clone())).await?;
                    EndSessionOutcome::Merged {
                        output_path: result.output,
                        format,
                        strategy,
                        merged_chunks,
                        stages: StageReport::from_attempts(&result.attempts),
                    }
                }
                None => {
                    self.complete(id, None).await?;
                    EndSessionOutcome::MergeFailed {
                        format,
                        reason: result
                            .failure
                            .unwrap_or_else(|| "merge failed".to_string()),
                        merged_chunks,
                        stages: StageReport::from_attempts(&result.attempts),
                    }
                }
            },
            Err(e) => {
                self.complete(id, None).await?;
                EndSessionOutcome::MergeFailed {
                    format,
                    reason: e.to_string(),
                    merged_chunks,
                    stages: Vec::new(),
                }
            }
        };
        self.release_gate(&id);

        match &outcome {
            EndSessionOutcome::Merged { strategy, .. } => {
                tracing::info!(session_id = %id, stage = %strategy, "Session completed with merged output")
            }
            _ => tracing::error!(session_id = %id, "Session completed without output"),
        }
        Ok(outcome)
    }

    /// Read-only projection of a session.
    pub async fn status(&self, id: SessionId) -> Result<SessionStatus> {
        let session = self.store.get(&id)?;

        let completed_video = match &session.output_path {
            Some(path) => completed_video(path).await,
            None => None,
        };

        Ok(SessionStatus {
            id: session.id,
            completed: session.completed,
            total_chunks: session.chunks.len(),
            valid_chunks: session.valid_chunk_count(),
            completed_video,
            created_at: session.created_at,
            completed_at: session.completed_at,
        })
    }

    /// Ids of every known session, oldest first.
    pub fn list_sessions(&self) -> Vec<SessionId> {
        self.store.list()
    }

    fn gate(&self, id: SessionId) -> Arc<RwLock<()>> {
        self.gates.entry(id).or_default().value().clone()
    }

    /// Forget the gate of a completed session. A caller still waiting on the
    /// old gate, or one that creates a new one, finds the record completed.
    fn release_gate(&self, id: &SessionId) {
        self.gates.remove(id);
    }

    #[cfg(test)]
    fn open_gates(&self) -> usize {
        self.gates.len()
    }

    async fn complete(&self, id: SessionId, output: Option<PathBuf>) -> Result<bool> {
        let store = self.store.clone();
        blocking(move || store.complete(&id, output)).await
    }

    async fn acquire_worker(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.workers
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("worker pool closed: {e}")))
    }
}

/// Validator and merge orchestrator backed by the configured ffprobe and
/// ffmpeg binaries.
pub fn media_pipeline(config: &Config) -> (ChunkValidator, MergeOrchestrator) {
    let tools = ToolRegistry::discover(&config.tools);

    let probe = FfprobeProbe::new(tools.path_or_name("ffprobe"))
        .with_timeout(config.validation.probe_timeout());
    let validator = ChunkValidator::new(Arc::new(probe));

    let merge_tool = FfmpegMergeTool::new(tools.path_or_name("ffmpeg"))
        .with_normalize(config.merge.normalize.clone())
        .with_filter_preset(config.merge.filter_preset.as_str());
    let orchestrator = MergeOrchestrator::new(Arc::new(merge_tool), validator.clone())
        .with_timeouts(config.merge.timeouts());

    (validator, orchestrator)
}

async fn completed_video(path: &Path) -> Option<CompletedVideo> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.is_file().then(|| CompletedVideo {
        path: path.to_path_buf(),
        size: meta.len(),
    })
}

/// Write an upload under a hidden name beside its final one. The staged
/// file is removed if it is dropped without being persisted.
async fn stage_payload(dir: &Path, file_name: &str, payload: &Bytes) -> Result<TempPath> {
    let staged = tempfile::Builder::new()
        .prefix(".incoming-")
        .suffix(&format!("-{file_name}"))
        .tempfile_in(dir)
        .map_err(|e| Error::storage(dir, format!("failed to stage chunk: {e}")))?
        .into_temp_path();

    tokio::fs::write(&staged, payload).await.map_err(|e| {
        Error::storage(staged.to_path_buf(), format!("failed to write chunk: {e}"))
    })?;
    Ok(staged)
}

/// Run blocking store work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}
