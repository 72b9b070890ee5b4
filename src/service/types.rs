use chrono::{DateTime, Utc};
use reelforged_av::{StageAttempt, StageOutcome, Strategy};
use reelforged_common::{ContainerFormat, SessionId};
use serde::Serialize;
use std::path::PathBuf;

/// Result of [`add_chunk`](super::SessionService::add_chunk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkReceipt {
    pub number: u32,
    pub valid: bool,
    pub path: PathBuf,
}

/// Diagnostics for one merge stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub strategy: Strategy,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl StageReport {
    pub fn from_attempts(attempts: &[StageAttempt]) -> Vec<Self> {
        attempts
            .iter()
            .map(|attempt| StageReport {
                strategy: attempt.strategy,
                succeeded: matches!(attempt.outcome, StageOutcome::Produced { .. }),
                error: attempt.failure().map(str::to_string),
                elapsed_ms: attempt.elapsed.as_millis() as u64,
            })
            .collect()
    }
}

/// Definite outcome of [`end_session`](super::SessionService::end_session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EndSessionOutcome {
    /// A verified recording was written.
    Merged {
        output_path: PathBuf,
        format: ContainerFormat,
        strategy: Strategy,
        merged_chunks: Vec<String>,
        stages: Vec<StageReport>,
    },
    /// The session had no valid chunk; nothing was merged.
    NoValidChunks { total_chunks: usize },
    /// Every strategy failed or the output failed verification.
    MergeFailed {
        format: ContainerFormat,
        reason: String,
        merged_chunks: Vec<String>,
        stages: Vec<StageReport>,
    },
    /// The session had been completed by an earlier call.
    AlreadyCompleted { output_path: Option<PathBuf> },
}

impl EndSessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EndSessionOutcome::Merged { .. })
    }

    /// The merged recording, if this call or an earlier one produced one.
    pub fn output_path(&self) -> Option<&PathBuf> {
        match self {
            EndSessionOutcome::Merged { output_path, .. } => Some(output_path),
            EndSessionOutcome::AlreadyCompleted { output_path } => output_path.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedVideo {
    pub path: PathBuf,
    pub size: u64,
}

/// Read-only projection returned by [`status`](super::SessionService::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub id: SessionId,
    pub completed: bool,
    pub total_chunks: usize,
    pub valid_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_video: Option<CompletedVideo>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
