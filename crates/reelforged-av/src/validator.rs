//! Chunk validation.
//!
//! A chunk is valid when it exists, is non-empty, and the probe reports at
//! least one video stream. Validation fails closed: every failure mode,
//! including a probe timeout, yields "invalid" and never an error.

use std::path::Path;
use std::sync::Arc;

use crate::probe::{MediaProbe, StreamSummary};

/// Why a file was accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The file carries at least one video stream.
    Valid(StreamSummary),
    /// The file does not exist or could not be stat'ed.
    Missing,
    /// The file is zero bytes long. The probe is not invoked.
    Empty,
    /// The probe ran but found no video stream.
    NoVideo(StreamSummary),
    /// The probe failed or timed out.
    ProbeFailed(String),
}

impl Verdict {
    /// Whether this verdict accepts the file.
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid(_))
    }
}

/// Validates media files against a [`MediaProbe`].
#[derive(Clone)]
pub struct ChunkValidator {
    probe: Arc<dyn MediaProbe>,
}

impl ChunkValidator {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// The probe backing this validator.
    pub fn probe(&self) -> &Arc<dyn MediaProbe> {
        &self.probe
    }

    /// Whether `path` contains a decodable video stream.
    pub async fn validate(&self, path: &Path) -> bool {
        self.check(path).await.is_valid()
    }

    /// Validate `path` and report the reason for the verdict.
    pub async fn check(&self, path: &Path) -> Verdict {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                tracing::warn!("File does not exist: {}", path.display());
                return Verdict::Missing;
            }
        };

        if size == 0 {
            tracing::warn!("File is empty: {}", path.display());
            return Verdict::Empty;
        }

        match self.probe.streams(path).await {
            Ok(summary) if summary.has_video() => {
                tracing::debug!(
                    video = summary.video,
                    audio = summary.audio,
                    "File validated as video: {}",
                    path.display()
                );
                Verdict::Valid(summary)
            }
            Ok(summary) => {
                tracing::warn!("File has no video stream: {}", path.display());
                Verdict::NoVideo(summary)
            }
            Err(e) => {
                tracing::warn!(probe = self.probe.name(), "Validation failed for {}: {e}", path.display());
                Verdict::ProbeFailed(e.to_string())
            }
        }
    }
}
