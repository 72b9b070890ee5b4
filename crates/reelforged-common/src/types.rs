//! Session and chunk records plus container-format selection.
//!
//! [`Session`] is the durable snapshot written to `session_info.json`; every
//! field here is part of the on-disk schema, so additions must carry
//! `#[serde(default)]` to keep older snapshots loadable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ids::SessionId;

/// Caller-supplied metadata, stored verbatim and never interpreted.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Container format of an uploaded chunk or a merged recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// WebM, the browser recorder default and the fallback for unknown types.
    #[default]
    Webm,
    /// MPEG-4 Part 14.
    Mp4,
}

impl ContainerFormat {
    /// File extension used for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }

    /// Classify a declared mime type such as `video/webm;codecs=vp9`.
    ///
    /// Matching is by substring, so codec parameters are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("mp4") {
            Some(Self::Mp4)
        } else if mime.contains("webm") {
            Some(Self::Webm)
        } else {
            None
        }
    }

    /// Classify an optional mime type, falling back to [`ContainerFormat::Webm`].
    pub fn from_mime_or_default(mime: Option<&str>) -> Self {
        mime.and_then(Self::from_mime).unwrap_or_default()
    }

    /// Pick the output container by majority of declared mime types.
    ///
    /// MP4 wins only with a strict majority over WebM; ties and sets with no
    /// recognisable types produce WebM.
    pub fn majority<'a>(mimes: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let (mut mp4, mut webm) = (0usize, 0usize);
        for format in mimes.into_iter().flatten().filter_map(Self::from_mime) {
            match format {
                Self::Mp4 => mp4 += 1,
                Self::Webm => webm += 1,
            }
        }
        if mp4 > webm {
            Self::Mp4
        } else {
            Self::Webm
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webm" => Ok(Self::Webm),
            "mp4" | "m4v" => Ok(Self::Mp4),
            _ => Err(format!("Unknown container format: {}", s)),
        }
    }
}

/// One uploaded fragment of a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Caller-declared position within the session.
    pub number: u32,
    /// Where the payload was stored.
    pub path: PathBuf,
    /// Caller-declared capture time; advisory only.
    pub timestamp: i64,
    /// Declared mime type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Validation verdict at ingestion time. Never re-evaluated.
    #[serde(default)]
    pub is_valid: bool,
}

/// A recording session and everything recorded about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Chunks in arrival order.
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl Session {
    /// Create an empty, open session.
    pub fn new(id: SessionId, metadata: Metadata) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            completed_at: None,
            metadata,
            chunks: Vec::new(),
            completed: false,
            output_path: None,
        }
    }

    /// Record a chunk, replacing any earlier record with the same number.
    ///
    /// The new record goes to the end of the arrival order. Returns the
    /// replaced record, if there was one.
    pub fn record_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        let replaced = self
            .chunks
            .iter()
            .position(|c| c.number == chunk.number)
            .map(|pos| self.chunks.remove(pos));
        self.chunks.push(chunk);
        replaced
    }

    /// Mark the session completed.
    ///
    /// Returns `false` and leaves the record untouched if it was already
    /// completed: `completed_at` is written exactly once.
    pub fn complete(&mut self, output_path: Option<PathBuf>) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completed_at = Some(Utc::now());
        if output_path.is_some() {
            self.output_path = output_path;
        }
        true
    }

    /// Number of chunks that passed validation.
    pub fn valid_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_valid).count()
    }

    /// Valid chunks in ascending chunk-number order.
    pub fn mergeable_chunks(&self) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self.chunks.iter().filter(|c| c.is_valid).collect();
        chunks.sort_by_key(|c| c.number);
        chunks
    }

    /// Output container chosen by majority over the valid chunks.
    pub fn output_format(&self) -> ContainerFormat {
        ContainerFormat::majority(
            self.chunks
                .iter()
                .filter(|c| c.is_valid)
                .map(|c| c.mime_type.as_deref()),
        )
    }
}
