//! Media probing.
//!
//! A [`MediaProbe`] reports which kinds of streams a file carries. The
//! default backend shells out to ffprobe ([`FfprobeProbe`]); tests and
//! embedders can substitute their own implementation.

mod ffprobe;

pub use ffprobe::{FfprobeProbe, DEFAULT_PROBE_TIMEOUT};

use std::path::Path;

use async_trait::async_trait;
use reelforged_common::Result;
use serde::{Deserialize, Serialize};

/// Count of streams per kind found in a media file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub video: usize,
    pub audio: usize,
    /// Streams of any other kind (subtitle, data, attachment).
    pub other: usize,
}

impl StreamSummary {
    /// Whether at least one video stream is present.
    pub fn has_video(&self) -> bool {
        self.video > 0
    }

    /// Whether at least one audio stream is present.
    pub fn has_audio(&self) -> bool {
        self.audio > 0
    }

    /// Tally a single `codec_type` value as reported by the probe.
    pub fn record(&mut self, codec_type: &str) {
        match codec_type.trim() {
            "video" => self.video += 1,
            "audio" => self.audio += 1,
            "" => {}
            _ => self.other += 1,
        }
    }
}

/// A media prober capable of classifying the streams of a file.
///
/// Implementations must be safe to share across tasks (`Send + Sync`) and
/// must enforce their own timeout; a timeout is reported as an error.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Human-readable name identifying this probe implementation.
    fn name(&self) -> &'static str;

    /// Inspect `path` and count its streams by kind.
    async fn streams(&self, path: &Path) -> Result<StreamSummary>;
}
