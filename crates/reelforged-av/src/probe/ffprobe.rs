//! FFprobe-based [`MediaProbe`] implementation.
//!
//! Shells out to `ffprobe -v error -show_entries stream=codec_type -of csv=p=0`
//! and tallies one `codec_type` per output line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reelforged_common::Result;

use super::{MediaProbe, StreamSummary};
use crate::command::ToolCommand;

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A probe backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    /// Create a new probe using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Create a probe that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    /// Set the hard timeout for each probe invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, path: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(["-v", "error", "-show_entries", "stream=codec_type", "-of", "csv=p=0"])
            .path_arg(path)
            .timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn streams(&self, path: &Path) -> Result<StreamSummary> {
        let output = self.command(path).execute().await?;
        Ok(parse_codec_types(&output.stdout))
    }
}

fn parse_codec_types(stdout: &str) -> StreamSummary {
    let mut summary = StreamSummary::default();
    for line in stdout.lines() {
        // csv=p=0 prints one field per line; stray separators show up for
        // some containers.
        summary.record(line.trim_matches(|c: char| c == ',' || c.is_whitespace()));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_and_audio() {
        let summary = parse_codec_types("video\naudio\n");
        assert_eq!(summary.video, 1);
        assert_eq!(summary.audio, 1);
        assert_eq!(summary.other, 0);
    }

    #[test]
    fn parses_audio_only() {
        let summary = parse_codec_types("audio\n");
        assert!(!summary.has_video());
        assert!(summary.has_audio());
    }

    #[test]
    fn tolerates_trailing_separators_and_blank_lines() {
        let summary = parse_codec_types("video,\n\n  audio  \nsubtitle\n");
        assert_eq!(
            summary,
            StreamSummary {
                video: 1,
                audio: 1,
                other: 1
            }
        );
    }

    #[test]
    fn command_carries_path_last() {
        let probe = FfprobeProbe::new(PathBuf::from("ffprobe"));
        let cmd = probe.command(Path::new("/u/chunk_0001.webm"));
        assert_eq!(cmd.get_args().last().unwrap(), "/u/chunk_0001.webm");
        assert!(cmd.get_args().contains(&"stream=codec_type".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let probe = FfprobeProbe::new(PathBuf::from("nonexistent_ffprobe_xyz"));
        assert!(probe.streams(Path::new("/tmp/none.webm")).await.is_err());
    }
}
