//! [`MergeTool`] implementation driving the ffmpeg CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reelforged_common::Result;
use serde::{Deserialize, Serialize};

use super::tool::{JoinLayout, MergeTool};
use crate::command::ToolCommand;

/// Canonical encoding used by the normalization stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Container (file extension) of normalized chunks.
    pub container: String,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            container: "mp4".to_string(),
        }
    }
}

/// Runs merge operations through `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegMergeTool {
    ffmpeg_path: PathBuf,
    normalize: NormalizeSettings,
    filter_preset: String,
}

impl FfmpegMergeTool {
    /// Create a tool using the given ffmpeg binary and default settings.
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            normalize: NormalizeSettings::default(),
            filter_preset: "medium".to_string(),
        }
    }

    /// Override the normalization encoding.
    pub fn with_normalize(mut self, normalize: NormalizeSettings) -> Self {
        self.normalize = normalize;
        self
    }

    /// Override the encoder preset used by the filter-graph join.
    pub fn with_filter_preset(mut self, preset: impl Into<String>) -> Self {
        self.filter_preset = preset.into();
        self
    }

    fn command(&self, timeout: Duration) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(["-hide_banner", "-nostdin"]).timeout(timeout);
        cmd
    }

    fn concat_command(&self, manifest: &Path, output: &Path, timeout: Duration) -> ToolCommand {
        let mut cmd = self.command(timeout);
        cmd.args(["-f", "concat", "-safe", "0", "-i"])
            .path_arg(manifest)
            .args(["-c", "copy", "-y"])
            .path_arg(output);
        cmd
    }

    fn transcode_command(&self, input: &Path, output: &Path, timeout: Duration) -> ToolCommand {
        let mut cmd = self.command(timeout);
        cmd.arg("-i")
            .path_arg(input)
            .args(["-c:v", self.normalize.video_codec.as_str()])
            .args(["-c:a", self.normalize.audio_codec.as_str()])
            .args(["-b:a", self.normalize.audio_bitrate.as_str()])
            .arg("-y")
            .path_arg(output);
        cmd
    }

    fn filter_command(
        &self,
        inputs: &[PathBuf],
        layout: JoinLayout,
        output: &Path,
        timeout: Duration,
    ) -> ToolCommand {
        let mut cmd = self.command(timeout);
        for input in inputs {
            cmd.arg("-i").path_arg(input);
        }
        cmd.arg("-filter_complex").arg(layout.filter_graph(inputs.len()));
        for label in layout.output_labels() {
            cmd.args(["-map", *label]);
        }
        cmd.args(["-preset", self.filter_preset.as_str()])
            .arg("-y")
            .path_arg(output);
        cmd
    }
}

#[async_trait]
impl MergeTool for FfmpegMergeTool {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn normalized_extension(&self) -> &str {
        &self.normalize.container
    }

    async fn concat(&self, manifest: &Path, output: &Path, timeout: Duration) -> Result<()> {
        self.concat_command(manifest, output, timeout).execute().await?;
        Ok(())
    }

    async fn transcode(&self, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        self.transcode_command(input, output, timeout).execute().await?;
        Ok(())
    }

    async fn filter_concat(
        &self,
        inputs: &[PathBuf],
        layout: JoinLayout,
        output: &Path,
        timeout: Duration,
    ) -> Result<()> {
        self.filter_command(inputs, layout, output, timeout)
            .execute()
            .await?;
        Ok(())
    }
}
