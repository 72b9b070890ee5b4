//! The [`MergeTool`] seam: the external engine that concatenates and
//! transcodes media. The orchestrator owns the strategy; the tool only runs
//! one operation at a time and reports success or failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reelforged_common::Result;

/// Stream layout for a filter-graph join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinLayout {
    /// Join the first video and first audio stream of every input.
    AudioVideo,
    /// Join only the first video stream of every input.
    VideoOnly,
}

impl JoinLayout {
    /// Build the `-filter_complex` expression joining `inputs` inputs.
    ///
    /// # Example
    ///
    /// ```
    /// use reelforged_av::JoinLayout;
    ///
    /// assert_eq!(
    ///     JoinLayout::VideoOnly.filter_graph(2),
    ///     "[0:v:0][1:v:0]concat=n=2:v=1[outv]"
    /// );
    /// ```
    pub fn filter_graph(&self, inputs: usize) -> String {
        let mut graph = String::new();
        for i in 0..inputs {
            match self {
                JoinLayout::AudioVideo => graph.push_str(&format!("[{i}:v:0][{i}:a:0]")),
                JoinLayout::VideoOnly => graph.push_str(&format!("[{i}:v:0]")),
            }
        }
        match self {
            JoinLayout::AudioVideo => {
                graph.push_str(&format!("concat=n={inputs}:v=1:a=1[outv][outa]"))
            }
            JoinLayout::VideoOnly => graph.push_str(&format!("concat=n={inputs}:v=1[outv]")),
        }
        graph
    }

    /// Output pads produced by [`JoinLayout::filter_graph`].
    pub fn output_labels(&self) -> &'static [&'static str] {
        match self {
            JoinLayout::AudioVideo => &["[outv]", "[outa]"],
            JoinLayout::VideoOnly => &["[outv]"],
        }
    }
}

/// An external media engine able to run the three merge operations.
///
/// Every call runs as an isolated subprocess bounded by `timeout`. An `Err`
/// (non-zero exit, crash, timeout) is the failure of that one operation;
/// an `Ok` is a claim the orchestrator still verifies.
#[async_trait]
pub trait MergeTool: Send + Sync {
    /// Short identifier for logs (e.g. `"ffmpeg"`).
    fn name(&self) -> &'static str;

    /// Extension used for normalized (transcoded) intermediate files.
    fn normalized_extension(&self) -> &str;

    /// Stream-copy concatenate the files listed in a concat manifest.
    async fn concat(&self, manifest: &Path, output: &Path, timeout: Duration) -> Result<()>;

    /// Transcode one input into the canonical codec/container.
    async fn transcode(&self, input: &Path, output: &Path, timeout: Duration) -> Result<()>;

    /// Open every input separately and join them with a concat filter.
    async fn filter_concat(
        &self,
        inputs: &[PathBuf],
        layout: JoinLayout,
        output: &Path,
        timeout: Duration,
    ) -> Result<()>;
}
