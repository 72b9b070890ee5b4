//! Multi-strategy chunk merging.
//!
//! The [`MergeOrchestrator`] walks a fixed ladder of strategies, cheapest
//! first, until one produces a candidate file. The candidate is then
//! verified independently of what the tool reported; only a verified
//! candidate is moved to the target path.
//!
//! ```text
//! Attempt(DirectConcat) --fail--> Attempt(NormalizeConcat) --fail--> Attempt(FilterGraph) --fail--> Failed
//!          |                               |                                |
//!          +---------------ok--------------+----------------ok--------------+--> Verify --> Done | Failed
//! ```
//!
//! All intermediate files live in a per-merge [`Workspace`] that is removed
//! when [`MergeOrchestrator::merge`] returns.

mod ffmpeg;
mod manifest;
mod tool;

pub use ffmpeg::{FfmpegMergeTool, NormalizeSettings};
pub use manifest::{render_manifest, write_concat_manifest};
pub use tool::{JoinLayout, MergeTool};

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reelforged_common::paths::display_name;
use reelforged_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::validator::{ChunkValidator, Verdict};
use crate::workspace::Workspace;

/// Timeouts applied to each merge-tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeTimeouts {
    /// Bound for each concat-manifest run (direct and normalized).
    pub concat: Duration,
    /// Bound for transcoding a single chunk.
    pub transcode_per_chunk: Duration,
    /// Bound for the filter-graph join.
    pub filter_graph: Duration,
}

impl Default for MergeTimeouts {
    fn default() -> Self {
        Self {
            concat: Duration::from_secs(300),
            transcode_per_chunk: Duration::from_secs(120),
            filter_graph: Duration::from_secs(600),
        }
    }
}

/// One rung of the merge ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Stream-copy concatenation through a concat manifest.
    DirectConcat,
    /// Transcode each chunk to a canonical encoding, then concat.
    NormalizeConcat,
    /// Single invocation joining all inputs with a concat filter.
    FilterGraph,
}

impl Strategy {
    /// Stable identifier used in logs, reports and candidate file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectConcat => "direct_concat",
            Strategy::NormalizeConcat => "normalize_concat",
            Strategy::FilterGraph => "filter_graph",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The default ladder, cheapest first.
pub const DEFAULT_LADDER: [Strategy; 3] = [
    Strategy::DirectConcat,
    Strategy::NormalizeConcat,
    Strategy::FilterGraph,
];

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The tool reported success and left a candidate at this path.
    Produced { candidate: PathBuf },
    /// The stage failed; the ladder moves on.
    Failed { reason: String },
}

/// Record of one stage attempt, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct StageAttempt {
    pub strategy: Strategy,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

impl StageAttempt {
    /// Failure reason, if the stage failed.
    pub fn failure(&self) -> Option<&str> {
        match &self.outcome {
            StageOutcome::Failed { reason } => Some(reason),
            StageOutcome::Produced { .. } => None,
        }
    }
}

/// Final result of a merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Requested target path. Holds the merged file only on success.
    pub output: PathBuf,
    /// Strategy whose candidate passed verification.
    pub strategy: Option<Strategy>,
    /// Every stage that ran, in order.
    pub attempts: Vec<StageAttempt>,
    /// Verdict on the candidate, if any stage produced one.
    pub verification: Option<Verdict>,
    /// Inputs that were handed to the ladder.
    pub inputs: Vec<PathBuf>,
    /// Why the merge failed.
    pub failure: Option<String>,
}

impl MergeOutcome {
    /// Whether a verified output now exists at [`MergeOutcome::output`].
    pub fn is_success(&self) -> bool {
        self.strategy.is_some()
    }

    /// Convert a failed outcome into [`Error::MergeFailed`].
    pub fn into_result(self) -> Result<MergeOutcome> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::MergeFailed(
                self.failure.unwrap_or_else(|| "unknown failure".to_string()),
            ))
        }
    }
}

enum LadderState {
    Attempt(usize),
    Verify { strategy: Strategy, candidate: PathBuf },
    Done { strategy: Strategy, candidate: PathBuf },
    Failed(String),
}

/// Drives a [`MergeTool`] through the strategy ladder.
#[derive(Clone)]
pub struct MergeOrchestrator {
    tool: Arc<dyn MergeTool>,
    validator: ChunkValidator,
    timeouts: MergeTimeouts,
    ladder: Vec<Strategy>,
}

impl MergeOrchestrator {
    pub fn new(tool: Arc<dyn MergeTool>, validator: ChunkValidator) -> Self {
        Self {
            tool,
            validator,
            timeouts: MergeTimeouts::default(),
            ladder: DEFAULT_LADDER.to_vec(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: MergeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replace the ladder. Stages run in the given order.
    pub fn with_ladder(mut self, ladder: Vec<Strategy>) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn ladder(&self) -> &[Strategy] {
        &self.ladder
    }

    /// Merge `chunks` (already filtered and ordered) into `output`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoChunks`] when `chunks` is empty or none of them exist
    ///   with a non-zero size. No stage is attempted.
    /// - [`Error::Storage`] when the scratch directory cannot be created.
    ///
    /// Stage failures and failed verification are not errors: they are
    /// reported through the returned [`MergeOutcome`].
    pub async fn merge(&self, chunks: &[PathBuf], output: &Path) -> Result<MergeOutcome> {
        if chunks.is_empty() {
            return Err(Error::NoChunks("no chunks provided for merging".to_string()));
        }

        let inputs = existing_inputs(chunks).await;
        if inputs.is_empty() {
            return Err(Error::NoChunks(
                "none of the provided chunk files exist with content".to_string(),
            ));
        }

        let workspace = Workspace::new(output)?;
        tracing::info!(
            chunks = inputs.len(),
            scratch = %workspace.temp_dir().display(),
            "Merging into {}",
            output.display()
        );

        let mut attempts = Vec::new();
        let mut verification = None;
        let mut state = LadderState::Attempt(0);

        let (winner, failure) = loop {
            state = match state {
                LadderState::Attempt(index) => match self.ladder.get(index) {
                    Some(&strategy) => {
                        let started = Instant::now();
                        let outcome = self.run_stage(strategy, &workspace, &inputs).await;
                        let next = match &outcome {
                            StageOutcome::Produced { candidate } => {
                                tracing::info!(stage = %strategy, "Stage reported success");
                                LadderState::Verify {
                                    strategy,
                                    candidate: candidate.clone(),
                                }
                            }
                            StageOutcome::Failed { reason } => {
                                tracing::warn!(stage = %strategy, "Stage failed: {reason}");
                                LadderState::Attempt(index + 1)
                            }
                        };
                        attempts.push(StageAttempt {
                            strategy,
                            outcome,
                            elapsed: started.elapsed(),
                        });
                        next
                    }
                    None => LadderState::Failed(format!(
                        "all {} merge strategies failed",
                        self.ladder.len()
                    )),
                },
                LadderState::Verify {
                    strategy,
                    candidate,
                } => {
                    let verdict = self.validator.check(&candidate).await;
                    let next = if verdict.is_valid() {
                        LadderState::Done {
                            strategy,
                            candidate,
                        }
                    } else {
                        LadderState::Failed(format!(
                            "{strategy} produced an output that failed verification: {verdict:?}"
                        ))
                    };
                    verification = Some(verdict);
                    next
                }
                LadderState::Done {
                    strategy,
                    candidate,
                } => break (Some((strategy, candidate)), None),
                LadderState::Failed(reason) => break (None, Some(reason)),
            };
        };

        let mut outcome = MergeOutcome {
            output: output.to_path_buf(),
            strategy: None,
            attempts,
            verification,
            inputs,
            failure,
        };

        match winner {
            Some((strategy, candidate)) => match workspace.finalize(&candidate) {
                Ok(path) => {
                    tracing::info!(
                        stage = %strategy,
                        "Merged {} chunks to {}",
                        outcome.inputs.len(),
                        path.display()
                    );
                    outcome.strategy = Some(strategy);
                }
                Err(e) => {
                    tracing::error!("Failed to move merged output into place: {e}");
                    outcome.failure = Some(e.to_string());
                }
            },
            None => {
                // Dropping the workspace removes every intermediate file.
                drop(workspace);
                tracing::error!(
                    "Merge failed for {}: {}",
                    output.display(),
                    outcome.failure.as_deref().unwrap_or("unknown failure")
                );
            }
        }

        Ok(outcome)
    }

    async fn run_stage(
        &self,
        strategy: Strategy,
        workspace: &Workspace,
        inputs: &[PathBuf],
    ) -> StageOutcome {
        let result = match strategy {
            Strategy::DirectConcat => self.direct_concat(workspace, inputs).await,
            Strategy::NormalizeConcat => self.normalize_concat(workspace, inputs).await,
            Strategy::FilterGraph => self.filter_graph(workspace, inputs).await,
        };
        match result {
            Ok(candidate) => StageOutcome::Produced { candidate },
            Err(e) => StageOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn direct_concat(&self, workspace: &Workspace, inputs: &[PathBuf]) -> Result<PathBuf> {
        let manifest = workspace.temp_file("concat_list.txt");
        write_concat_manifest(&manifest, inputs)?;

        let candidate = workspace.candidate(Strategy::DirectConcat.as_str());
        let timeout = self.timeouts.concat;
        bounded(
            self.tool.name(),
            timeout,
            self.tool.concat(&manifest, &candidate, timeout),
        )
        .await?;
        Ok(candidate)
    }

    async fn normalize_concat(
        &self,
        workspace: &Workspace,
        inputs: &[PathBuf],
    ) -> Result<PathBuf> {
        let normalized_dir = workspace.subdir("normalized")?;
        let extension = self.tool.normalized_extension().to_string();

        let mut normalized = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let target = normalized_dir.join(format!("norm_{i:04}.{extension}"));
            let timeout = self.timeouts.transcode_per_chunk;
            match bounded(
                self.tool.name(),
                timeout,
                self.tool.transcode(input, &target, timeout),
            )
            .await
            {
                Ok(()) if non_empty(&target).await => normalized.push(target),
                Ok(()) => tracing::warn!(
                    "Transcoding {} reported success but produced no data; dropping it",
                    display_name(input)
                ),
                Err(e) => tracing::warn!(
                    "Failed to transcode {}; dropping it: {e}",
                    display_name(input)
                ),
            }
        }

        if normalized.is_empty() {
            return Err(Error::MergeFailed(
                "no chunk could be normalized".to_string(),
            ));
        }
        tracing::info!(
            "Normalized {} of {} chunks",
            normalized.len(),
            inputs.len()
        );

        let manifest = workspace.temp_file("normalized_list.txt");
        write_concat_manifest(&manifest, &normalized)?;

        let candidate = workspace.candidate(Strategy::NormalizeConcat.as_str());
        let timeout = self.timeouts.concat;
        bounded(
            self.tool.name(),
            timeout,
            self.tool.concat(&manifest, &candidate, timeout),
        )
        .await?;
        Ok(candidate)
    }

    async fn filter_graph(&self, workspace: &Workspace, inputs: &[PathBuf]) -> Result<PathBuf> {
        let mut joined = Vec::with_capacity(inputs.len());
        let mut all_have_audio = true;

        for input in inputs {
            match self.validator.probe().streams(input).await {
                Ok(summary) if summary.has_video() => {
                    all_have_audio &= summary.has_audio();
                    joined.push(input.clone());
                }
                Ok(_) => tracing::warn!(
                    "{} has no video stream; skipping it in the filter graph",
                    display_name(input)
                ),
                Err(e) => tracing::warn!(
                    "Could not probe {}; skipping it in the filter graph: {e}",
                    display_name(input)
                ),
            }
        }

        if joined.is_empty() {
            return Err(Error::MergeFailed(
                "no input has a usable video stream".to_string(),
            ));
        }

        let layout = if all_have_audio {
            JoinLayout::AudioVideo
        } else {
            JoinLayout::VideoOnly
        };
        tracing::debug!(?layout, inputs = joined.len(), "Building concat filter");

        let candidate = workspace.candidate(Strategy::FilterGraph.as_str());
        let timeout = self.timeouts.filter_graph;
        bounded(
            self.tool.name(),
            timeout,
            self.tool.filter_concat(&joined, layout, &candidate, timeout),
        )
        .await?;
        Ok(candidate)
    }
}

/// Hold a tool operation to its deadline, whatever the tool does itself.
async fn bounded<F>(tool: &str, timeout: Duration, operation: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(Error::tool(
            tool,
            format!("timed out after {}ms", timeout.as_millis()),
        )),
    }
}

async fn non_empty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Keep the inputs that exist with content, logging each one's size.
async fn existing_inputs(chunks: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        match tokio::fs::metadata(chunk).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                tracing::debug!(index = i, size = meta.len(), "Chunk {}", display_name(chunk));
                inputs.push(chunk.clone());
            }
            _ => tracing::warn!("Skipping non-existent or empty file: {}", chunk.display()),
        }
    }
    inputs
}
