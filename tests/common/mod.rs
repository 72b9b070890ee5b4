//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which opens a [`SessionService`] over a temporary
//! upload directory, backed by [`StubProbe`] and [`StubMergeTool`] so no
//! ffmpeg installation is needed.
//!
//! Chunk payloads double as probe results: a file containing
//! `"video audio"` probes as one video and one audio stream.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelforged::{ChunkUpload, SessionService, SessionStore};
use reelforged_av::{ChunkValidator, JoinLayout, MediaProbe, MergeOrchestrator, MergeTool, StreamSummary};
use reelforged_common::{Error, Result};
use tempfile::TempDir;

/// Probe that reads stream kinds from the file's content.
#[derive(Default)]
pub struct StubProbe;

#[async_trait]
impl MediaProbe for StubProbe {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn streams(&self, path: &Path) -> Result<StreamSummary> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut summary = StreamSummary::default();
        for kind in content.split_whitespace() {
            summary.record(kind);
        }
        Ok(summary)
    }
}

/// Merge tool whose operations succeed or fail as configured.
///
/// Operation names: `concat`, `concat_normalized`, `transcode`, `filter`.
pub struct StubMergeTool {
    failing: HashSet<&'static str>,
    output: String,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    concat_inputs: Mutex<Vec<Vec<String>>>,
}

impl Default for StubMergeTool {
    fn default() -> Self {
        Self::failing(&[])
    }
}

impl StubMergeTool {
    pub fn failing(ops: &[&'static str]) -> Self {
        Self {
            failing: ops.iter().copied().collect(),
            output: "video audio".to_string(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            concat_inputs: Mutex::new(Vec::new()),
        }
    }

    /// Content written by successful operations.
    pub fn writing(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    /// Make every concat take `delay` before it writes its output.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// File names listed by each concat manifest, in manifest order.
    pub fn concat_inputs(&self) -> Vec<Vec<String>> {
        self.concat_inputs.lock().clone()
    }

    fn run(&self, op: &'static str, output: &Path) -> Result<()> {
        self.calls.lock().push(op.to_string());
        if self.failing.contains(op) {
            return Err(Error::tool("stub", format!("{op} failed")));
        }
        std::fs::write(output, &self.output)?;
        Ok(())
    }
}

#[async_trait]
impl MergeTool for StubMergeTool {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn normalized_extension(&self) -> &str {
        "mp4"
    }

    async fn concat(&self, manifest: &Path, output: &Path, _timeout: Duration) -> Result<()> {
        let listed: Vec<String> = std::fs::read_to_string(manifest)?
            .lines()
            .filter_map(|line| line.strip_prefix("file '")?.strip_suffix('\''))
            .map(|p| {
                Path::new(p)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
            .collect();
        self.concat_inputs.lock().push(listed);

        let op = if manifest.ends_with("normalized_list.txt") {
            "concat_normalized"
        } else {
            "concat"
        };
        tokio::time::sleep(self.delay).await;
        self.run(op, output)
    }

    async fn transcode(&self, _input: &Path, output: &Path, _timeout: Duration) -> Result<()> {
        self.run("transcode", output)
    }

    async fn filter_concat(
        &self,
        _inputs: &[PathBuf],
        _layout: JoinLayout,
        output: &Path,
        _timeout: Duration,
    ) -> Result<()> {
        self.run("filter", output)
    }
}

/// A session service over a temporary upload directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub service: SessionService,
    pub tool: Arc<StubMergeTool>,
}

impl TestHarness {
    /// Harness whose merge tool succeeds at every operation.
    pub fn new() -> Self {
        Self::with_tool(StubMergeTool::default())
    }

    pub fn with_tool(tool: StubMergeTool) -> Self {
        let dir = tempfile::tempdir().expect("failed to create upload dir");
        let tool = Arc::new(tool);
        let service = build_service(dir.path(), tool.clone());
        Self { dir, service, tool }
    }

    /// A fresh service over the same upload directory, as after a restart.
    pub fn restart(&self) -> SessionService {
        build_service(self.dir.path(), self.tool.clone())
    }

    pub fn upload_dir(&self) -> &Path {
        self.dir.path()
    }
}

fn build_service(upload_dir: &Path, tool: Arc<StubMergeTool>) -> SessionService {
    let store = SessionStore::open(upload_dir).expect("failed to open store");
    let validator = ChunkValidator::new(Arc::new(StubProbe));
    let orchestrator = MergeOrchestrator::new(tool, validator.clone());
    SessionService::new(Arc::new(store), validator, orchestrator, 4)
}

/// A chunk that validates (video and audio streams).
pub fn video_chunk(number: u32) -> ChunkUpload {
    upload(number, "video audio", Some("video/webm"))
}

/// A chunk that fails validation (audio only).
pub fn audio_only_chunk(number: u32) -> ChunkUpload {
    upload(number, "audio", Some("video/webm"))
}

pub fn upload(number: u32, payload: &str, mime_type: Option<&str>) -> ChunkUpload {
    ChunkUpload {
        number,
        payload: payload.to_string().into(),
        timestamp: 1_700_000_000_000 + number as i64,
        mime_type: mime_type.map(str::to_string),
    }
}
