//! # reelforged-av
//!
//! Chunk validation and merging for reelforged, built on the ffmpeg and
//! ffprobe command-line tools.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- locate ffmpeg and ffprobe,
//!   honouring configured overrides.
//! - **Command execution** ([`ToolCommand`]) -- async builder with a hard
//!   timeout; the child is killed when the timeout fires.
//! - **Probing** ([`MediaProbe`], [`FfprobeProbe`]) -- count the streams a
//!   file carries.
//! - **Validation** ([`ChunkValidator`]) -- decide whether a file holds a
//!   decodable video stream. Never errors; failures mean "invalid".
//! - **Merging** ([`MergeOrchestrator`]) -- run the direct-concat,
//!   normalize-then-concat and filter-graph strategies in order, verify the
//!   result, and move it into place.
//! - **Workspace management** ([`Workspace`]) -- per-merge scratch directory
//!   removed on every exit path.

pub mod command;
pub mod merge;
pub mod probe;
pub mod tools;
pub mod validator;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use merge::{
    FfmpegMergeTool, JoinLayout, MergeOrchestrator, MergeOutcome, MergeTimeouts, MergeTool,
    NormalizeSettings, StageAttempt, StageOutcome, Strategy, DEFAULT_LADDER,
};
pub use probe::{FfprobeProbe, MediaProbe, StreamSummary};
pub use tools::{ToolInfo, ToolPaths, ToolRegistry};
pub use validator::{ChunkValidator, Verdict};
pub use workspace::Workspace;
