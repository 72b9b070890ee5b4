//! Deterministic file naming for session directories.
//!
//! Every session owns `<upload_dir>/<session_id>/`, which holds the chunk
//! payloads, the `session_info.json` snapshot and, after a successful merge,
//! the combined recording.

use std::path::{Path, PathBuf};

use crate::ids::SessionId;
use crate::types::ContainerFormat;

/// File name of the per-session snapshot.
pub const SESSION_RECORD_FILE: &str = "session_info.json";

/// Base name of the merged recording.
pub const OUTPUT_STEM: &str = "complete_recording";

/// Directory that holds everything belonging to `id`.
#[must_use]
pub fn session_dir(upload_dir: &Path, id: &SessionId) -> PathBuf {
    upload_dir.join(id.to_string())
}

/// Path of the snapshot file inside a session directory.
#[must_use]
pub fn session_record_path(session_dir: &Path) -> PathBuf {
    session_dir.join(SESSION_RECORD_FILE)
}

/// File name for a chunk payload.
///
/// # Examples
///
/// ```
/// use reelforged_common::paths::chunk_file_name;
/// use reelforged_common::ContainerFormat;
///
/// assert_eq!(chunk_file_name(3, ContainerFormat::Webm), "chunk_0003.webm");
/// assert_eq!(chunk_file_name(12345, ContainerFormat::Mp4), "chunk_12345.mp4");
/// ```
#[must_use]
pub fn chunk_file_name(number: u32, format: ContainerFormat) -> String {
    format!("chunk_{:04}.{}", number, format.extension())
}

/// File name of the merged recording.
#[must_use]
pub fn output_file_name(format: ContainerFormat) -> String {
    format!("{}.{}", OUTPUT_STEM, format.extension())
}

/// Base name of `path` as a display string, used in merge reports.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
