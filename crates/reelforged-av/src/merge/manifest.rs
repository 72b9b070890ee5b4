//! Concat-demuxer manifests.
//!
//! One `file '<absolute path>'` line per input. Single quotes inside a path
//! are written as `'\''`, the escaping the concat demuxer understands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use reelforged_common::{Error, Result};

/// Render the manifest text for `inputs`, resolving each to an absolute path.
pub fn render_manifest(inputs: &[PathBuf]) -> Result<String> {
    let mut text = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input)?;
        let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
        // Writing to a String cannot fail.
        let _ = writeln!(text, "file '{escaped}'");
    }
    Ok(text)
}

/// Write a manifest for `inputs` to `manifest`.
pub fn write_concat_manifest(manifest: &Path, inputs: &[PathBuf]) -> Result<()> {
    let text = render_manifest(inputs)?;
    std::fs::write(manifest, text)
        .map_err(|e| Error::storage(manifest, format!("failed to write concat manifest: {e}")))
}
