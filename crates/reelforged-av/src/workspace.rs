//! Scratch workspace for a single merge.
//!
//! A [`Workspace`] owns a private temporary directory that holds every
//! intermediate artifact of one merge (concat manifests, normalized chunks,
//! candidate outputs). The directory is removed when the workspace is
//! dropped, whether the merge succeeded or not.

use std::path::{Path, PathBuf};

use reelforged_common::{Error, Result};
use tempfile::TempDir;

/// Per-merge scratch directory with a target output path.
///
/// # Example
///
/// ```no_run
/// use reelforged_av::Workspace;
///
/// let workspace = Workspace::new("/uploads/s1/complete_recording.webm")?;
/// let candidate = workspace.candidate("direct_concat");
/// // ... run the merge tool writing to `candidate` ...
/// workspace.finalize(&candidate)?;
/// # Ok::<(), reelforged_common::Error>(())
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    target: PathBuf,
}

impl Workspace {
    /// Create a new scratch directory for producing `target`.
    ///
    /// The scratch directory is created next to the target when possible so
    /// the final move is a rename on the same filesystem.
    pub fn new<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        if target.file_name().is_none() {
            return Err(Error::InvalidInput(format!(
                "merge target has no file name: {}",
                target.display()
            )));
        }

        let temp_dir = match target.parent().filter(|p| p.is_dir()) {
            Some(parent) => tempfile::Builder::new()
                .prefix(".merge-")
                .tempdir_in(parent),
            None => tempfile::Builder::new().prefix("reelforged-merge-").tempdir(),
        }
        .map_err(|e| Error::storage(&target, format!("failed to create scratch dir: {e}")))?;

        Ok(Self { temp_dir, target })
    }

    /// The final output path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path to the scratch directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a path for a named file inside the scratch directory.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Candidate output path for a stage, sharing the target's extension.
    pub fn candidate(&self, stage: &str) -> PathBuf {
        let name = match self.target.extension() {
            Some(ext) => format!("{stage}.{}", ext.to_string_lossy()),
            None => stage.to_string(),
        };
        self.temp_file(&name)
    }

    /// Create (if needed) and return a subdirectory of the scratch directory.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.temp_file(name);
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::storage(&dir, format!("failed to create directory: {e}")))?;
        Ok(dir)
    }

    /// Move a verified candidate to the target path, replacing any previous
    /// file there. Consumes the workspace, removing the scratch directory.
    pub fn finalize(self, candidate: &Path) -> Result<PathBuf> {
        if !candidate.exists() {
            return Err(Error::storage(candidate, "candidate output does not exist"));
        }

        // Try rename first (same filesystem), fall back to copy.
        if std::fs::rename(candidate, &self.target).is_err() {
            std::fs::copy(candidate, &self.target).map_err(|e| {
                Error::storage(&self.target, format!("failed to move merged output: {e}"))
            })?;
        }

        Ok(self.target.clone())
    }
}
