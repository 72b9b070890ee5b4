//! Integration tests for configuration discovery.
//!
//! These change the process working directory, so they run serially.

use reelforged::config::load_config_or_default;
use serial_test::serial;
use std::path::Path;

struct CwdGuard(std::path::PathBuf);

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

#[test]
#[serial]
fn finds_reelforged_toml_in_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("reelforged.toml"),
        "[workers]\nmax_concurrent = 5\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("config.toml"), "[workers]\nmax_concurrent = 9\n").unwrap();

    let _cwd = CwdGuard::enter(dir.path());
    let config = load_config_or_default(None).unwrap();
    assert_eq!(config.workers.max_concurrent, 5);
}

#[test]
#[serial]
fn falls_back_to_config_toml() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[merge]\nfilter_preset = \"slow\"\n").unwrap();

    let _cwd = CwdGuard::enter(dir.path());
    let config = load_config_or_default(None).unwrap();
    assert_eq!(config.merge.filter_preset, "slow");
}

#[test]
#[serial]
fn invalid_file_in_working_dir_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("reelforged.toml"), "[workers]\nmax_concurrent = 0\n").unwrap();

    let _cwd = CwdGuard::enter(dir.path());
    assert!(load_config_or_default(None).is_err());
}

#[test]
#[serial]
fn explicit_path_wins() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("reelforged.toml"), "[workers]\nmax_concurrent = 5\n").unwrap();
    let explicit = dir.path().join("custom.toml");
    std::fs::write(&explicit, "[workers]\nmax_concurrent = 7\n").unwrap();

    let _cwd = CwdGuard::enter(dir.path());
    let config = load_config_or_default(Some(&explicit)).unwrap();
    assert_eq!(config.workers.max_concurrent, 7);
}
