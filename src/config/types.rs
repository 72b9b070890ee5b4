use reelforged_av::{MergeTimeouts, NormalizeSettings, ToolPaths};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolPaths,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per session
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Hard bound on each probe run; a timeout marks the chunk invalid
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    10
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ValidationConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeConfig {
    #[serde(default = "default_concat_timeout")]
    pub concat_timeout_secs: u64,

    /// Applied to each chunk separately
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_secs: u64,

    #[serde(default = "default_filter_timeout")]
    pub filter_timeout_secs: u64,

    /// Encoder preset for the filter-graph join
    #[serde(default = "default_filter_preset")]
    pub filter_preset: String,

    #[serde(default)]
    pub normalize: NormalizeSettings,
}

fn default_concat_timeout() -> u64 {
    300
}

fn default_transcode_timeout() -> u64 {
    120
}

fn default_filter_timeout() -> u64 {
    600
}

fn default_filter_preset() -> String {
    "medium".to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            concat_timeout_secs: default_concat_timeout(),
            transcode_timeout_secs: default_transcode_timeout(),
            filter_timeout_secs: default_filter_timeout(),
            filter_preset: default_filter_preset(),
            normalize: NormalizeSettings::default(),
        }
    }
}

impl MergeConfig {
    pub fn timeouts(&self) -> MergeTimeouts {
        MergeTimeouts {
            concat: Duration::from_secs(self.concat_timeout_secs),
            transcode_per_chunk: Duration::from_secs(self.transcode_timeout_secs),
            filter_graph: Duration::from_secs(self.filter_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    /// Upper bound on concurrent probes and merges
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}
