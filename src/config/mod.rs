mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./reelforged.toml",
        "./config.toml",
        "~/.config/reelforged/config.toml",
        "/etc/reelforged/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    config.storage.upload_dir = expand_tilde(&config.storage.upload_dir);
    if let Some(ref mut p) = config.tools.ffmpeg_path {
        *p = expand_tilde(p);
    }
    if let Some(ref mut p) = config.tools.ffprobe_path {
        *p = expand_tilde(p);
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.validation.probe_timeout_secs == 0 {
        anyhow::bail!("validation.probe_timeout_secs cannot be 0");
    }

    let merge = &config.merge;
    for (name, secs) in [
        ("merge.concat_timeout_secs", merge.concat_timeout_secs),
        ("merge.transcode_timeout_secs", merge.transcode_timeout_secs),
        ("merge.filter_timeout_secs", merge.filter_timeout_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("{} cannot be 0", name);
        }
    }

    if merge.normalize.container.is_empty() {
        anyhow::bail!("merge.normalize.container cannot be empty");
    }

    if config.workers.max_concurrent == 0 {
        anyhow::bail!("workers.max_concurrent cannot be 0");
    }

    // Missing tools are reported, not fatal: PATH lookup may still work
    for path in [&config.tools.ffmpeg_path, &config.tools.ffprobe_path]
        .into_iter()
        .flatten()
    {
        if !path.exists() {
            tracing::warn!("Configured tool path does not exist: {:?}", path);
        }
    }

    Ok(())
}
