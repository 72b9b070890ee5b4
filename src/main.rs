mod cli;

use reelforged::{config, service, ChunkUpload, EndSessionOutcome, SessionService};
use reelforged_av::{ToolRegistry, Verdict};
use reelforged_common::{Metadata, SessionId};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::future::Future;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelforged=trace,reelforged_av=debug,reelforged_common=debug".to_string()
        } else {
            "reelforged=info,reelforged_av=info".to_string()
        }
    });

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::StartSession { meta } => block_on(start_session(config_path, meta)),
        Commands::AddChunk {
            session,
            number,
            file,
            mime,
            timestamp,
        } => block_on(add_chunk(config_path, &session, number, &file, mime, timestamp)),
        Commands::EndSession { session } => block_on(end_session(config_path, &session)),
        Commands::Status { session } => block_on(status(config_path, &session)),
        Commands::List => list_sessions(config_path),
        Commands::ValidateChunk { file } => block_on(validate_chunk(config_path, &file)),
        Commands::Merge { inputs, output } => block_on(merge_files(config_path, inputs, &output)),
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => validate_config(validate_path.as_deref().or(config_path)),
        Commands::Version => {
            println!("reelforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

fn open_service(config_path: Option<&Path>) -> Result<SessionService> {
    let config = config::load_config_or_default(config_path)?;
    SessionService::from_config(&config).context("Failed to open session store")
}

fn parse_session_id(raw: &str) -> Result<SessionId> {
    raw.parse()
        .with_context(|| format!("Invalid session id: {raw}"))
}

async fn start_session(config_path: Option<&Path>, meta: Vec<(String, String)>) -> Result<()> {
    let service = open_service(config_path)?;

    let metadata: Metadata = meta
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();
    let id = service.start_session(metadata).await?;

    println!("{}", id);
    Ok(())
}

async fn add_chunk(
    config_path: Option<&Path>,
    session: &str,
    number: u32,
    file: &Path,
    mime_type: Option<String>,
    timestamp: Option<i64>,
) -> Result<()> {
    let id = parse_session_id(session)?;
    let payload = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read chunk file: {:?}", file))?;

    let service = open_service(config_path)?;
    let receipt = service
        .add_chunk(
            id,
            ChunkUpload {
                number,
                payload: payload.into(),
                timestamp: timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
                mime_type,
            },
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

async fn end_session(config_path: Option<&Path>, session: &str) -> Result<()> {
    let id = parse_session_id(session)?;
    let service = open_service(config_path)?;

    let outcome = service.end_session(id).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let EndSessionOutcome::MergeFailed { reason, .. } = &outcome {
        anyhow::bail!("Merge failed: {}", reason);
    }
    Ok(())
}

async fn status(config_path: Option<&Path>, session: &str) -> Result<()> {
    let id = parse_session_id(session)?;
    let service = open_service(config_path)?;

    let status = service.status(id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn list_sessions(config_path: Option<&Path>) -> Result<()> {
    let service = open_service(config_path)?;
    for id in service.list_sessions() {
        println!("{}", id);
    }
    Ok(())
}

async fn validate_chunk(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let (validator, _) = service::media_pipeline(&config);

    match validator.check(file).await {
        Verdict::Valid(streams) => println!(
            "✓ {} ({} video, {} audio)",
            file.display(),
            streams.video,
            streams.audio
        ),
        Verdict::Missing => anyhow::bail!("File does not exist: {:?}", file),
        Verdict::Empty => anyhow::bail!("File is empty: {:?}", file),
        Verdict::NoVideo(_) => anyhow::bail!("No video stream in {:?}", file),
        Verdict::ProbeFailed(reason) => anyhow::bail!("Probe failed for {:?}: {}", file, reason),
    }
    Ok(())
}

async fn merge_files(config_path: Option<&Path>, inputs: Vec<PathBuf>, output: &Path) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let (_, orchestrator) = service::media_pipeline(&config);

    let outcome = orchestrator.merge(&inputs, output).await?;
    for attempt in &outcome.attempts {
        match attempt.failure() {
            Some(reason) => println!("✗ {} ({:?}): {}", attempt.strategy, attempt.elapsed, reason),
            None => println!("✓ {} ({:?})", attempt.strategy, attempt.elapsed),
        }
    }

    let outcome = outcome.into_result()?;
    println!("Merged {} files into {}", outcome.inputs.len(), outcome.output.display());
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Chunk validation and merging need ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!("  Upload dir: {}", config.storage.upload_dir.display());
    println!("  Probe timeout: {}s", config.validation.probe_timeout_secs);
    println!(
        "  Merge timeouts: concat {}s, transcode {}s/chunk, filter {}s",
        config.merge.concat_timeout_secs,
        config.merge.transcode_timeout_secs,
        config.merge.filter_timeout_secs
    );
    println!(
        "  Normalize: {} / {} @ {} -> {}",
        config.merge.normalize.video_codec,
        config.merge.normalize.audio_codec,
        config.merge.normalize.audio_bitrate,
        config.merge.normalize.container
    );
    println!("  Workers: {}", config.workers.max_concurrent);

    Ok(())
}
