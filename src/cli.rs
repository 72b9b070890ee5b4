use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelforged")]
#[command(author, version, about = "Live recording chunk sessions and merging")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new recording session and print its id
    StartSession {
        /// Metadata entries stored verbatim with the session
        #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },

    /// Upload a chunk file into a session
    AddChunk {
        /// Session id
        session: String,

        /// Chunk number within the session
        number: u32,

        /// File holding the chunk payload
        file: PathBuf,

        /// Declared mime type (e.g. video/webm)
        #[arg(long)]
        mime: Option<String>,

        /// Capture timestamp in milliseconds (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// End a session and merge its valid chunks
    EndSession {
        /// Session id
        session: String,
    },

    /// Show the status of a session
    Status {
        /// Session id
        session: String,
    },

    /// List known sessions
    List,

    /// Check whether a media file holds a decodable video stream
    ValidateChunk {
        /// File to validate
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Merge media files directly, outside of any session
    Merge {
        /// Input files, in merge order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
