//! Reelforged-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across reelforged:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for recording sessions
//! - **Records**: The [`Session`] and [`Chunk`] snapshot schema
//! - **Container formats**: Mime-type classification and output majority
//! - **Path Utilities**: Deterministic names for chunk, snapshot and output files
//! - **Error Handling**: The unified error type and result alias
//!
//! # Examples
//!
//! ```
//! use reelforged_common::{ContainerFormat, SessionId};
//! use reelforged_common::paths::chunk_file_name;
//!
//! let id = SessionId::new();
//! assert!(!id.to_string().is_empty());
//!
//! let format = ContainerFormat::from_mime_or_default(Some("video/mp4"));
//! assert_eq!(chunk_file_name(7, format), "chunk_0007.mp4");
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
