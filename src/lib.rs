//! Reelforged - live recording sessions assembled from uploaded chunks
//!
//! This library crate exposes the session façade, its store and the
//! configuration loader for the CLI and for integration testing.

pub mod config;
pub mod service;
pub mod store;

pub use service::{
    ChunkReceipt, ChunkUpload, CompletedVideo, EndSessionOutcome, SessionService, SessionStatus,
    StageReport,
};
pub use store::SessionStore;
