//! # SPM Common Library
//!
//! Shared code for the Stash playlist manager crates:
//! - Error and result types
//! - Configuration loading (TOML, environment, compiled defaults)
//! - SQLite persistence for playlists, playlist items and item ratings

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
