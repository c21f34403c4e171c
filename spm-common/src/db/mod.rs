//! Database models and queries

pub mod init;
pub mod models;
pub mod playlists;
pub mod ratings;

pub use init::*;
pub use models::*;
