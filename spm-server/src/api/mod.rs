//! HTTP API handlers for spm-server

pub mod cache;
pub mod health;
pub mod markers;
pub mod playlists;
pub mod ratings;

pub use cache::clear_cache;
pub use health::health_routes;
pub use markers::{count_markers, preview_markers};
pub use playlists::{
    compile_playlist, create_playlist, delete_playlist, get_playlist, list_playlist_items,
    list_playlists,
};
pub use ratings::set_item_rating;
