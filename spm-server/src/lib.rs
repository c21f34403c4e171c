//! spm-server library - HTTP surface of the Stash playlist manager
//!
//! Exposes marker previews (cache-aware), smart playlist compilation,
//! playlist storage and item ratings to the browser UI.

use axum::Router;
use spm_core::{MarkerOrchestrator, MarkerQueryService, MatchCache, RatingStore};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod store;

use store::SqliteRatingStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub orchestrator: MarkerOrchestrator,
    pub ratings: Arc<SqliteRatingStore>,
}

impl AppState {
    /// Wire the matching engine to `db` for ratings
    pub fn new(db: SqlitePool, service: Arc<dyn MarkerQueryService>, cache: MatchCache) -> Self {
        let ratings = Arc::new(SqliteRatingStore::new(db.clone()));
        let orchestrator = MarkerOrchestrator::new(
            service,
            cache,
            Some(ratings.clone() as Arc<dyn RatingStore>),
        );
        Self {
            db,
            orchestrator,
            ratings,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post, put};

    let api = Router::new()
        .route("/api/markers/preview", post(api::preview_markers))
        .route("/api/markers/count", post(api::count_markers))
        .route(
            "/api/playlists",
            get(api::list_playlists).post(api::create_playlist),
        )
        .route(
            "/api/playlists/:id",
            get(api::get_playlist).delete(api::delete_playlist),
        )
        .route("/api/playlists/:id/compile", post(api::compile_playlist))
        .route("/api/playlists/:id/items", get(api::list_playlist_items))
        .route("/api/items/:id/rating", put(api::set_item_rating))
        .route("/api/cache", delete(api::clear_cache));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Tracing filter directives applying `level` to the workspace crates and tower-http
pub fn log_directives(level: &str) -> String {
    let level = level.trim();
    format!("spm_server={level},spm_core={level},spm_common={level},tower_http={level}")
}
