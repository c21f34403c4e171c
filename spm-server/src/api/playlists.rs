//! Playlist endpoints
//!
//! Smart playlists store their rule as submitted; compiling runs the rule
//! against Stash (bypassing the cache) and replaces the stored items. The
//! rule's minimum rating is applied when items are read, so re-rating an
//! item changes membership without a recompile.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spm_common::db::{playlists, NewPlaylist, Playlist, PlaylistItem, PlaylistKind};
use spm_core::filter::filter_by_min_rating;
use spm_core::mapper::to_relative_path;
use spm_core::{MarkerRequest, RatingStore, Rule};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub kind: PlaylistKind,
    #[serde(default)]
    pub rule: Option<Value>,
    /// Explicit items for manual playlists
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

fn parse_rule(rule: &Value) -> ApiResult<Rule> {
    Rule::from_json(rule).map_err(|e| ApiError::BadRequest(format!("Invalid rule: {}", e)))
}

fn smart_rule(playlist: &Playlist) -> ApiResult<Option<Rule>> {
    match (&playlist.kind, &playlist.rule) {
        (PlaylistKind::Smart, Some(rule)) => parse_rule(rule).map(Some),
        _ => Ok(None),
    }
}

/// POST /api/playlists
pub async fn create_playlist(
    State(state): State<AppState>,
    Json(body): Json<CreatePlaylistRequest>,
) -> ApiResult<(StatusCode, Json<Playlist>)> {
    match body.kind {
        PlaylistKind::Smart => match &body.rule {
            Some(rule) => {
                parse_rule(rule)?;
            }
            None => {
                return Err(ApiError::BadRequest(
                    "Smart playlists require a rule".to_string(),
                ))
            }
        },
        PlaylistKind::Manual if body.rule.is_some() => {
            return Err(ApiError::BadRequest(
                "Manual playlists cannot have a rule".to_string(),
            ));
        }
        PlaylistKind::Manual => {}
    }

    let playlist = playlists::create_playlist(
        &state.db,
        &NewPlaylist {
            name: body.name,
            kind: body.kind,
            rule: body.rule,
        },
    )
    .await?;

    if !body.items.is_empty() {
        let items: Vec<PlaylistItem> = body
            .items
            .into_iter()
            .map(|mut item| {
                item.screenshot = to_relative_path(&item.screenshot);
                item.stream = to_relative_path(&item.stream);
                item.preview = to_relative_path(&item.preview);
                item
            })
            .collect();
        playlists::replace_items(&state.db, &playlist.id, &items).await?;
    }

    info!(id = %playlist.id, kind = %playlist.kind, "Playlist created");
    Ok((StatusCode::CREATED, Json(playlist)))
}

/// GET /api/playlists
pub async fn list_playlists(State(state): State<AppState>) -> ApiResult<Json<Vec<Playlist>>> {
    Ok(Json(playlists::list_playlists(&state.db).await?))
}

/// GET /api/playlists/:id
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Playlist>> {
    Ok(Json(playlists::get_playlist(&state.db, &id).await?))
}

/// DELETE /api/playlists/:id
pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if playlists::delete_playlist(&state.db, &id).await? {
        info!(id = %id, "Playlist deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Playlist {}", id)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub playlist_id: String,
    /// Remote total for the rule's query, before client-side filtering
    pub remote_count: u64,
    pub items: Vec<PlaylistItem>,
}

/// POST /api/playlists/:id/compile
pub async fn compile_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CompileResponse>> {
    let playlist = playlists::get_playlist(&state.db, &id).await?;
    let rule = smart_rule(&playlist)?.ok_or_else(|| {
        ApiError::BadRequest(format!("Playlist {} is not a smart playlist", id))
    })?;

    let outcome = state
        .orchestrator
        .fetch_fresh(MarkerRequest::for_rule(rule))
        .await;
    let snapshot = match (outcome.snapshot, outcome.error) {
        (Some(snapshot), _) => snapshot,
        (None, error) => {
            return Err(ApiError::BadGateway(
                error.unwrap_or_else(|| "no markers returned".to_string()),
            ))
        }
    };

    let items = playlists::replace_items(&state.db, &id, &snapshot.items).await?;
    info!(id = %id, items = items.len(), "Smart playlist compiled");

    Ok(Json(CompileResponse {
        playlist_id: id,
        remote_count: snapshot.count,
        items,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsResponse {
    pub items: Vec<PlaylistItem>,
    pub ratings: HashMap<String, u8>,
}

/// GET /api/playlists/:id/items
pub async fn list_playlist_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ItemsResponse>> {
    let playlist = playlists::get_playlist(&state.db, &id).await?;
    let mut items = playlists::list_items(&state.db, &id).await?;

    if let Some(rule) = smart_rule(&playlist)? {
        items = filter_by_min_rating(items, rule.min_rating, state.ratings.as_ref()).await;
    }

    let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
    // Listing survives a rating store failure
    let ratings = match state.ratings.ratings_for(&ids).await {
        Ok(ratings) => ratings,
        Err(e) => {
            warn!(id = %id, error = %e, "Rating lookup failed, listing items without ratings");
            HashMap::new()
        }
    };

    Ok(Json(ItemsResponse { items, ratings }))
}
