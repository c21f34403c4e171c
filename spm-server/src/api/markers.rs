//! Marker preview and count endpoints
//!
//! Preview answers from the match cache whenever it can. A stale or missing
//! entry triggers a Stash fetch; with `wait=false` (the default) a cached
//! answer is returned at once and the refresh finishes in the background.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use spm_common::db::PlaylistItem;
use spm_core::{MarkerRequest, PageKey, RuleInput, SnapshotSource};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body shared by preview and count
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRequestBody {
    /// Actor whose markers are browsed; defaults to the rule's performers
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub rule: RuleInput,
    /// Latest remote count known to the caller
    #[serde(default)]
    pub expected_count: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    /// Wait for a pending refresh instead of answering from cache
    #[serde(default)]
    pub wait: bool,
}

impl MarkerRequestBody {
    fn page_key(&self) -> Option<PageKey> {
        match (self.page, self.per_page) {
            (None, None) => None,
            (page, per_page) => Some(PageKey::new(page.unwrap_or(1), per_page.unwrap_or(50))),
        }
    }

    fn to_request(&self) -> MarkerRequest {
        let rule = self.rule.normalize();
        let request = match self.actor_id.as_deref().map(str::trim) {
            Some(actor) if !actor.is_empty() => MarkerRequest::new(actor, rule),
            _ => MarkerRequest::for_rule(rule),
        };
        request
            .with_expected_count(self.expected_count)
            .with_page(self.page_key())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub items: Vec<PlaylistItem>,
    pub ratings: HashMap<String, u8>,
    pub count: u64,
    pub from_cache: bool,
    /// A background refresh is still running
    pub refreshing: bool,
    /// Refresh failure reported alongside cached data
    pub error: Option<String>,
}

/// POST /api/markers/preview
pub async fn preview_markers(
    State(state): State<AppState>,
    Json(body): Json<MarkerRequestBody>,
) -> ApiResult<Json<PreviewResponse>> {
    let request = body.to_request();
    debug!(actor = %request.actor_id, wait = body.wait, "Marker preview requested");

    let handle = state.orchestrator.request(request);

    let (snapshot, error, refreshing) = if body.wait || handle.cached().is_none() {
        let outcome = handle.settle().await;
        (outcome.snapshot, outcome.error, false)
    } else {
        let refreshing = handle.is_refreshing();
        (handle.detach(), None, refreshing)
    };

    let Some(snapshot) = snapshot else {
        return Err(ApiError::BadGateway(
            error.unwrap_or_else(|| "no markers available".to_string()),
        ));
    };

    Ok(Json(PreviewResponse {
        from_cache: snapshot.source == SnapshotSource::Cache,
        items: snapshot.items,
        ratings: snapshot.ratings,
        count: snapshot.count,
        refreshing,
        error,
    }))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// POST /api/markers/count
///
/// Cheap remote total for a rule; the UI passes it back as `expectedCount`.
pub async fn count_markers(
    State(state): State<AppState>,
    Json(body): Json<MarkerRequestBody>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.orchestrator.probe_count(&body.to_request()).await?;
    Ok(Json(CountResponse { count }))
}
