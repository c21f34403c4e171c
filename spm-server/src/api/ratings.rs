//! Item rating endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use spm_common::db::ratings::{self, MAX_RATING, MIN_RATING};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    /// `null` clears the rating
    pub rating: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    pub item_id: String,
    pub rating: Option<u8>,
}

/// PUT /api/items/:id/rating
pub async fn set_item_rating(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(body): Json<RatingRequest>,
) -> ApiResult<Json<RatingResponse>> {
    let rating = match body.rating {
        None => {
            ratings::clear_rating(&state.db, &item_id).await?;
            None
        }
        Some(value) => {
            let rating = u8::try_from(value)
                .ok()
                .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
                .ok_or_else(|| {
                    ApiError::BadRequest(format!(
                        "Rating must be between {} and {}, got {}",
                        MIN_RATING, MAX_RATING, value
                    ))
                })?;
            ratings::set_rating(&state.db, &item_id, rating).await?;
            Some(rating)
        }
    };

    debug!(item = %item_id, rating = ?rating, "Item rating updated");
    Ok(Json(RatingResponse { item_id, rating }))
}
