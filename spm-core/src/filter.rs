//! Client-side post-filters
//!
//! Logic the remote catalog cannot express: OR matching over a rule's
//! optional tags when the server was asked for the required tags, and
//! minimum-rating filtering against locally persisted ratings.

use async_trait::async_trait;
use spm_common::db::PlaylistItem;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::marker::MarkerRecord;

/// Persisted per-item ratings
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Subset of `item_ids` rated at least `min_rating`
    async fn ids_meeting(
        &self,
        item_ids: &[String],
        min_rating: u8,
    ) -> spm_common::Result<HashSet<String>>;

    /// Stored ratings for `item_ids`; unrated ids are absent
    async fn ratings_for(&self, item_ids: &[String]) -> spm_common::Result<HashMap<String, u8>>;
}

/// In-memory ratings, keyed by item id
#[async_trait]
impl RatingStore for HashMap<String, u8> {
    async fn ids_meeting(
        &self,
        item_ids: &[String],
        min_rating: u8,
    ) -> spm_common::Result<HashSet<String>> {
        Ok(item_ids
            .iter()
            .filter(|id| self.get(id.as_str()).is_some_and(|r| *r >= min_rating))
            .cloned()
            .collect())
    }

    async fn ratings_for(&self, item_ids: &[String]) -> spm_common::Result<HashMap<String, u8>> {
        Ok(item_ids
            .iter()
            .filter_map(|id| self.get(id.as_str()).map(|r| (id.clone(), *r)))
            .collect())
    }
}

/// Keep markers carrying at least one of `optional_tag_ids`
///
/// Empty `optional_tag_ids` means any tag qualifies and the input is returned
/// unchanged. Ids compare as strings.
pub fn filter_by_optional_tags(
    markers: Vec<MarkerRecord>,
    optional_tag_ids: &[String],
) -> Vec<MarkerRecord> {
    if optional_tag_ids.is_empty() {
        return markers;
    }

    let wanted: HashSet<&str> = optional_tag_ids.iter().map(String::as_str).collect();
    markers
        .into_iter()
        .filter(|marker| marker.tag_ids().any(|id| wanted.contains(id)))
        .collect()
}

/// Keep items whose persisted rating is at least `min_rating`
///
/// `None` or `0` returns the input unchanged. Unrated items are excluded.
/// The lookup is a join on persisted item id. When the rating store fails,
/// the unfiltered items are returned: an over-inclusive playlist beats an
/// empty one.
pub async fn filter_by_min_rating(
    items: Vec<PlaylistItem>,
    min_rating: Option<u8>,
    store: &dyn RatingStore,
) -> Vec<PlaylistItem> {
    let min_rating = match min_rating {
        Some(rating) if rating >= 1 => rating,
        _ => return items,
    };

    let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
    match store.ids_meeting(&ids, min_rating).await {
        Ok(matching) => items
            .into_iter()
            .filter(|item| matching.contains(&item.id))
            .collect(),
        Err(e) => {
            warn!(
                error = %e,
                min_rating,
                items = ids.len(),
                "Rating lookup failed, returning items unfiltered"
            );
            items
        }
    }
}
