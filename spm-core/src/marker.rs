//! Remote marker records as the matching engine sees them

use serde::{Deserialize, Serialize};

/// Tag reference attached to a marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A tagged time range within a scene, as returned by the remote catalog
///
/// Produced fresh on every fetch and replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Start offset in seconds
    pub seconds: f64,
    /// End offset in seconds, when the marker is a range
    #[serde(default)]
    pub end_seconds: Option<f64>,
    pub scene_id: String,
    #[serde(default)]
    pub scene_title: String,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub screenshot_path: String,
    #[serde(default)]
    pub stream_path: String,
    #[serde(default)]
    pub preview_path: String,
}

impl MarkerRecord {
    /// Ids of every tag on the marker
    pub fn tag_ids(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.id.as_str())
    }
}

/// One page of a paginated remote query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageKey {
    /// 1-indexed page number
    pub page: u32,
    pub per_page: u32,
}

impl PageKey {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }
}
