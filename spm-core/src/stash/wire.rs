//! GraphQL response shapes returned by Stash

use serde::Deserialize;

use crate::marker::{MarkerRecord, TagRef};

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FindSceneMarkersData {
    pub find_scene_markers: FindSceneMarkersResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FindSceneMarkersResult {
    pub count: u64,
    #[serde(default)]
    pub scene_markers: Vec<WireMarker>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTag {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireScene {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMarker {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub seconds: f64,
    #[serde(default)]
    pub end_seconds: Option<f64>,
    pub scene: WireScene,
    #[serde(default)]
    pub primary_tag: Option<WireTag>,
    #[serde(default)]
    pub tags: Vec<WireTag>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

impl From<WireTag> for TagRef {
    fn from(tag: WireTag) -> Self {
        TagRef {
            id: tag.id,
            name: tag.name.unwrap_or_default(),
        }
    }
}

impl From<WireMarker> for MarkerRecord {
    /// Primary tag first, then the remaining tags without repeats
    fn from(wire: WireMarker) -> Self {
        let mut tags: Vec<TagRef> = Vec::with_capacity(wire.tags.len() + 1);
        for tag in wire.primary_tag.into_iter().chain(wire.tags) {
            if !tags.iter().any(|existing| existing.id == tag.id) {
                tags.push(tag.into());
            }
        }

        MarkerRecord {
            id: wire.id,
            title: wire.title.unwrap_or_default(),
            seconds: wire.seconds,
            end_seconds: wire.end_seconds,
            scene_id: wire.scene.id,
            scene_title: wire.scene.title.unwrap_or_default(),
            tags,
            screenshot_path: wire.screenshot.unwrap_or_default(),
            stream_path: wire.stream.unwrap_or_default(),
            preview_path: wire.preview.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marker_conversion_folds_primary_tag() {
        let wire: WireMarker = serde_json::from_value(json!({
            "id": "42",
            "title": "Sunset",
            "seconds": 12.5,
            "end_seconds": null,
            "scene": {"id": "7", "title": null},
            "primary_tag": {"id": "t1", "name": "Outdoor"},
            "tags": [{"id": "t2", "name": "Beach"}, {"id": "t1", "name": "Outdoor"}],
            "screenshot": "http://stash:9999/scene/7/scene_marker/42/screenshot",
            "stream": null
        }))
        .unwrap();

        let marker = MarkerRecord::from(wire);
        assert_eq!(marker.tag_ids().collect::<Vec<_>>(), vec!["t1", "t2"]);
        assert_eq!(marker.scene_title, "");
        assert_eq!(marker.stream_path, "");
        assert_eq!(marker.end_seconds, None);
    }

    #[test]
    fn test_response_with_errors() {
        let response: GraphQlResponse<FindSceneMarkersData> = serde_json::from_value(json!({
            "data": null,
            "errors": [{"message": "unknown field"}]
        }))
        .unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.errors[0].message, "unknown field");
    }
}
