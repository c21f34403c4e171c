//! Marker to playlist item mapping
//!
//! Produces the persistence-ready [`PlaylistItem`] shape from remote
//! [`MarkerRecord`]s: merged display titles and server-relative media paths.

use spm_common::db::PlaylistItem;

use crate::marker::MarkerRecord;

/// Title used when neither the scene nor the marker has one
pub const FALLBACK_TITLE: &str = "Marker";

/// Separator between scene and marker titles
const TITLE_SEPARATOR: &str = " \u{2013} ";

/// Comparison form of a title: trimmed, single-spaced, lowercase
fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Merge a scene title and a marker title into one display label
///
/// Near-duplicates (equal after normalisation, or one containing the other)
/// collapse to the original whose normalised form is longer, ties going to
/// the scene title. Distinct
/// titles are joined as `"{scene} – {marker}"`.
pub fn merge_titles(scene_title: &str, marker_title: &str) -> String {
    let scene = scene_title.trim();
    let marker = marker_title.trim();
    let scene_norm = normalize_title(scene);
    let marker_norm = normalize_title(marker);

    match (scene_norm.is_empty(), marker_norm.is_empty()) {
        (true, true) => FALLBACK_TITLE.to_string(),
        (false, true) => scene.to_string(),
        (true, false) => marker.to_string(),
        (false, false) => {
            if scene_norm.contains(&marker_norm) || marker_norm.contains(&scene_norm) {
                if marker_norm.chars().count() > scene_norm.chars().count() {
                    marker.to_string()
                } else {
                    scene.to_string()
                }
            } else {
                format!("{}{}{}", scene, TITLE_SEPARATOR, marker)
            }
        }
    }
}

/// Length of a leading `scheme:` (colon included), if the input has one
fn scheme_len(raw: &str) -> Option<usize> {
    let colon = raw.find(':')?;
    let scheme = &raw[..colon];
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(colon + 1)
}

/// Strip scheme and host from an absolute URL, keeping path, query and fragment
///
/// The remainder is sliced from the input verbatim: no dot-segment removal,
/// no re-encoding. Relative paths are returned unchanged (with a leading `/`
/// added when missing); empty input stays empty.
pub fn to_relative_path(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let authority_start = if raw.starts_with("//") {
        Some(2)
    } else {
        match scheme_len(raw) {
            Some(len) if raw[len..].starts_with("//") => Some(len + 2),
            // Opaque URLs (data:, blob:) have no host to strip
            Some(_) => return raw.to_string(),
            None => None,
        }
    };

    let Some(authority_start) = authority_start else {
        return if raw.starts_with('/') {
            raw.to_string()
        } else {
            format!("/{}", raw)
        };
    };

    let after_authority = &raw[authority_start..];
    match after_authority.find(['/', '?', '#']) {
        Some(index) if after_authority[index..].starts_with('/') => {
            after_authority[index..].to_string()
        }
        Some(index) => format!("/{}", &after_authority[index..]),
        None => "/".to_string(),
    }
}

/// Map one marker to a playlist item at position `item_order`
///
/// An end time at or before the start is dropped.
pub fn map_marker_to_item(marker: &MarkerRecord, item_order: usize) -> PlaylistItem {
    PlaylistItem {
        id: marker.id.clone(),
        title: merge_titles(&marker.scene_title, &marker.title),
        start_time: marker.seconds,
        end_time: marker.end_seconds.filter(|end| *end > marker.seconds),
        screenshot: to_relative_path(&marker.screenshot_path),
        stream: to_relative_path(&marker.stream_path),
        preview: to_relative_path(&marker.preview_path),
        scene_id: marker.scene_id.clone(),
        item_order: item_order as i64,
    }
}

/// Map markers to playlist items; output order matches input order
pub fn map_markers_to_items(markers: &[MarkerRecord]) -> Vec<PlaylistItem> {
    markers
        .iter()
        .enumerate()
        .map(|(index, marker)| map_marker_to_item(marker, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(title: &str, scene_title: &str) -> MarkerRecord {
        MarkerRecord {
            id: "m1".to_string(),
            title: title.to_string(),
            seconds: 30.0,
            end_seconds: Some(45.0),
            scene_id: "s1".to_string(),
            scene_title: scene_title.to_string(),
            tags: Vec::new(),
            screenshot_path: "http://stash:9999/scene/1/screenshot?x=1".to_string(),
            stream_path: "https://stash.example.com/scene/1/stream.mp4?apikey=k#t=30".to_string(),
            preview_path: "/scene/1/preview".to_string(),
        }
    }

    #[test]
    fn test_identical_titles_collapse() {
        assert_eq!(merge_titles("Beach Day", "beach   day"), "Beach Day");
    }

    #[test]
    fn test_substring_uses_longer_title() {
        assert_eq!(merge_titles("Beach", "Beach Day Part 2"), "Beach Day Part 2");
        assert_eq!(merge_titles("Beach Day Part 2", "day part"), "Beach Day Part 2");
    }

    #[test]
    fn test_distinct_titles_concatenate_with_en_dash() {
        assert_eq!(merge_titles("Beach Day", "Sunset"), "Beach Day \u{2013} Sunset");
    }

    #[test]
    fn test_single_and_missing_titles() {
        assert_eq!(merge_titles("", "Sunset"), "Sunset");
        assert_eq!(merge_titles("  Beach ", "   "), "Beach");
        assert_eq!(merge_titles("", ""), FALLBACK_TITLE);
    }

    #[test]
    fn test_relative_path_strips_scheme_and_host() {
        assert_eq!(
            to_relative_path("http://host:9999/scene/1/screenshot?x=1"),
            "/scene/1/screenshot?x=1"
        );
        assert_eq!(to_relative_path("//cdn.local/a/b"), "/a/b");
        assert_eq!(to_relative_path("http://host:9999"), "/");
        assert_eq!(to_relative_path("http://host?x=1"), "/?x=1");
    }

    #[test]
    fn test_relative_path_keeps_path_verbatim() {
        assert_eq!(
            to_relative_path("http://h/scene/1/../2/stream"),
            "/scene/1/../2/stream"
        );
        assert_eq!(
            to_relative_path("http://h/scene/my clip.mp4?name=a b"),
            "/scene/my clip.mp4?name=a b"
        );
        assert_eq!(to_relative_path("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_relative_path_keeps_relative_input() {
        assert_eq!(to_relative_path("/scene/1/preview"), "/scene/1/preview");
        assert_eq!(to_relative_path("scene/1/preview"), "/scene/1/preview");
        assert_eq!(to_relative_path(""), "");
    }

    #[test]
    fn test_mapping_is_index_stable_and_deterministic() {
        let markers = vec![marker("Sunset", "Beach Day"), marker("Beach", "Beach")];
        let first = map_markers_to_items(&markers);
        let second = map_markers_to_items(&markers);

        assert_eq!(first, second);
        assert_eq!(first[0].item_order, 0);
        assert_eq!(first[1].item_order, 1);
        assert_eq!(first[0].title, "Beach Day \u{2013} Sunset");
        assert_eq!(first[0].screenshot, "/scene/1/screenshot?x=1");
        assert_eq!(first[0].stream, "/scene/1/stream.mp4?apikey=k#t=30");
        assert_eq!(first[0].end_time, Some(45.0));
    }

    #[test]
    fn test_end_before_start_dropped() {
        let mut m = marker("Sunset", "Beach");
        m.end_seconds = Some(10.0);
        assert_eq!(map_marker_to_item(&m, 0).end_time, None);
    }
}
