//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// How a playlist's membership is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    /// Membership computed from a rule
    Smart,
    /// Explicit item selection
    Manual,
}

impl PlaylistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistKind::Smart => "smart",
            PlaylistKind::Manual => "manual",
        }
    }
}

impl fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaylistKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(PlaylistKind::Smart),
            "manual" => Ok(PlaylistKind::Manual),
            other => Err(Error::InvalidInput(format!("Unknown playlist kind: {}", other))),
        }
    }
}

/// Stored playlist header
///
/// `rule` holds the smart-playlist rule exactly as the UI submitted it; it is
/// normalised by the matching engine when read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub kind: PlaylistKind,
    pub rule: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlaylist {
    pub name: String,
    pub kind: PlaylistKind,
    #[serde(default)]
    pub rule: Option<serde_json::Value>,
}

/// Canonical, persistence-ready playlist entry
///
/// `screenshot`, `stream` and `preview` are server-relative paths (no scheme
/// or host) so stored items survive a change of the Stash base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: String,
    pub title: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    #[serde(default)]
    pub screenshot: String,
    #[serde(default)]
    pub stream: String,
    #[serde(default)]
    pub preview: String,
    pub scene_id: String,
    #[serde(default)]
    pub item_order: i64,
}

impl PlaylistItem {
    /// Clip length in seconds, when the marker has an end
    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| (end - self.start_time).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_kind_round_trip_through_str() {
        assert_eq!("smart".parse::<PlaylistKind>().unwrap(), PlaylistKind::Smart);
        assert_eq!(PlaylistKind::Manual.to_string(), "manual");
        assert!("dynamic".parse::<PlaylistKind>().is_err());
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let item = PlaylistItem {
            id: "m1".to_string(),
            title: "Intro".to_string(),
            start_time: 12.5,
            end_time: Some(20.0),
            screenshot: "/scene/1/screenshot".to_string(),
            stream: "/scene/1/stream".to_string(),
            preview: String::new(),
            scene_id: "1".to_string(),
            item_order: 0,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["startTime"], 12.5);
        assert_eq!(json["sceneId"], "1");
        assert_eq!(json["itemOrder"], 0);
        assert_eq!(item.duration(), Some(7.5));
    }
}
