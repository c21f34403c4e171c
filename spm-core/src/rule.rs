//! Smart-playlist rule model
//!
//! Rules arrive from the UI (and from stored playlists) in more than one
//! shape: the legacy form carries a single `tagIds` list, the current form
//! splits tags into `requiredTagIds` (AND) and `optionalTagIds` (OR). Ids may
//! be JSON strings, numbers, or `{id, name}` objects. [`RuleInput`] accepts all
//! of these; [`RuleInput::normalize`] turns it into the canonical [`Rule`] that
//! the rest of the engine works with.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Highest rating a rule can require
pub const MAX_MIN_RATING: u8 = 5;

/// Rule as submitted by a client, before normalisation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    #[serde(default, alias = "performerIds", deserialize_with = "deserialize_id_list")]
    pub actor_ids: Option<Vec<String>>,

    /// Legacy tag list with no AND/OR distinction
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub tag_ids: Option<Vec<String>>,

    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub required_tag_ids: Option<Vec<String>>,

    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub optional_tag_ids: Option<Vec<String>>,

    #[serde(default, deserialize_with = "deserialize_rating")]
    pub min_rating: Option<i64>,
}

/// Canonical matching criteria of a smart playlist
///
/// `required_tag_ids` and `optional_tag_ids` are disjoint and free of
/// duplicates. `min_rating` is either `None` or within 1..=5.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub actor_ids: Vec<String>,
    pub required_tag_ids: Vec<String>,
    pub optional_tag_ids: Vec<String>,
    pub min_rating: Option<u8>,
}

impl RuleInput {
    /// Produce the canonical rule
    ///
    /// - legacy `tagIds` become required tags when neither split list is populated
    /// - a tag present in both lists stays required and is dropped from optional
    /// - ratings below 1 mean "no constraint", ratings above 5 clamp to 5
    pub fn normalize(&self) -> Rule {
        let mut required = dedup_ids(self.required_tag_ids.clone().unwrap_or_default());
        let optional = dedup_ids(self.optional_tag_ids.clone().unwrap_or_default());

        if required.is_empty() && optional.is_empty() {
            if let Some(legacy) = &self.tag_ids {
                required = dedup_ids(legacy.clone());
            }
        }

        let required_set: HashSet<&str> = required.iter().map(String::as_str).collect();
        let (optional, overlapping): (Vec<String>, Vec<String>) = optional
            .into_iter()
            .partition(|id| !required_set.contains(id.as_str()));

        if !overlapping.is_empty() {
            debug!(
                tags = ?overlapping,
                "Tags listed as both required and optional; keeping them required"
            );
        }

        Rule {
            actor_ids: dedup_ids(self.actor_ids.clone().unwrap_or_default()),
            required_tag_ids: required,
            optional_tag_ids: optional,
            min_rating: normalize_rating(self.min_rating),
        }
    }
}

impl From<RuleInput> for Rule {
    fn from(input: RuleInput) -> Self {
        input.normalize()
    }
}

/// Normalise a rule input; the single boundary step before matching
pub fn normalize_rule(input: &RuleInput) -> Rule {
    input.normalize()
}

impl Rule {
    /// Parse and normalise a rule stored as JSON
    pub fn from_json(value: &Value) -> Result<Rule, serde_json::Error> {
        let input = RuleInput::deserialize(value)?;
        Ok(input.normalize())
    }

    /// True when the rule constrains tags at all
    pub fn has_tags(&self) -> bool {
        !self.required_tag_ids.is_empty() || !self.optional_tag_ids.is_empty()
    }

    /// Stable actor component of a cache key
    ///
    /// Sorted so actor selection order does not split the cache; `all` when
    /// the rule names no performer.
    pub fn actor_key(&self) -> String {
        if self.actor_ids.is_empty() {
            return "all".to_string();
        }
        let mut ids = self.actor_ids.clone();
        ids.sort();
        ids.join(",")
    }
}

fn normalize_rating(raw: Option<i64>) -> Option<u8> {
    match raw {
        Some(rating) if rating >= 1 => Some(rating.min(MAX_MIN_RATING as i64) as u8),
        _ => None,
    }
}

fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("id").and_then(id_from_value),
        _ => None,
    }
}

fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw.map(|values| values.iter().filter_map(id_from_value).collect()))
}

fn deserialize_rating<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(value: Value) -> Rule {
        Rule::from_json(&value).unwrap()
    }

    #[test]
    fn test_legacy_tag_ids_become_required() {
        let r = rule(json!({"actorIds": ["a1"], "tagIds": ["t1", "t2"]}));
        assert_eq!(r.required_tag_ids, vec!["t1", "t2"]);
        assert!(r.optional_tag_ids.is_empty());
    }

    #[test]
    fn test_legacy_tag_ids_ignored_when_split_lists_present() {
        let r = rule(json!({"tagIds": ["legacy"], "optionalTagIds": ["t2"]}));
        assert!(r.required_tag_ids.is_empty());
        assert_eq!(r.optional_tag_ids, vec!["t2"]);
    }

    #[test]
    fn test_numeric_and_object_ids_normalised_to_strings() {
        let r = rule(json!({
            "performerIds": [12, "13"],
            "requiredTagIds": [{"id": 7, "name": "Outdoor"}, " 8 "]
        }));
        assert_eq!(r.actor_ids, vec!["12", "13"]);
        assert_eq!(r.required_tag_ids, vec!["7", "8"]);
    }

    #[test]
    fn test_overlap_keeps_required() {
        let r = rule(json!({"requiredTagIds": ["t1", "t2"], "optionalTagIds": ["t2", "t3"]}));
        assert_eq!(r.required_tag_ids, vec!["t1", "t2"]);
        assert_eq!(r.optional_tag_ids, vec!["t3"]);
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let r = rule(json!({"requiredTagIds": ["b", "a", "b"]}));
        assert_eq!(r.required_tag_ids, vec!["b", "a"]);
    }

    #[test]
    fn test_min_rating_normalisation() {
        assert_eq!(rule(json!({"minRating": 3})).min_rating, Some(3));
        assert_eq!(rule(json!({"minRating": 0})).min_rating, None);
        assert_eq!(rule(json!({"minRating": -2})).min_rating, None);
        assert_eq!(rule(json!({"minRating": 9})).min_rating, Some(5));
        assert_eq!(rule(json!({"minRating": "4"})).min_rating, Some(4));
        assert_eq!(rule(json!({"minRating": null})).min_rating, None);
    }

    #[test]
    fn test_empty_input() {
        let r = rule(json!({}));
        assert_eq!(r, Rule::default());
        assert!(!r.has_tags());
        assert_eq!(r.actor_key(), "all");
    }

    #[test]
    fn test_actor_key_is_order_independent() {
        let a = rule(json!({"actorIds": ["p2", "p1"]}));
        let b = rule(json!({"actorIds": ["p1", "p2"]}));
        assert_eq!(a.actor_key(), b.actor_key());
        assert_eq!(a.actor_key(), "p1,p2");
    }
}
