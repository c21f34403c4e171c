//! Query selection
//!
//! Maps a canonical [`Rule`] onto one of three remote query shapes. First
//! match wins:
//!
//! | required | optional | strategy       | remote tag filter         |
//! |----------|----------|----------------|---------------------------|
//! | yes      | yes      | `Combined`     | required, AND             |
//! | no       | yes      | `OptionalOnly` | optional, OR              |
//! | yes      | no       | `RequiredOnly` | required, AND             |
//! | no       | no       | `RequiredOnly` | none (performer-only)     |
//!
//! Legacy `tagIds` rules reach this module already normalised to required
//! tags. Under-constrained rules (no actors, no tags) are not errors; the
//! remote API's own empty-filter behaviour applies.

use serde::Serialize;

use crate::cache::tag_fingerprint;
use crate::marker::PageKey;
use crate::rule::Rule;
use crate::stash::{MarkerQuery, TagFilter, TagMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStrategy {
    RequiredOnly,
    OptionalOnly,
    Combined,
}

impl QueryStrategy {
    pub fn tag_mode(&self) -> TagMode {
        match self {
            QueryStrategy::OptionalOnly => TagMode::Or,
            QueryStrategy::RequiredOnly | QueryStrategy::Combined => TagMode::And,
        }
    }
}

/// Everything the orchestrator needs to query and post-filter for one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryVariables {
    pub strategy: QueryStrategy,
    pub actor_ids: Vec<String>,
    /// Sorted, deduplicated ids sent to the remote query
    pub tag_ids_for_query: Vec<String>,
    pub tag_mode: TagMode,
    pub min_rating: Option<u8>,
    /// Optional tags to OR-match client side (empty: no post-filter)
    pub post_filter_tag_ids: Vec<String>,
}

impl QueryVariables {
    /// Cache fingerprint of the tag ids actually queried
    pub fn tag_fingerprint(&self) -> String {
        tag_fingerprint(&self.tag_ids_for_query)
    }

    /// Remote query for these variables
    pub fn to_marker_query(&self, page: Option<PageKey>) -> MarkerQuery {
        MarkerQuery {
            performer_ids: self.actor_ids.clone(),
            tag_filter: TagFilter {
                mode: self.tag_mode,
                tag_ids: self.tag_ids_for_query.clone(),
            },
            page,
        }
    }
}

/// Pick the remote query strategy for a rule
pub fn select_query_strategy(rule: &Rule) -> QueryStrategy {
    let has_required = !rule.required_tag_ids.is_empty();
    let has_optional = !rule.optional_tag_ids.is_empty();

    match (has_required, has_optional) {
        (true, true) => QueryStrategy::Combined,
        (false, true) => QueryStrategy::OptionalOnly,
        _ => QueryStrategy::RequiredOnly,
    }
}

/// Build remote query variables for a rule
pub fn build_query_variables(rule: &Rule) -> QueryVariables {
    let strategy = select_query_strategy(rule);

    let query_tags = match strategy {
        QueryStrategy::OptionalOnly => &rule.optional_tag_ids,
        QueryStrategy::RequiredOnly | QueryStrategy::Combined => &rule.required_tag_ids,
    };

    let mut tag_ids_for_query = query_tags.clone();
    tag_ids_for_query.sort();
    tag_ids_for_query.dedup();

    QueryVariables {
        strategy,
        actor_ids: rule.actor_ids.clone(),
        tag_ids_for_query,
        tag_mode: strategy.tag_mode(),
        min_rating: rule.min_rating,
        post_filter_tag_ids: rule.optional_tag_ids.clone(),
    }
}
