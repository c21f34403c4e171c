//! End-to-end matching: rule in, filtered playlist items out

use async_trait::async_trait;
use spm_core::filter::filter_by_min_rating;
use spm_core::marker::TagRef;
use spm_core::{
    FileCachePort, MarkerOrchestrator, MarkerPage, MarkerQuery, MarkerQueryService, MarkerRecord,
    MarkerRequest, MatchCache, QueryStrategy, RatingStore, Rule, SnapshotSource, StashError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Stash stand-in applying the AND/OR tag filter to a fixed marker set
struct FixtureCatalog {
    markers: Vec<MarkerRecord>,
    queries: Mutex<Vec<MarkerQuery>>,
}

impl FixtureCatalog {
    fn new(markers: Vec<MarkerRecord>) -> Self {
        Self {
            markers,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MarkerQueryService for FixtureCatalog {
    async fn find_markers(&self, query: &MarkerQuery) -> Result<MarkerPage, StashError> {
        self.queries.lock().unwrap().push(query.clone());
        let wanted = &query.tag_filter.tag_ids;
        let markers: Vec<MarkerRecord> = self
            .markers
            .iter()
            .filter(|m| {
                if wanted.is_empty() {
                    return true;
                }
                let tags: Vec<&str> = m.tag_ids().collect();
                match query.tag_filter.mode {
                    spm_core::stash::TagMode::And => wanted.iter().all(|t| tags.contains(&t.as_str())),
                    spm_core::stash::TagMode::Or => wanted.iter().any(|t| tags.contains(&t.as_str())),
                }
            })
            .cloned()
            .collect();
        Ok(MarkerPage {
            count: markers.len() as u64,
            markers,
        })
    }
}

fn marker(id: &str, tags: &[&str]) -> MarkerRecord {
    MarkerRecord {
        id: id.to_string(),
        title: format!("Marker {}", id),
        seconds: 10.0,
        end_seconds: Some(25.0),
        scene_id: "scene-1".to_string(),
        scene_title: "Scene One".to_string(),
        tags: tags
            .iter()
            .map(|t| TagRef {
                id: t.to_string(),
                name: t.to_lowercase(),
            })
            .collect(),
        screenshot_path: format!("http://stash.local:9999/scene/1/scene_marker/{}/screenshot", id),
        stream_path: format!("http://stash.local:9999/scene/1/scene_marker/{}/stream", id),
        preview_path: String::new(),
    }
}

fn fixture() -> Vec<MarkerRecord> {
    vec![
        marker("m1", &["T1", "T2"]),
        marker("m2", &["T1", "T2"]),
        marker("m3", &["T1"]),
        marker("m4", &["T1", "T3", "T9"]),
    ]
}

fn ratings() -> Arc<HashMap<String, u8>> {
    Arc::new(
        [("m1", 4), ("m2", 2), ("m3", 5), ("m4", 1)]
            .into_iter()
            .map(|(id, r)| (id.to_string(), r))
            .collect(),
    )
}

fn scenario_rule() -> Rule {
    Rule::from_json(&serde_json::json!({
        "actorIds": ["A1"],
        "requiredTagIds": ["T1"],
        "optionalTagIds": ["T2", "T3"],
        "minRating": 3
    }))
    .unwrap()
}

#[tokio::test]
async fn test_filters_compose_in_sequence() {
    let catalog = Arc::new(FixtureCatalog::new(fixture()));
    let store = ratings();
    let orchestrator = MarkerOrchestrator::new(
        catalog.clone(),
        MatchCache::in_memory(),
        Some(store.clone() as Arc<dyn RatingStore>),
    );

    let rule = scenario_rule();
    let request = MarkerRequest::new("A1", rule.clone());
    assert_eq!(request.variables().strategy, QueryStrategy::Combined);

    let outcome = orchestrator.request(request).settle().await;
    assert!(outcome.error.is_none());
    let snapshot = outcome.snapshot.unwrap();

    // Remote AND on T1 returns all four
    assert_eq!(snapshot.count, 4);
    assert_eq!(catalog.queries.lock().unwrap()[0].tag_filter.tag_ids, vec!["T1"]);

    // OR over {T2, T3} drops m3
    let after_or: Vec<&str> = snapshot.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(after_or, vec!["m1", "m2", "m4"]);

    // Rating >= 3 drops m2 and m4; m3 (rated 5) must not come back
    let rated = filter_by_min_rating(snapshot.items.clone(), rule.min_rating, store.as_ref()).await;
    let after_rating: Vec<&str> = rated.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(after_rating, vec!["m1"]);

    assert!(rated.iter().all(|i| i.screenshot.starts_with("/scene/1/")));
    assert_eq!(rated[0].title, "Scene One \u{2013} Marker m1");
    assert_eq!(snapshot.ratings.get("m3"), None);
    assert_eq!(snapshot.ratings.get("m1"), Some(&4));
}

#[tokio::test]
async fn test_revisit_served_from_file_cache() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(FixtureCatalog::new(fixture()));

    let first = MarkerOrchestrator::new(
        catalog.clone(),
        MatchCache::new(Arc::new(FileCachePort::new(dir.path()).unwrap())),
        None,
    );
    first
        .request(MarkerRequest::new("A1", scenario_rule()))
        .settle()
        .await;

    // A new process over the same cache directory
    let second = MarkerOrchestrator::new(
        catalog.clone(),
        MatchCache::new(Arc::new(FileCachePort::new(dir.path()).unwrap())),
        None,
    );
    let handle = second.request(MarkerRequest::new("A1", scenario_rule()).with_expected_count(Some(4)));
    let cached = handle.cached().expect("cached snapshot");
    assert_eq!(cached.source, SnapshotSource::Cache);
    assert_eq!(cached.items.len(), 3);
    assert!(!handle.is_refreshing());
    assert_eq!(catalog.queries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_count_probe_drives_refresh() {
    let catalog = Arc::new(FixtureCatalog::new(fixture()));
    let orchestrator = MarkerOrchestrator::new(catalog.clone(), MatchCache::in_memory(), None);

    let rule = Rule::from_json(&serde_json::json!({"actorIds": ["A1"], "requiredTagIds": ["T1"]})).unwrap();
    orchestrator
        .request(MarkerRequest::new("A1", rule.clone()))
        .settle()
        .await;

    let request = MarkerRequest::new("A1", rule);
    let count = orchestrator.probe_count(&request).await.unwrap();
    assert_eq!(count, 4);

    let handle = orchestrator.request(request.clone().with_expected_count(Some(count)));
    assert!(!handle.is_refreshing());

    let handle = orchestrator.request(request.with_expected_count(Some(count + 1)));
    assert!(handle.cached().is_some());
    assert!(handle.is_refreshing());
    handle.settle().await;
}
