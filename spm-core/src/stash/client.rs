//! Stash GraphQL client

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::wire::{FindSceneMarkersData, GraphQlResponse};
use super::{MarkerPage, MarkerQuery, MarkerQueryService, StashError, TagMode};
use crate::marker::MarkerRecord;

const USER_AGENT: &str = concat!("spm/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const API_KEY_HEADER: &str = "ApiKey";

const FIND_MARKERS_QUERY: &str = r#"
query FindSceneMarkers($filter: FindFilterType, $scene_marker_filter: SceneMarkerFilterType) {
  findSceneMarkers(filter: $filter, scene_marker_filter: $scene_marker_filter) {
    count
    scene_markers {
      id
      title
      seconds
      end_seconds
      scene { id title }
      primary_tag { id name }
      tags { id name }
      screenshot
      stream
      preview
    }
  }
}"#;

const COUNT_MARKERS_QUERY: &str = r#"
query CountSceneMarkers($filter: FindFilterType, $scene_marker_filter: SceneMarkerFilterType) {
  findSceneMarkers(filter: $filter, scene_marker_filter: $scene_marker_filter) {
    count
  }
}"#;

/// Build the GraphQL variables for a marker query
///
/// Empty performer or tag lists are left out of the filter entirely.
pub fn build_variables(query: &MarkerQuery) -> Value {
    let mut marker_filter = serde_json::Map::new();

    if !query.performer_ids.is_empty() {
        marker_filter.insert(
            "performers".to_string(),
            json!({"value": query.performer_ids, "modifier": "INCLUDES"}),
        );
    }

    if !query.tag_filter.tag_ids.is_empty() {
        let modifier = match query.tag_filter.mode {
            TagMode::And => "INCLUDES_ALL",
            TagMode::Or => "INCLUDES",
        };
        marker_filter.insert(
            "tags".to_string(),
            json!({"value": query.tag_filter.tag_ids, "modifier": modifier, "depth": 0}),
        );
    }

    let filter = match query.page {
        Some(page) => json!({"page": page.page, "per_page": page.per_page}),
        None => json!({"per_page": -1}),
    };

    json!({
        "filter": filter,
        "scene_marker_filter": Value::Object(marker_filter),
    })
}

/// Marker catalog client for a Stash server
#[derive(Debug, Clone)]
pub struct StashClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl StashClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, StashError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StashError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<FindSceneMarkersData, StashError> {
        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({"query": query, "variables": variables}));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StashError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StashError::Api(status.as_u16(), error_text));
        }

        let body: GraphQlResponse<FindSceneMarkersData> = response
            .json()
            .await
            .map_err(|e| StashError::Parse(e.to_string()))?;

        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(StashError::GraphQl(messages.join("; ")));
        }

        body.data
            .ok_or_else(|| StashError::Parse("response contained no data".to_string()))
    }
}

#[async_trait]
impl MarkerQueryService for StashClient {
    async fn find_markers(&self, query: &MarkerQuery) -> Result<MarkerPage, StashError> {
        debug!(
            performers = query.performer_ids.len(),
            tags = query.tag_filter.tag_ids.len(),
            mode = ?query.tag_filter.mode,
            page = ?query.page,
            "Querying Stash scene markers"
        );

        let data = self
            .execute(FIND_MARKERS_QUERY, build_variables(query))
            .await?;
        let result = data.find_scene_markers;
        let markers: Vec<MarkerRecord> = result
            .scene_markers
            .into_iter()
            .map(MarkerRecord::from)
            .collect();

        info!(
            count = result.count,
            returned = markers.len(),
            "Stash marker query complete"
        );

        Ok(MarkerPage {
            count: result.count,
            markers,
        })
    }

    async fn count_markers(&self, query: &MarkerQuery) -> Result<u64, StashError> {
        let mut variables = build_variables(query);
        variables["filter"] = json!({"per_page": 0});

        let data = self.execute(COUNT_MARKERS_QUERY, variables).await?;
        Ok(data.find_scene_markers.count)
    }
}
