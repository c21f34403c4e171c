//! Remote marker query service
//!
//! The matching engine talks to the marker catalog only through
//! [`MarkerQueryService`]. [`StashClient`] is the production implementation
//! over Stash's GraphQL API; tests substitute in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::marker::{MarkerRecord, PageKey};

mod client;
mod wire;

pub use client::StashClient;

/// Remote query errors
#[derive(Debug, Clone, Error)]
pub enum StashError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Boolean semantics of a tag filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagMode {
    /// Marker must carry every tag
    And,
    /// Marker must carry at least one tag
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagFilter {
    pub mode: TagMode,
    pub tag_ids: Vec<String>,
}

/// Query sent to the marker catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerQuery {
    pub performer_ids: Vec<String>,
    pub tag_filter: TagFilter,
    /// `None` fetches every match in one page
    pub page: Option<PageKey>,
}

/// Query result: total match count plus the markers of the requested page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerPage {
    pub count: u64,
    pub markers: Vec<MarkerRecord>,
}

/// Capability set of the remote marker catalog
#[async_trait]
pub trait MarkerQueryService: Send + Sync {
    /// Fetch markers matching `query`
    async fn find_markers(&self, query: &MarkerQuery) -> Result<MarkerPage, StashError>;

    /// Total number of markers matching `query`
    ///
    /// Implementations should override this with a cheaper count-only query.
    async fn count_markers(&self, query: &MarkerQuery) -> Result<u64, StashError> {
        Ok(self.find_markers(query).await?.count)
    }
}
