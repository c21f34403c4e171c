//! Cache-aware fetch orchestration
//!
//! One [`MarkerOrchestrator::request`] call runs the per-request state
//! machine:
//!
//! ```text
//! Idle -> CheckingCache -> ServingCached -> Done
//!                       -> ServingCached -> FetchingBackground -> Done
//!                       -> Fetching -> Done
//! ```
//!
//! The cache check is synchronous, so cached data is in the returned
//! [`RequestHandle`] before any network work starts. A refresh runs as a
//! spawned task that writes its result under the key captured at request
//! time. Each write replaces the whole entry, so the cache always holds the
//! result of the fetch that completed last.

use serde::Serialize;
use spm_common::db::PlaylistItem;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::MatchCache;
use crate::filter::{filter_by_optional_tags, RatingStore};
use crate::mapper::map_markers_to_items;
use crate::marker::{MarkerRecord, PageKey};
use crate::rule::Rule;
use crate::selector::{build_query_variables, QueryVariables};
use crate::stash::{MarkerQueryService, StashError};

/// One logical marker request: an actor and a rule, optionally paged
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRequest {
    /// Actor component of the cache key
    pub actor_id: String,
    pub rule: Rule,
    /// Latest known remote total, used as the cache staleness tripwire
    pub expected_count: Option<u64>,
    pub page: Option<PageKey>,
}

impl MarkerRequest {
    /// Request markers for `actor_id` under `rule`
    ///
    /// A rule naming no performers is narrowed to `actor_id`.
    pub fn new(actor_id: impl Into<String>, mut rule: Rule) -> Self {
        let actor_id = actor_id.into();
        if rule.actor_ids.is_empty() && !actor_id.is_empty() && actor_id != "all" {
            rule.actor_ids.push(actor_id.clone());
        }
        Self {
            actor_id,
            rule,
            expected_count: None,
            page: None,
        }
    }

    /// Request keyed by the rule's own performers
    pub fn for_rule(rule: Rule) -> Self {
        Self {
            actor_id: rule.actor_key(),
            rule,
            expected_count: None,
            page: None,
        }
    }

    pub fn with_expected_count(mut self, count: Option<u64>) -> Self {
        self.expected_count = count;
        self
    }

    pub fn with_page(mut self, page: Option<PageKey>) -> Self {
        self.page = page;
        self
    }

    pub fn variables(&self) -> QueryVariables {
        build_query_variables(&self.rule)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Cache,
    Remote,
}

/// Rule-filtered view of one query result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    /// Markers after the optional-tag filter
    pub markers: Vec<MarkerRecord>,
    pub items: Vec<PlaylistItem>,
    /// Known ratings for `markers`
    pub ratings: HashMap<String, u8>,
    /// Remote total for the queried tags, before client-side filtering
    pub count: u64,
    pub source: SnapshotSource,
}

impl MatchSnapshot {
    fn build(
        raw: Vec<MarkerRecord>,
        mut ratings: HashMap<String, u8>,
        count: u64,
        vars: &QueryVariables,
        source: SnapshotSource,
    ) -> Self {
        let markers = filter_by_optional_tags(raw, &vars.post_filter_tag_ids);
        ratings.retain(|id, _| markers.iter().any(|m| &m.id == id));
        let items = map_markers_to_items(&markers);
        Self {
            markers,
            items,
            ratings,
            count,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    CheckingCache,
    ServingCached,
    Fetching,
    FetchingBackground,
    Done { error: Option<String> },
}

impl RequestState {
    pub fn is_done(&self) -> bool {
        matches!(self, RequestState::Done { .. })
    }
}

/// Final result of a request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// Fresh data on success; otherwise whatever the cache served, if anything
    pub snapshot: Option<MatchSnapshot>,
    pub error: Option<String>,
}

/// Caller's view of an in-progress request
pub struct RequestHandle {
    cached: Option<MatchSnapshot>,
    state: watch::Receiver<RequestState>,
    task: Option<JoinHandle<Result<MatchSnapshot, StashError>>>,
}

impl RequestHandle {
    /// Data served from the cache, available immediately
    pub fn cached(&self) -> Option<&MatchSnapshot> {
        self.cached.as_ref()
    }

    pub fn state(&self) -> RequestState {
        self.state.borrow().clone()
    }

    /// True while a remote fetch for this request is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.task.is_some() && !self.state.borrow().is_done()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.clone()
    }

    /// Stop waiting; an outstanding fetch still completes and updates the cache
    pub fn detach(self) -> Option<MatchSnapshot> {
        self.cached
    }

    /// Wait for any outstanding fetch and return the final result
    pub async fn settle(self) -> RequestOutcome {
        let Some(task) = self.task else {
            return RequestOutcome {
                snapshot: self.cached,
                error: None,
            };
        };

        match task.await {
            Ok(Ok(snapshot)) => RequestOutcome {
                snapshot: Some(snapshot),
                error: None,
            },
            Ok(Err(e)) => RequestOutcome {
                snapshot: self.cached,
                error: Some(e.to_string()),
            },
            Err(e) => RequestOutcome {
                snapshot: self.cached,
                error: Some(format!("fetch task failed: {}", e)),
            },
        }
    }
}

struct Inner {
    service: Arc<dyn MarkerQueryService>,
    cache: MatchCache,
    ratings: Option<Arc<dyn RatingStore>>,
}

/// Serves marker requests from the match cache and the remote catalog
#[derive(Clone)]
pub struct MarkerOrchestrator {
    inner: Arc<Inner>,
}

impl MarkerOrchestrator {
    pub fn new(
        service: Arc<dyn MarkerQueryService>,
        cache: MatchCache,
        ratings: Option<Arc<dyn RatingStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                cache,
                ratings,
            }),
        }
    }

    pub fn cache(&self) -> &MatchCache {
        &self.inner.cache
    }

    /// Start a request: consult the cache now, fetch in the background if needed
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self, request: MarkerRequest) -> RequestHandle {
        let (state_tx, state_rx) = watch::channel(RequestState::Idle);
        state_tx.send_replace(RequestState::CheckingCache);

        let vars = request.variables();
        let lookup = self.inner.cache.get(
            &request.actor_id,
            &vars.tag_ids_for_query,
            request.expected_count,
            request.page,
        );

        let cached = match lookup.data {
            Some(data) if lookup.is_from_cache => {
                state_tx.send_replace(RequestState::ServingCached);
                let count = lookup.count.unwrap_or(data.len() as u64);
                Some(MatchSnapshot::build(
                    data,
                    lookup.ratings,
                    count,
                    &vars,
                    SnapshotSource::Cache,
                ))
            }
            _ => None,
        };

        if !lookup.should_refresh {
            state_tx.send_replace(RequestState::Done { error: None });
            return RequestHandle {
                cached,
                state: state_rx,
                task: None,
            };
        }

        state_tx.send_replace(if cached.is_some() {
            RequestState::FetchingBackground
        } else {
            RequestState::Fetching
        });

        debug!(
            actor = %request.actor_id,
            fingerprint = %vars.tag_fingerprint(),
            strategy = ?vars.strategy,
            background = cached.is_some(),
            "Fetching markers"
        );

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.fetch(&request.actor_id, &vars, request.page).await;
            state_tx.send_replace(RequestState::Done {
                error: result.as_ref().err().map(|e| e.to_string()),
            });
            result
        });

        RequestHandle {
            cached,
            state: state_rx,
            task: Some(task),
        }
    }

    /// Fetch from the remote catalog without reading the cache
    ///
    /// The result still replaces the cache entry for the request's key.
    pub async fn fetch_fresh(&self, request: MarkerRequest) -> RequestOutcome {
        let vars = request.variables();
        match self
            .inner
            .fetch(&request.actor_id, &vars, request.page)
            .await
        {
            Ok(snapshot) => RequestOutcome {
                snapshot: Some(snapshot),
                error: None,
            },
            Err(e) => RequestOutcome {
                snapshot: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Remote total for the request's query, for use as `expected_count`
    pub async fn probe_count(&self, request: &MarkerRequest) -> Result<u64, StashError> {
        let query = request.variables().to_marker_query(request.page);
        self.inner.service.count_markers(&query).await
    }
}

impl Inner {
    async fn fetch(
        &self,
        actor_id: &str,
        vars: &QueryVariables,
        page: Option<PageKey>,
    ) -> Result<MatchSnapshot, StashError> {
        let query = vars.to_marker_query(page);
        let result = match self.service.find_markers(&query).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    actor = %actor_id,
                    fingerprint = %vars.tag_fingerprint(),
                    error = %e,
                    "Marker fetch failed, keeping cached data"
                );
                return Err(e);
            }
        };

        let ratings = self.lookup_ratings(&result.markers).await;

        self.cache.set(
            actor_id,
            &vars.tag_ids_for_query,
            result.count,
            result.markers.clone(),
            ratings.clone(),
            page,
        );

        let snapshot = MatchSnapshot::build(
            result.markers,
            ratings,
            result.count,
            vars,
            SnapshotSource::Remote,
        );

        info!(
            actor = %actor_id,
            count = result.count,
            matched = snapshot.markers.len(),
            "Marker fetch complete"
        );

        Ok(snapshot)
    }

    /// Ratings are decoration; a lookup failure yields none
    async fn lookup_ratings(&self, markers: &[MarkerRecord]) -> HashMap<String, u8> {
        let Some(store) = &self.ratings else {
            return HashMap::new();
        };

        let ids: Vec<String> = markers.iter().map(|m| m.id.clone()).collect();
        match store.ratings_for(&ids).await {
            Ok(ratings) => ratings,
            Err(e) => {
                warn!(error = %e, "Rating lookup failed, caching markers without ratings");
                HashMap::new()
            }
        }
    }
}
