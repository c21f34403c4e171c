//! # SPM Core
//!
//! Smart-playlist matching engine for the Stash playlist manager:
//! - Rule normalisation and remote query selection
//! - Client-side post-filters the remote API cannot express (OR tags, ratings)
//! - Marker to playlist item mapping
//! - Local match cache with expiry and count-based change detection
//! - Cache-aware fetch orchestration
//! - Stash GraphQL client
//! - Timeline lane assignment and drag geometry

pub mod cache;
pub mod filter;
pub mod mapper;
pub mod marker;
pub mod orchestrator;
pub mod rule;
pub mod selector;
pub mod stash;
pub mod timeline;

pub use cache::{CacheLookup, CachePort, FileCachePort, MatchCache, MemoryCachePort};
pub use filter::RatingStore;
pub use marker::{MarkerRecord, PageKey, TagRef};
pub use orchestrator::{
    MarkerOrchestrator, MarkerRequest, MatchSnapshot, RequestHandle, RequestOutcome, RequestState,
    SnapshotSource,
};
pub use rule::{Rule, RuleInput};
pub use selector::{build_query_variables, select_query_strategy, QueryStrategy, QueryVariables};
pub use stash::{MarkerPage, MarkerQuery, MarkerQueryService, StashClient, StashError};
