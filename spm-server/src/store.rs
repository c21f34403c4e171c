//! SQLite-backed rating store for the matching engine

use async_trait::async_trait;
use spm_common::db::ratings;
use spm_core::RatingStore;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct SqliteRatingStore {
    pool: SqlitePool,
}

impl SqliteRatingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RatingStore for SqliteRatingStore {
    async fn ids_meeting(
        &self,
        item_ids: &[String],
        min_rating: u8,
    ) -> spm_common::Result<HashSet<String>> {
        ratings::ids_with_min_rating(&self.pool, item_ids, min_rating).await
    }

    async fn ratings_for(&self, item_ids: &[String]) -> spm_common::Result<HashMap<String, u8>> {
        ratings::get_ratings(&self.pool, item_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_common::db::init_memory_database;

    #[tokio::test]
    async fn test_store_reads_persisted_ratings() {
        let pool = init_memory_database().await.unwrap();
        ratings::set_rating(&pool, "m1", 4).await.unwrap();
        ratings::set_rating(&pool, "m2", 2).await.unwrap();
        let store = SqliteRatingStore::new(pool);

        let ids = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        let meeting = store.ids_meeting(&ids, 3).await.unwrap();
        assert_eq!(meeting.len(), 1);
        assert!(meeting.contains("m1"));

        let all = store.ratings_for(&ids).await.unwrap();
        assert_eq!(all.get("m2"), Some(&2));
        assert!(!all.contains_key("m3"));
    }
}
