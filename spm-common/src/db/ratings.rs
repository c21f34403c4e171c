//! Per-item ratings
//!
//! Ratings are keyed by persisted playlist item id and range 1..=5.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};

use crate::{Error, Result};

/// Lowest accepted rating
pub const MIN_RATING: u8 = 1;
/// Highest accepted rating
pub const MAX_RATING: u8 = 5;

/// Bound parameters per IN (...) query
const ID_CHUNK: usize = 500;

/// Store (or overwrite) the rating of one item
pub async fn set_rating(pool: &SqlitePool, item_id: &str, rating: u8) -> Result<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(Error::InvalidInput(format!(
            "Rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )));
    }

    sqlx::query(
        "INSERT INTO item_ratings (item_id, rating, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(item_id) DO UPDATE SET rating = excluded.rating, updated_at = excluded.updated_at",
    )
    .bind(item_id)
    .bind(rating as i64)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove the rating of one item; returns false when it had none
pub async fn clear_rating(pool: &SqlitePool, item_id: &str) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM item_ratings WHERE item_id = ?")
        .bind(item_id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(removed > 0)
}

/// Ratings for the given ids; unrated ids are absent from the map
pub async fn get_ratings(pool: &SqlitePool, item_ids: &[String]) -> Result<HashMap<String, u8>> {
    let mut ratings = HashMap::new();

    for chunk in item_ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT item_id, rating FROM item_ratings WHERE item_id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String, i64)> = builder.build_query_as().fetch_all(pool).await?;
        for (item_id, rating) in rows {
            ratings.insert(item_id, rating.clamp(MIN_RATING as i64, MAX_RATING as i64) as u8);
        }
    }

    Ok(ratings)
}

/// Subset of `item_ids` whose stored rating is at least `min_rating`
pub async fn ids_with_min_rating(
    pool: &SqlitePool,
    item_ids: &[String],
    min_rating: u8,
) -> Result<HashSet<String>> {
    let mut matching = HashSet::new();

    for chunk in item_ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT item_id FROM item_ratings WHERE rating >= ");
        builder.push_bind(min_rating as i64);
        builder.push(" AND item_id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String,)> = builder.build_query_as().fetch_all(pool).await?;
        matching.extend(rows.into_iter().map(|(id,)| id));
    }

    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_and_get_ratings() {
        let pool = init_memory_database().await.unwrap();
        set_rating(&pool, "m1", 4).await.unwrap();
        set_rating(&pool, "m2", 2).await.unwrap();
        set_rating(&pool, "m1", 5).await.unwrap();

        let ratings = get_ratings(&pool, &ids(&["m1", "m2", "m3"])).await.unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings["m1"], 5);
        assert_eq!(ratings["m2"], 2);
    }

    #[tokio::test]
    async fn test_out_of_range_rating_rejected() {
        let pool = init_memory_database().await.unwrap();
        assert!(matches!(set_rating(&pool, "m1", 0).await, Err(Error::InvalidInput(_))));
        assert!(matches!(set_rating(&pool, "m1", 6).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_ids_with_min_rating_excludes_unrated() {
        let pool = init_memory_database().await.unwrap();
        set_rating(&pool, "m1", 4).await.unwrap();
        set_rating(&pool, "m2", 2).await.unwrap();
        set_rating(&pool, "m3", 3).await.unwrap();

        let matching = ids_with_min_rating(&pool, &ids(&["m1", "m2", "m3", "m4"]), 3)
            .await
            .unwrap();
        let expected: HashSet<String> = ["m1", "m3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(matching, expected);
    }

    #[tokio::test]
    async fn test_empty_id_list_yields_empty_results() {
        let pool = init_memory_database().await.unwrap();
        assert!(get_ratings(&pool, &[]).await.unwrap().is_empty());
        assert!(ids_with_min_rating(&pool, &[], 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_rating() {
        let pool = init_memory_database().await.unwrap();
        set_rating(&pool, "m1", 4).await.unwrap();
        assert!(clear_rating(&pool, "m1").await.unwrap());
        assert!(!clear_rating(&pool, "m1").await.unwrap());
        assert!(get_ratings(&pool, &ids(&["m1"])).await.unwrap().is_empty());
    }
}
