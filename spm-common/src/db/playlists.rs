//! Playlist and playlist item persistence
//!
//! Items are always replaced wholesale per playlist; there is no partial
//! update path.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::models::{NewPlaylist, Playlist, PlaylistItem};
use crate::{Error, Result};

type PlaylistRow = (String, String, String, Option<String>, DateTime<Utc>, DateTime<Utc>);

type ItemRow = (
    String,
    String,
    f64,
    Option<f64>,
    String,
    String,
    String,
    String,
    i64,
);

fn playlist_from_row(row: PlaylistRow) -> Result<Playlist> {
    let (id, name, kind, rule, created_at, updated_at) = row;
    let rule = match rule {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };

    Ok(Playlist {
        id,
        name,
        kind: kind.parse()?,
        rule,
        created_at,
        updated_at,
    })
}

/// Create a playlist and return the stored header
pub async fn create_playlist(pool: &SqlitePool, new: &NewPlaylist) -> Result<Playlist> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Playlist name must not be empty".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let rule = new.rule.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        "INSERT INTO playlists (id, name, kind, rule, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(new.kind.as_str())
    .bind(&rule)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!(playlist_id = %id, kind = %new.kind, "Created playlist");

    Ok(Playlist {
        id,
        name: name.to_string(),
        kind: new.kind,
        rule: new.rule.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Fetch one playlist header
pub async fn get_playlist(pool: &SqlitePool, id: &str) -> Result<Playlist> {
    let row: Option<PlaylistRow> = sqlx::query_as(
        "SELECT id, name, kind, rule, created_at, updated_at FROM playlists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => playlist_from_row(row),
        None => Err(Error::NotFound(format!("playlist {}", id))),
    }
}

/// List all playlists, most recently updated first
pub async fn list_playlists(pool: &SqlitePool) -> Result<Vec<Playlist>> {
    let rows: Vec<PlaylistRow> = sqlx::query_as(
        "SELECT id, name, kind, rule, created_at, updated_at
         FROM playlists
         ORDER BY updated_at DESC, name ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(playlist_from_row).collect()
}

/// Delete a playlist and its items; returns false when it did not exist
pub async fn delete_playlist(pool: &SqlitePool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_items WHERE playlist_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM playlists WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted > 0)
}

/// Replace every item of a playlist in one transaction
///
/// `item_order` is rewritten from the slice position so stored order always
/// matches the order handed in.
pub async fn replace_items(
    pool: &SqlitePool,
    playlist_id: &str,
    items: &[PlaylistItem],
) -> Result<Vec<PlaylistItem>> {
    // Surface a clean NotFound instead of a foreign key failure
    get_playlist(pool, playlist_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_items WHERE playlist_id = ?")
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    let mut stored = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let mut item = item.clone();
        item.item_order = index as i64;

        sqlx::query(
            "INSERT INTO playlist_items
                (playlist_id, item_order, id, title, start_time, end_time,
                 screenshot, stream, preview, scene_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(item.item_order)
        .bind(&item.id)
        .bind(&item.title)
        .bind(item.start_time)
        .bind(item.end_time)
        .bind(&item.screenshot)
        .bind(&item.stream)
        .bind(&item.preview)
        .bind(&item.scene_id)
        .execute(&mut *tx)
        .await?;

        stored.push(item);
    }

    sqlx::query("UPDATE playlists SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(playlist_id = %playlist_id, items = stored.len(), "Replaced playlist items");
    Ok(stored)
}

/// Items of a playlist in stored order
pub async fn list_items(pool: &SqlitePool, playlist_id: &str) -> Result<Vec<PlaylistItem>> {
    let rows: Vec<ItemRow> = sqlx::query_as(
        "SELECT id, title, start_time, end_time, screenshot, stream, preview, scene_id, item_order
         FROM playlist_items
         WHERE playlist_id = ?
         ORDER BY item_order ASC",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, title, start_time, end_time, screenshot, stream, preview, scene_id, item_order)| {
                PlaylistItem {
                    id,
                    title,
                    start_time,
                    end_time,
                    screenshot,
                    stream,
                    preview,
                    scene_id,
                    item_order,
                }
            },
        )
        .collect())
}
