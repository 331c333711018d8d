//! Synchronization between TMDB and the local catalog
//!
//! Two modes of ingestion:
//! - `generate`: destructive full regenerate of one platform/kind pair;
//! - `update`: additive pass that only creates titles not yet stored.
//!
//! Fetching is async and paced by the client's request delay; applying the
//! fetched items to the database is synchronous, so web handlers can fetch
//! without holding the connection lock.

use crate::database::{self, Platform, TitleKind};
use crate::error::{CatalogError, Result};
use crate::snapshot;
use crate::tmdb::{discover, genres, GenreEntry, RawTitle, TmdbClient};
use rusqlite::Connection;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::time::sleep;

/// Result of a sync run
#[derive(Debug)]
pub struct SyncOutcome {
    pub snapshot_path: PathBuf,
    /// Titles upserted (generate) or newly created (update)
    pub count: usize,
}

fn provider_id(platform: &Platform) -> Result<i64> {
    platform
        .tmdb_provider_id
        .ok_or_else(|| CatalogError::MissingProviderId(platform.slug.clone()))
}

// ── Genres ──────────────────────────────────────────────────────────────────

/// Apply a fetched genre list, upserting by namespaced slug
pub fn apply_genre_list(conn: &Connection, entries: &[GenreEntry]) -> rusqlite::Result<usize> {
    let mut created = 0;
    for entry in entries {
        if database::upsert_genre(conn, &genres::genre_slug(entry.id), &entry.name)? {
            created += 1;
        }
    }
    Ok(created)
}

/// Fetch the canonical genre lists and upsert them
///
/// Returns the number of newly created genres.
pub async fn sync_genres(conn: &Connection, client: &TmdbClient) -> Result<usize> {
    let entries = genres::fetch_genre_lists(client).await?;
    let created = apply_genre_list(conn, &entries)?;
    log::info!("Synced {} genres ({} new)", entries.len(), created);
    Ok(created)
}

/// Genre sync that degrades to a warning
///
/// A failed genre fetch leaves titles with placeholder genre names, which a
/// later successful sync upgrades in place. Title sync must not fail for it.
async fn best_effort_genre_sync(conn: &Connection, client: &TmdbClient) {
    if let Err(e) = sync_genres(conn, client).await {
        log::warn!("Genre sync failed, continuing with placeholder names: {}", e);
    }
}

// ── Fetching ────────────────────────────────────────────────────────────────

/// Fetch every discover page for a platform/kind pair
///
/// The page count is taken from the first response and never re-read; pages
/// appearing mid-run are picked up by the next sync. Each request after the
/// first is preceded by the client's request delay.
pub async fn fetch_all_pages(
    client: &TmdbClient,
    kind: TitleKind,
    provider_id: i64,
) -> Result<Vec<Value>> {
    let first = discover::fetch_page(client, kind, provider_id, 1).await?;
    let total_pages = first.total_pages;
    let mut items = first.results;

    for page in 2..=total_pages {
        sleep(client.request_delay()).await;
        let next = discover::fetch_page(client, kind, provider_id, page).await?;
        items.extend(next.results);
    }

    log::info!(
        "Fetched {} items over {} pages ({})",
        items.len(),
        total_pages.max(1),
        kind
    );
    Ok(items)
}

/// Fetch the genre lists (best-effort) and every discover page, without
/// touching the database
///
/// Split out for callers that share the connection behind a lock: all the
/// awaiting happens here, applying the results is synchronous.
pub async fn sync_genres_best_effort_then_fetch(
    client: &TmdbClient,
    kind: TitleKind,
    platform: &Platform,
) -> Result<(Option<Vec<GenreEntry>>, Vec<Value>)> {
    let provider = provider_id(platform)?;
    let genre_entries = match genres::fetch_genre_lists(client).await {
        Ok(entries) => Some(entries),
        Err(e) => {
            log::warn!("Genre sync failed, continuing with placeholder names: {}", e);
            None
        }
    };
    let items = fetch_all_pages(client, kind, provider).await?;
    Ok((genre_entries, items))
}

// ── Applying fetched items ──────────────────────────────────────────────────

/// Destructively regenerate one platform/kind pair from fetched items
///
/// The delete runs before (and outside) the upsert transaction, matching the
/// long-standing behavior readers may depend on: between the delete and the
/// commit, listings for this pair are empty rather than stale.
pub fn generate_from_items(
    conn: &mut Connection,
    data_dir: &Path,
    platform: &Platform,
    kind: TitleKind,
    items: &[Value],
) -> Result<PathBuf> {
    let deleted = database::delete_titles(conn, platform.id, kind)?;
    log::info!("Deleted {} existing {} for {}", deleted, kind.plural(), platform.slug);

    let tx = conn.transaction()?;
    for item in items {
        let raw = RawTitle::from_value(item, kind);
        database::upsert_title(&tx, platform.id, &raw, kind)?;
    }
    tx.commit()?;
    log::info!("Stored {} {} for {}", items.len(), kind.plural(), platform.slug);

    snapshot::save(data_dir, &platform.slug, kind, items)
}

/// Additively apply fetched items, creating only titles not yet stored
///
/// Existing titles are matched by TMDB id, falling back to name, and are
/// left untouched. Returns the number of titles created.
pub fn update_from_items(
    conn: &Connection,
    platform: &Platform,
    kind: TitleKind,
    items: &[Value],
) -> Result<usize> {
    let mut created = 0;
    for item in items {
        let raw = RawTitle::from_value(item, kind);
        let existing = match raw.tmdb_id {
            Some(tmdb_id) => database::find_title_by_tmdb_id(conn, platform.id, tmdb_id)?,
            None => database::find_title_by_name(conn, platform.id, &raw.name)?,
        };
        if existing.is_none() {
            database::upsert_title(conn, platform.id, &raw, kind)?;
            created += 1;
        }
    }
    Ok(created)
}

// ── Orchestration ───────────────────────────────────────────────────────────

/// Full regenerate: sync genres, fetch every page, replace stored titles,
/// write the snapshot
pub async fn generate(
    conn: &mut Connection,
    client: &TmdbClient,
    data_dir: &Path,
    platform: &Platform,
    kind: TitleKind,
) -> Result<SyncOutcome> {
    let provider = provider_id(platform)?;
    best_effort_genre_sync(conn, client).await;

    let items = fetch_all_pages(client, kind, provider).await?;
    let snapshot_path = generate_from_items(conn, data_dir, platform, kind, &items)?;
    Ok(SyncOutcome {
        snapshot_path,
        count: items.len(),
    })
}

/// Additive update: fetch every page, create missing titles, write the
/// snapshot from the full fetched payload
pub async fn update(
    conn: &Connection,
    client: &TmdbClient,
    data_dir: &Path,
    platform: &Platform,
    kind: TitleKind,
) -> Result<SyncOutcome> {
    let provider = provider_id(platform)?;
    best_effort_genre_sync(conn, client).await;

    let items = fetch_all_pages(client, kind, provider).await?;
    let created = update_from_items(conn, platform, kind, &items)?;
    log::info!("Created {} new {} for {}", created, kind.plural(), platform.slug);

    let snapshot_path = snapshot::save(data_dir, &platform.slug, kind, &items)?;
    Ok(SyncOutcome {
        snapshot_path,
        count: created,
    })
}

/// Remove all stored titles and the snapshot for a platform/kind pair
///
/// Returns true only when a snapshot file existed before the call; row
/// deletion is logged but does not influence the flag.
pub fn purge(
    conn: &Connection,
    data_dir: &Path,
    platform: &Platform,
    kind: TitleKind,
) -> Result<bool> {
    let deleted = database::delete_titles(conn, platform.id, kind)?;
    let had_snapshot = snapshot::purge(data_dir, &platform.slug, kind)?;
    log::info!("Purged {} {} for {}", deleted, kind.plural(), platform.slug);
    Ok(had_snapshot)
}
