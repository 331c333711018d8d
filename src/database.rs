//! Database operations for the catalog
//!
//! Uses parameterized queries exclusively (no SQL string interpolation of
//! user input). Bulk writes during a full regenerate are transactional.

use crate::tmdb::discover::RawTitle;
use crate::tmdb::genres::{genre_slug, placeholder_genre_name};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// Page sizes accepted by the title listing; anything else is coerced to 25
pub const PAGE_SIZES: [u32; 3] = [25, 50, 100];

/// The two kinds of catalog title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKind {
    Movie,
    Series,
}

impl TitleKind {
    /// Value stored in the `titles.kind` column
    pub fn as_str(self) -> &'static str {
        match self {
            TitleKind::Movie => "movie",
            TitleKind::Series => "series",
        }
    }

    /// Plural label used in snapshot file names and CLI arguments
    pub fn plural(self) -> &'static str {
        match self {
            TitleKind::Movie => "movies",
            TitleKind::Series => "series",
        }
    }
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" | "movies" => Ok(TitleKind::Movie),
            "series" | "tv" => Ok(TitleKind::Series),
            other => Err(format!("unknown title kind '{}'", other)),
        }
    }
}

/// A streaming platform
#[derive(Debug, Clone, Serialize)]
pub struct Platform {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub image_url: String,
    pub tmdb_provider_id: Option<i64>,
}

/// A genre, either human-curated or synced from TMDB (`tmdb-<id>` slug)
#[derive(Debug, Clone, Serialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A stored catalog title
#[derive(Debug, Clone, Serialize)]
pub struct TitleRow {
    pub id: i64,
    pub platform_id: i64,
    pub title: String,
    pub slug: String,
    pub kind: String,
    pub popularity: i64,
    pub description: String,
    pub poster_url: String,
    pub regions: String,
    pub tmdb_id: Option<i64>,
}

impl TitleRow {
    /// True when the comma-separated region list contains AR
    pub fn available_in_argentina(&self) -> bool {
        self.regions
            .split(',')
            .any(|r| r.trim().eq_ignore_ascii_case("AR"))
    }
}

/// Derive a URL-safe slug from a display name
///
/// Lowercases, folds common Spanish accents to ASCII, and collapses any run
/// of other characters into a single hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.to_lowercase().chars() {
        let folded = match c {
            'á' | 'à' | 'ä' | 'â' => Some('a'),
            'é' | 'è' | 'ë' | 'ê' => Some('e'),
            'í' | 'ì' | 'ï' | 'î' => Some('i'),
            'ó' | 'ò' | 'ö' | 'ô' => Some('o'),
            'ú' | 'ù' | 'ü' | 'û' => Some('u'),
            'ñ' => Some('n'),
            c if c.is_ascii_alphanumeric() => Some(c),
            _ => None,
        };
        match folded {
            Some(c) => {
                if pending_sep && !slug.is_empty() {
                    slug.push('-');
                }
                pending_sep = false;
                slug.push(c);
            }
            None => pending_sep = true,
        }
    }
    slug
}

/// Initialize the database schema
///
/// `(platform_id, tmdb_id)` is unique when `tmdb_id` is set; it is the
/// idempotency key for sync. `title_genres` is recomputed wholesale on every
/// upsert.
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS platforms (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            image_url TEXT NOT NULL DEFAULT '',
            tmdb_provider_id INTEGER
        );

        CREATE TABLE IF NOT EXISTS genres (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS titles (
            id INTEGER PRIMARY KEY,
            platform_id INTEGER NOT NULL REFERENCES platforms(id),
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('movie', 'series')),
            popularity INTEGER NOT NULL DEFAULT 0,
            description TEXT NOT NULL DEFAULT '',
            poster_url TEXT NOT NULL DEFAULT '',
            regions TEXT NOT NULL DEFAULT 'AR',
            tmdb_id INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (platform_id, tmdb_id)
        );

        CREATE INDEX IF NOT EXISTS idx_titles_platform_kind ON titles(platform_id, kind);
        CREATE INDEX IF NOT EXISTS idx_titles_popularity ON titles(popularity);

        CREATE TABLE IF NOT EXISTS title_genres (
            title_id INTEGER NOT NULL REFERENCES titles(id),
            genre_id INTEGER NOT NULL REFERENCES genres(id),
            PRIMARY KEY (title_id, genre_id)
        );
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

// ── Platforms ───────────────────────────────────────────────────────────────

/// Insert a platform, deriving the slug from the name when not given
pub fn insert_platform(
    conn: &Connection,
    name: &str,
    slug: Option<&str>,
    image_url: &str,
    tmdb_provider_id: Option<i64>,
) -> DbResult<i64> {
    let slug = match slug {
        Some(s) => s.to_string(),
        None => slugify(name),
    };
    conn.execute(
        "INSERT INTO platforms (name, slug, image_url, tmdb_provider_id) VALUES (?1, ?2, ?3, ?4)",
        params![name, slug, image_url, tmdb_provider_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_platform_by_slug(conn: &Connection, slug: &str) -> DbResult<Option<Platform>> {
    conn.query_row(
        "SELECT id, name, slug, image_url, tmdb_provider_id FROM platforms WHERE slug = ?1",
        params![slug],
        row_to_platform,
    )
    .optional()
}

pub fn list_platforms(conn: &Connection) -> DbResult<Vec<Platform>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, image_url, tmdb_provider_id FROM platforms ORDER BY name",
    )?;
    let platforms = stmt.query_map([], row_to_platform)?.collect();
    platforms
}

fn row_to_platform(row: &Row<'_>) -> rusqlite::Result<Platform> {
    Ok(Platform {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        image_url: row.get(3)?,
        tmdb_provider_id: row.get(4)?,
    })
}

// ── Genres ──────────────────────────────────────────────────────────────────

/// Upsert a genre by slug, updating the display name and preserving the slug
///
/// Returns true when a new row was created.
pub fn upsert_genre(conn: &Connection, slug: &str, name: &str) -> DbResult<bool> {
    let updated = conn.execute(
        "UPDATE genres SET name = ?1 WHERE slug = ?2",
        params![name, slug],
    )?;
    if updated > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO genres (name, slug) VALUES (?1, ?2)",
        params![name, slug],
    )?;
    Ok(true)
}

/// Look up a genre by slug, creating it with the given name when absent
pub fn get_or_create_genre(conn: &Connection, slug: &str, default_name: &str) -> DbResult<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM genres WHERE slug = ?1", params![slug], |r| {
            r.get(0)
        })
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO genres (name, slug) VALUES (?1, ?2)",
        params![default_name, slug],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Titles: narrow storage interface for the sync engine ───────────────────

pub fn find_title_by_tmdb_id(
    conn: &Connection,
    platform_id: i64,
    tmdb_id: i64,
) -> DbResult<Option<i64>> {
    conn.query_row(
        "SELECT id FROM titles WHERE platform_id = ?1 AND tmdb_id = ?2",
        params![platform_id, tmdb_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn find_title_by_name(
    conn: &Connection,
    platform_id: i64,
    title: &str,
) -> DbResult<Option<i64>> {
    conn.query_row(
        "SELECT id FROM titles WHERE platform_id = ?1 AND title = ?2",
        params![platform_id, title],
        |r| r.get(0),
    )
    .optional()
}

/// Store a raw item as a title, keyed by TMDB id when present
///
/// Two explicit identification strategies:
/// - with a TMDB id, the row is created or refreshed in place
///   ([`upsert_by_tmdb_id`]);
/// - without one, the row is created only if no title with the same name
///   exists, and an existing row keeps its fields from the first sync
///   ([`create_by_name_if_absent`]).
///
/// In both cases the title's genre set is replaced wholesale with the genres
/// resolved from the raw item.
pub fn upsert_title(
    conn: &Connection,
    platform_id: i64,
    raw: &RawTitle,
    kind: TitleKind,
) -> DbResult<i64> {
    let title_id = match raw.tmdb_id {
        Some(tmdb_id) => upsert_by_tmdb_id(conn, platform_id, tmdb_id, raw, kind)?,
        None => create_by_name_if_absent(conn, platform_id, raw, kind)?,
    };
    set_title_genres(conn, title_id, &raw.genre_ids)?;
    Ok(title_id)
}

/// External-id branch: refreshes every mutable field on re-sync
fn upsert_by_tmdb_id(
    conn: &Connection,
    platform_id: i64,
    tmdb_id: i64,
    raw: &RawTitle,
    kind: TitleKind,
) -> DbResult<i64> {
    if let Some(id) = find_title_by_tmdb_id(conn, platform_id, tmdb_id)? {
        conn.execute(
            "UPDATE titles
             SET title = ?1, slug = ?2, kind = ?3, popularity = ?4, description = ?5,
                 poster_url = ?6, regions = 'AR', updated_at = datetime('now')
             WHERE id = ?7",
            params![
                raw.name,
                slugify(&raw.name),
                kind.as_str(),
                raw.popularity,
                raw.description,
                raw.poster_url,
                id
            ],
        )?;
        return Ok(id);
    }
    insert_title_row(conn, platform_id, Some(tmdb_id), raw, kind)
}

/// Name-fallback branch: create-if-absent only, never refreshes
fn create_by_name_if_absent(
    conn: &Connection,
    platform_id: i64,
    raw: &RawTitle,
    kind: TitleKind,
) -> DbResult<i64> {
    if let Some(id) = find_title_by_name(conn, platform_id, &raw.name)? {
        return Ok(id);
    }
    insert_title_row(conn, platform_id, None, raw, kind)
}

fn insert_title_row(
    conn: &Connection,
    platform_id: i64,
    tmdb_id: Option<i64>,
    raw: &RawTitle,
    kind: TitleKind,
) -> DbResult<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO titles
         (platform_id, title, slug, kind, popularity, description, poster_url, regions, tmdb_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'AR', ?8)",
    )?;
    stmt.execute(params![
        platform_id,
        raw.name,
        slugify(&raw.name),
        kind.as_str(),
        raw.popularity,
        raw.description,
        raw.poster_url,
        tmdb_id
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Replace the genre set of a title with the resolved genre ids
///
/// Unknown TMDB genre ids get a placeholder row (`Genre <id>`); a later genre
/// sync upgrades the display name in place.
fn set_title_genres(conn: &Connection, title_id: i64, genre_ids: &[i64]) -> DbResult<()> {
    conn.execute(
        "DELETE FROM title_genres WHERE title_id = ?1",
        params![title_id],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO title_genres (title_id, genre_id) VALUES (?1, ?2)",
    )?;
    for gid in genre_ids {
        let genre_id = get_or_create_genre(conn, &genre_slug(*gid), &placeholder_genre_name(*gid))?;
        stmt.execute(params![title_id, genre_id])?;
    }
    Ok(())
}

/// Delete all titles (and their genre links) for one platform and kind
pub fn delete_titles(conn: &Connection, platform_id: i64, kind: TitleKind) -> DbResult<usize> {
    conn.execute(
        "DELETE FROM title_genres WHERE title_id IN
         (SELECT id FROM titles WHERE platform_id = ?1 AND kind = ?2)",
        params![platform_id, kind.as_str()],
    )?;
    conn.execute(
        "DELETE FROM titles WHERE platform_id = ?1 AND kind = ?2",
        params![platform_id, kind.as_str()],
    )
}

pub fn count_titles(conn: &Connection, platform_id: i64, kind: TitleKind) -> DbResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM titles WHERE platform_id = ?1 AND kind = ?2",
        params![platform_id, kind.as_str()],
        |r| r.get(0),
    )
}

// ── Read projections for the web layer ──────────────────────────────────────

/// Sort order for title listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    PopularityAsc,
    #[default]
    PopularityDesc,
}

/// Filters for the title listing; all lists are AND-combined with the
/// always-on AR region filter, genre slugs use AND semantics among themselves
#[derive(Debug, Default)]
pub struct TitleQuery {
    /// Platform slugs; empty means all platforms
    pub platforms: Vec<String>,
    /// Substring matched against title and description
    pub q: Option<String>,
    pub kinds: Vec<TitleKind>,
    /// Genre slugs a title must ALL carry
    pub genres: Vec<String>,
    pub sort: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

/// One page of title listing results
#[derive(Debug, Serialize)]
pub struct TitlePage {
    pub titles: Vec<TitleRow>,
    pub total: i64,
    pub page: u32,
    pub page_count: u32,
    pub page_size: u32,
}

/// List titles available in Argentina, filtered, sorted and paginated
///
/// Out-of-range pages are clamped to the last page; unsupported page sizes
/// fall back to 25.
pub fn list_titles(conn: &Connection, query: &TitleQuery) -> DbResult<TitlePage> {
    use rusqlite::types::Value as SqlValue;

    let mut where_sql = String::from("regions LIKE '%AR%'");
    let mut values: Vec<SqlValue> = Vec::new();

    if !query.platforms.is_empty() {
        where_sql.push_str(&format!(
            " AND platform_id IN (SELECT id FROM platforms WHERE slug IN ({}))",
            placeholders(query.platforms.len())
        ));
        values.extend(query.platforms.iter().map(|s| SqlValue::from(s.clone())));
    }

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        where_sql.push_str(" AND (title LIKE ? COLLATE NOCASE OR description LIKE ? COLLATE NOCASE)");
        let pattern = format!("%{}%", q);
        values.push(SqlValue::from(pattern.clone()));
        values.push(SqlValue::from(pattern));
    }

    if !query.kinds.is_empty() {
        where_sql.push_str(&format!(" AND kind IN ({})", placeholders(query.kinds.len())));
        values.extend(query.kinds.iter().map(|k| SqlValue::from(k.as_str().to_string())));
    }

    for slug in &query.genres {
        where_sql.push_str(
            " AND EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id
                          WHERE tg.title_id = titles.id AND g.slug = ?)",
        );
        values.push(SqlValue::from(slug.clone()));
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM titles WHERE {}", where_sql),
        params_from_iter(values.iter()),
        |r| r.get(0),
    )?;

    let page_size = if PAGE_SIZES.contains(&query.page_size) {
        query.page_size
    } else {
        25
    };
    let page_count = ((total as u32).div_ceil(page_size)).max(1);
    let page = query.page.clamp(1, page_count);

    let order = match query.sort {
        SortOrder::PopularityAsc => "popularity ASC, id ASC",
        SortOrder::PopularityDesc => "popularity DESC, id ASC",
    };
    let sql = format!(
        "SELECT id, platform_id, title, slug, kind, popularity, description, poster_url, regions, tmdb_id
         FROM titles WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        where_sql, order
    );
    values.push(SqlValue::from(page_size as i64));
    values.push(SqlValue::from(((page - 1) * page_size) as i64));

    let mut stmt = conn.prepare(&sql)?;
    let titles: DbResult<Vec<TitleRow>> = stmt
        .query_map(params_from_iter(values.iter()), row_to_title)?
        .collect();

    Ok(TitlePage {
        titles: titles?,
        total,
        page,
        page_count,
        page_size,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn row_to_title(row: &Row<'_>) -> rusqlite::Result<TitleRow> {
    Ok(TitleRow {
        id: row.get(0)?,
        platform_id: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        kind: row.get(4)?,
        popularity: row.get(5)?,
        description: row.get(6)?,
        poster_url: row.get(7)?,
        regions: row.get(8)?,
        tmdb_id: row.get(9)?,
    })
}

/// A genre with the number of AR-available titles carrying it
#[derive(Debug, Serialize)]
pub struct GenreCount {
    pub slug: String,
    pub name: String,
    pub count: i64,
}

/// Genres with per-selection title counts, zero-count genres omitted
pub fn genres_with_counts(
    conn: &Connection,
    platform_slugs: &[String],
) -> DbResult<Vec<GenreCount>> {
    use rusqlite::types::Value as SqlValue;

    let mut sql = String::from(
        "SELECT g.slug, g.name, COUNT(DISTINCT t.id)
         FROM genres g
         JOIN title_genres tg ON tg.genre_id = g.id
         JOIN titles t ON t.id = tg.title_id
         WHERE t.regions LIKE '%AR%'",
    );
    let mut values: Vec<SqlValue> = Vec::new();
    if !platform_slugs.is_empty() {
        sql.push_str(&format!(
            " AND t.platform_id IN (SELECT id FROM platforms WHERE slug IN ({}))",
            placeholders(platform_slugs.len())
        ));
        values.extend(platform_slugs.iter().map(|s| SqlValue::from(s.clone())));
    }
    sql.push_str(" GROUP BY g.id ORDER BY g.name");

    let mut stmt = conn.prepare(&sql)?;
    let counts: DbResult<Vec<GenreCount>> = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok(GenreCount {
                slug: row.get(0)?,
                name: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect();
    counts
}

/// A title with its resolved genres, for the detail endpoint
#[derive(Debug, Serialize)]
pub struct TitleDetail {
    #[serde(flatten)]
    pub title: TitleRow,
    pub genres: Vec<Genre>,
}

pub fn get_title_detail(conn: &Connection, title_id: i64) -> DbResult<Option<TitleDetail>> {
    let title = conn
        .query_row(
            "SELECT id, platform_id, title, slug, kind, popularity, description, poster_url, regions, tmdb_id
             FROM titles WHERE id = ?1",
            params![title_id],
            row_to_title,
        )
        .optional()?;
    let Some(title) = title else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT g.id, g.name, g.slug FROM genres g
         JOIN title_genres tg ON tg.genre_id = g.id
         WHERE tg.title_id = ?1 ORDER BY g.name",
    )?;
    let genres: DbResult<Vec<Genre>> = stmt
        .query_map(params![title_id], |row| {
            Ok(Genre {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
            })
        })?
        .collect();

    Ok(Some(TitleDetail {
        title,
        genres: genres?,
    }))
}

// ── Sample data ─────────────────────────────────────────────────────────────

/// Load sample platforms, genres and titles (Argentina)
pub fn load_sample(conn: &Connection) -> DbResult<()> {
    let netflix = sample_platform(conn, "Netflix", "https://via.placeholder.com/300x150?text=Netflix")?;
    let prime = sample_platform(conn, "Prime Video", "https://via.placeholder.com/300x150?text=Prime")?;
    let disney = sample_platform(conn, "Disney+", "https://via.placeholder.com/300x150?text=Disney+")?;

    let action = get_or_create_genre(conn, "accion", "Acción")?;
    let drama = get_or_create_genre(conn, "drama", "Drama")?;
    let comedy = get_or_create_genre(conn, "comedia", "Comedia")?;

    sample_title(
        conn,
        netflix,
        "Película de Acción AR",
        TitleKind::Movie,
        80,
        "Una peli de acción disponible en Argentina",
        action,
    )?;
    sample_title(
        conn,
        prime,
        "Serie Dramática",
        TitleKind::Series,
        95,
        "Una serie dramática top",
        drama,
    )?;
    sample_title(
        conn,
        disney,
        "Comedia Familiar",
        TitleKind::Movie,
        60,
        "Comedia para toda la familia",
        comedy,
    )?;

    log::info!("Sample data loaded");
    Ok(())
}

fn sample_platform(conn: &Connection, name: &str, image_url: &str) -> DbResult<i64> {
    if let Some(p) = get_platform_by_slug(conn, &slugify(name))? {
        return Ok(p.id);
    }
    insert_platform(conn, name, None, image_url, None)
}

fn sample_title(
    conn: &Connection,
    platform_id: i64,
    name: &str,
    kind: TitleKind,
    popularity: i64,
    description: &str,
    genre_id: i64,
) -> DbResult<()> {
    if find_title_by_name(conn, platform_id, name)?.is_some() {
        return Ok(());
    }
    let raw = RawTitle {
        tmdb_id: None,
        name: name.to_string(),
        popularity,
        description: description.to_string(),
        poster_url: String::new(),
        genre_ids: Vec::new(),
    };
    let title_id = insert_title_row(conn, platform_id, None, &raw, kind)?;
    conn.execute(
        "INSERT OR IGNORE INTO title_genres (title_id, genre_id) VALUES (?1, ?2)",
        params![title_id, genre_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an in-memory database for testing
    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn test_platform(conn: &Connection) -> i64 {
        insert_platform(conn, "Netflix", None, "", Some(8)).unwrap()
    }

    fn raw_title(tmdb_id: Option<i64>, name: &str, popularity: i64) -> RawTitle {
        RawTitle {
            tmdb_id,
            name: name.to_string(),
            popularity,
            description: format!("{} description", name),
            poster_url: String::new(),
            genre_ids: Vec::new(),
        }
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Prime Video"), "prime-video");
        assert_eq!(slugify("Disney+"), "disney");
        assert_eq!(slugify("Acción"), "accion");
        assert_eq!(slugify("  El  Ñandú  "), "el-nandu");
    }

    #[test]
    fn init_schema_creates_tables() {
        let conn = test_db();
        for table in ["platforms", "genres", "titles", "title_genres"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn title_kind_parses() {
        assert_eq!("movies".parse::<TitleKind>().unwrap(), TitleKind::Movie);
        assert_eq!("movie".parse::<TitleKind>().unwrap(), TitleKind::Movie);
        assert_eq!("series".parse::<TitleKind>().unwrap(), TitleKind::Series);
        assert!("documentary".parse::<TitleKind>().is_err());
    }

    #[test]
    fn insert_platform_derives_slug() {
        let conn = test_db();
        insert_platform(&conn, "Prime Video", None, "", Some(119)).unwrap();
        let p = get_platform_by_slug(&conn, "prime-video").unwrap().unwrap();
        assert_eq!(p.name, "Prime Video");
        assert_eq!(p.tmdb_provider_id, Some(119));
    }

    #[test]
    fn upsert_genre_updates_name_preserving_slug() {
        let conn = test_db();
        assert!(upsert_genre(&conn, "tmdb-28", "Genre 28").unwrap());
        assert!(!upsert_genre(&conn, "tmdb-28", "Acción").unwrap());

        let (name, count): (String, i64) = conn
            .query_row(
                "SELECT name, (SELECT COUNT(*) FROM genres) FROM genres WHERE slug = 'tmdb-28'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Acción");
        assert_eq!(count, 1);
    }

    #[test]
    fn genre_slug_namespaces_do_not_collide() {
        let conn = test_db();
        // human-derived slug vs provider-namespaced slug for the same name
        get_or_create_genre(&conn, "accion", "Acción").unwrap();
        get_or_create_genre(&conn, "tmdb-28", "Acción").unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM genres", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn upsert_by_tmdb_id_refreshes_in_place() {
        let conn = test_db();
        let platform = test_platform(&conn);

        upsert_title(&conn, platform, &raw_title(Some(603), "Matrix", 10), TitleKind::Movie)
            .unwrap();
        upsert_title(&conn, platform, &raw_title(Some(603), "The Matrix", 99), TitleKind::Movie)
            .unwrap();

        assert_eq!(count_titles(&conn, platform, TitleKind::Movie).unwrap(), 1);
        let (title, popularity): (String, i64) = conn
            .query_row(
                "SELECT title, popularity FROM titles WHERE platform_id = ?1 AND tmdb_id = 603",
                params![platform],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        // second upsert wins on every mutable field
        assert_eq!(title, "The Matrix");
        assert_eq!(popularity, 99);
    }

    #[test]
    fn name_fallback_creates_once_and_never_refreshes() {
        let conn = test_db();
        let platform = test_platform(&conn);

        upsert_title(&conn, platform, &raw_title(None, "Sin Id", 10), TitleKind::Movie).unwrap();
        upsert_title(&conn, platform, &raw_title(None, "Sin Id", 99), TitleKind::Movie).unwrap();

        assert_eq!(count_titles(&conn, platform, TitleKind::Movie).unwrap(), 1);
        let popularity: i64 = conn
            .query_row(
                "SELECT popularity FROM titles WHERE platform_id = ?1 AND title = 'Sin Id'",
                params![platform],
                |r| r.get(0),
            )
            .unwrap();
        // fields reflect the first upsert only
        assert_eq!(popularity, 10);
    }

    #[test]
    fn same_tmdb_id_on_other_platform_is_distinct() {
        let conn = test_db();
        let netflix = test_platform(&conn);
        let prime = insert_platform(&conn, "Prime Video", None, "", Some(119)).unwrap();

        upsert_title(&conn, netflix, &raw_title(Some(603), "Matrix", 10), TitleKind::Movie)
            .unwrap();
        upsert_title(&conn, prime, &raw_title(Some(603), "Matrix", 10), TitleKind::Movie).unwrap();

        assert_eq!(count_titles(&conn, netflix, TitleKind::Movie).unwrap(), 1);
        assert_eq!(count_titles(&conn, prime, TitleKind::Movie).unwrap(), 1);
    }

    #[test]
    fn genre_set_is_replaced_wholesale() {
        let conn = test_db();
        let platform = test_platform(&conn);

        let mut raw = raw_title(Some(603), "Matrix", 10);
        raw.genre_ids = vec![28, 878];
        let title_id = upsert_title(&conn, platform, &raw, TitleKind::Movie).unwrap();

        raw.genre_ids = vec![878, 53];
        upsert_title(&conn, platform, &raw, TitleKind::Movie).unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT g.slug FROM genres g JOIN title_genres tg ON tg.genre_id = g.id
                 WHERE tg.title_id = ?1 ORDER BY g.slug",
            )
            .unwrap();
        let slugs: Vec<String> = stmt
            .query_map(params![title_id], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(slugs, vec!["tmdb-53", "tmdb-878"]);
    }

    #[test]
    fn unknown_genre_ids_get_placeholder_names() {
        let conn = test_db();
        let platform = test_platform(&conn);

        let mut raw = raw_title(Some(1), "X", 1);
        raw.genre_ids = vec![99];
        upsert_title(&conn, platform, &raw, TitleKind::Movie).unwrap();

        let name: String = conn
            .query_row("SELECT name FROM genres WHERE slug = 'tmdb-99'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Genre 99");

        // a later genre sync upgrades the name, same row
        upsert_genre(&conn, "tmdb-99", "Suspenso").unwrap();
        let name: String = conn
            .query_row("SELECT name FROM genres WHERE slug = 'tmdb-99'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Suspenso");
    }

    #[test]
    fn delete_titles_is_scoped_to_platform_and_kind() {
        let conn = test_db();
        let platform = test_platform(&conn);

        let mut movie = raw_title(Some(1), "Movie", 1);
        movie.genre_ids = vec![28];
        upsert_title(&conn, platform, &movie, TitleKind::Movie).unwrap();
        upsert_title(&conn, platform, &raw_title(Some(2), "Show", 1), TitleKind::Series).unwrap();

        let deleted = delete_titles(&conn, platform, TitleKind::Movie).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(count_titles(&conn, platform, TitleKind::Movie).unwrap(), 0);
        assert_eq!(count_titles(&conn, platform, TitleKind::Series).unwrap(), 1);

        // genre links of the deleted titles are gone too
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM title_genres", [], |r| r.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }

    #[test]
    fn available_in_argentina_parses_region_list() {
        let mut row = TitleRow {
            id: 1,
            platform_id: 1,
            title: "X".into(),
            slug: "x".into(),
            kind: "movie".into(),
            popularity: 0,
            description: String::new(),
            poster_url: String::new(),
            regions: "BR, ar ,CL".into(),
            tmdb_id: None,
        };
        assert!(row.available_in_argentina());
        row.regions = "BR,CL".into();
        assert!(!row.available_in_argentina());
    }

    // ── listing ────────────────────────────────────────────────────────────

    fn seed_listing(conn: &Connection) -> (i64, i64) {
        let netflix = insert_platform(conn, "Netflix", None, "", Some(8)).unwrap();
        let prime = insert_platform(conn, "Prime Video", None, "", Some(119)).unwrap();

        let mut a = raw_title(Some(1), "El secreto de sus ojos", 90);
        a.genre_ids = vec![18, 53];
        upsert_title(conn, netflix, &a, TitleKind::Movie).unwrap();

        let mut b = raw_title(Some(2), "Relatos salvajes", 70);
        b.genre_ids = vec![18];
        upsert_title(conn, netflix, &b, TitleKind::Movie).unwrap();

        let c = raw_title(Some(3), "Okupas", 80);
        upsert_title(conn, prime, &c, TitleKind::Series).unwrap();
        (netflix, prime)
    }

    #[test]
    fn list_titles_sorts_by_popularity_desc_by_default() {
        let conn = test_db();
        seed_listing(&conn);

        let page = list_titles(&conn, &TitleQuery::default()).unwrap();
        assert_eq!(page.total, 3);
        let pops: Vec<i64> = page.titles.iter().map(|t| t.popularity).collect();
        assert_eq!(pops, vec![90, 80, 70]);

        let page = list_titles(
            &conn,
            &TitleQuery {
                sort: SortOrder::PopularityAsc,
                ..Default::default()
            },
        )
        .unwrap();
        let pops: Vec<i64> = page.titles.iter().map(|t| t.popularity).collect();
        assert_eq!(pops, vec![70, 80, 90]);
    }

    #[test]
    fn list_titles_filters_by_platform_kind_and_search() {
        let conn = test_db();
        seed_listing(&conn);

        let page = list_titles(
            &conn,
            &TitleQuery {
                platforms: vec!["prime-video".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.titles[0].title, "Okupas");

        let page = list_titles(
            &conn,
            &TitleQuery {
                kinds: vec![TitleKind::Movie],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 2);

        // substring search also matches descriptions, case-insensitive
        let page = list_titles(
            &conn,
            &TitleQuery {
                q: Some("SALVAJES".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.titles[0].title, "Relatos salvajes");
    }

    #[test]
    fn list_titles_genre_filter_uses_and_semantics() {
        let conn = test_db();
        seed_listing(&conn);

        let page = list_titles(
            &conn,
            &TitleQuery {
                genres: vec!["tmdb-18".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 2);

        let page = list_titles(
            &conn,
            &TitleQuery {
                genres: vec!["tmdb-18".into(), "tmdb-53".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.titles[0].title, "El secreto de sus ojos");
    }

    #[test]
    fn list_titles_excludes_other_regions() {
        let conn = test_db();
        let platform = test_platform(&conn);
        upsert_title(&conn, platform, &raw_title(Some(1), "Local", 1), TitleKind::Movie).unwrap();
        conn.execute(
            "UPDATE titles SET regions = 'US' WHERE tmdb_id = 1",
            [],
        )
        .unwrap();

        let page = list_titles(&conn, &TitleQuery::default()).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn list_titles_coerces_page_size_and_clamps_page() {
        let conn = test_db();
        let platform = test_platform(&conn);
        for i in 0..30 {
            upsert_title(
                &conn,
                platform,
                &raw_title(Some(i), &format!("Title {}", i), i),
                TitleKind::Movie,
            )
            .unwrap();
        }

        let page = list_titles(
            &conn,
            &TitleQuery {
                page: 99,
                page_size: 7, // unsupported, coerced to 25
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.page_size, 25);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.titles.len(), 5);
    }

    #[test]
    fn genres_with_counts_omits_unused_genres() {
        let conn = test_db();
        seed_listing(&conn);
        get_or_create_genre(&conn, "sin-titulos", "Sin Títulos").unwrap();

        let counts = genres_with_counts(&conn, &[]).unwrap();
        let slugs: Vec<&str> = counts.iter().map(|c| c.slug.as_str()).collect();
        assert!(slugs.contains(&"tmdb-18"));
        assert!(!slugs.contains(&"sin-titulos"));

        let drama = counts.iter().find(|c| c.slug == "tmdb-18").unwrap();
        assert_eq!(drama.count, 2);

        // scoped to one platform
        let counts = genres_with_counts(&conn, &["prime-video".to_string()]).unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn title_detail_resolves_genres() {
        let conn = test_db();
        let platform = test_platform(&conn);
        upsert_genre(&conn, "tmdb-18", "Drama").unwrap();

        let mut raw = raw_title(Some(1), "Con género", 5);
        raw.genre_ids = vec![18];
        let id = upsert_title(&conn, platform, &raw, TitleKind::Movie).unwrap();

        let detail = get_title_detail(&conn, id).unwrap().unwrap();
        assert_eq!(detail.title.title, "Con género");
        assert_eq!(detail.genres.len(), 1);
        assert_eq!(detail.genres[0].name, "Drama");

        assert!(get_title_detail(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn load_sample_is_idempotent() {
        let conn = test_db();
        load_sample(&conn).unwrap();
        load_sample(&conn).unwrap();

        let platforms = list_platforms(&conn).unwrap();
        assert_eq!(platforms.len(), 3);
        let titles: i64 = conn
            .query_row("SELECT COUNT(*) FROM titles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(titles, 3);
    }
}
