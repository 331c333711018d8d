//! Web server for the catalog browser UI
//!
//! Read endpoints serve filtered title listings; admin endpoints trigger
//! syncs against TMDB. The database connection is shared behind a mutex and
//! is never held across an await.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::database::{
    self, GenreCount, Platform, SortOrder, TitleDetail, TitleKind, TitlePage, TitleQuery,
};
use crate::error::CatalogError;
use crate::sync;
use crate::tmdb::TmdbClient;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
    /// None when no API key is configured; admin endpoints reject requests
    tmdb: Option<TmdbClient>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Title listing query parameters; list-valued filters arrive comma-separated
#[derive(Deserialize, Default)]
struct TitlesParams {
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    25
}

/// Split a comma-separated filter value, dropping empty segments
fn csv_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl TitlesParams {
    fn into_query(self) -> TitleQuery {
        let kinds = csv_list(&self.kind)
            .iter()
            .filter_map(|k| k.parse::<TitleKind>().ok())
            .collect();
        let sort = match self.sort.as_deref() {
            Some("pop_asc") => SortOrder::PopularityAsc,
            _ => SortOrder::PopularityDesc,
        };
        TitleQuery {
            platforms: csv_list(&self.platform),
            q: self.q,
            kinds,
            genres: csv_list(&self.genre),
            sort,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// GET / - Serve the web UI (single HTML page)
async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// GET /api/platforms
async fn platforms_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Platform>>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    match database::list_platforms(&conn) {
        Ok(platforms) => Ok(ApiResponse::ok(platforms)),
        Err(e) => {
            log::error!("Platform listing error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/titles?platform=a,b&q=...&kind=movie,series&genre=x,y&sort=pop_desc&page=1&page_size=25
async fn titles_handler(
    State(state): State<AppState>,
    Query(params): Query<TitlesParams>,
) -> Result<Json<ApiResponse<TitlePage>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    match database::list_titles(&conn, &params.into_query()) {
        Ok(page) => Ok(ApiResponse::ok(page)),
        Err(e) => {
            log::error!("Title listing error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/titles/{id}
async fn title_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TitleDetail>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    match database::get_title_detail(&conn, id) {
        Ok(Some(detail)) => Ok(ApiResponse::ok(detail)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            log::error!("Title detail error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/genres?platform=a,b - genres with counts for the selection
async fn genres_handler(
    State(state): State<AppState>,
    Query(params): Query<TitlesParams>,
) -> Result<Json<ApiResponse<Vec<GenreCount>>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    match database::genres_with_counts(&conn, &csv_list(&params.platform)) {
        Ok(genres) => Ok(ApiResponse::ok(genres)),
        Err(e) => {
            log::error!("Genre listing error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Outcome payload for admin sync endpoints
#[derive(Serialize)]
struct SyncResult {
    platform: String,
    kind: String,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<String>,
    /// Purge only: whether a snapshot file existed and was removed
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<bool>,
}

fn error_status(e: &CatalogError) -> StatusCode {
    match e {
        CatalogError::MissingApiKey | CatalogError::MissingProviderId(_) => StatusCode::BAD_REQUEST,
        CatalogError::PlatformNotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::Network(_) | CatalogError::HttpStatus(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response<T>(e: CatalogError) -> Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)> {
    log::error!("Admin sync error: {}", e);
    Err((
        error_status(&e),
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(e.to_string()),
        }),
    ))
}

type AdminResult = Result<Json<ApiResponse<SyncResult>>, (StatusCode, Json<ApiResponse<SyncResult>>)>;

fn parse_admin_path(
    state: &AppState,
    slug: &str,
    kind: &str,
) -> Result<(Platform, TitleKind, TmdbClient), CatalogError> {
    let kind = kind
        .parse::<TitleKind>()
        .map_err(|_| CatalogError::PlatformNotFound(format!("{}/{}", slug, kind)))?;
    let client = state.tmdb.clone().ok_or(CatalogError::MissingApiKey)?;
    let platform = {
        let conn = state.db.lock().unwrap();
        database::get_platform_by_slug(&conn, slug)?
            .ok_or_else(|| CatalogError::PlatformNotFound(slug.to_string()))?
    };
    Ok((platform, kind, client))
}

/// POST /api/admin/generate/{platform}/{kind} - destructive full regenerate
async fn admin_generate_handler(
    State(state): State<AppState>,
    Path((slug, kind)): Path<(String, String)>,
) -> AdminResult {
    let (platform, kind, client) = match parse_admin_path(&state, &slug, &kind) {
        Ok(v) => v,
        Err(e) => return error_response(e),
    };

    // fetch with the lock released, then apply under the lock
    match sync::sync_genres_best_effort_then_fetch(&client, kind, &platform).await {
        Ok((genre_entries, items)) => {
            let mut conn = state.db.lock().unwrap();
            if let Some(entries) = genre_entries {
                if let Err(e) = sync::apply_genre_list(&conn, &entries) {
                    return error_response(e.into());
                }
            }
            match sync::generate_from_items(&mut conn, &state.data_dir, &platform, kind, &items) {
                Ok(path) => Ok(ApiResponse::ok(SyncResult {
                    platform: platform.slug,
                    kind: kind.to_string(),
                    count: items.len(),
                    snapshot: Some(path.display().to_string()),
                    removed: None,
                })),
                Err(e) => error_response(e),
            }
        }
        Err(e) => error_response(e),
    }
}

/// POST /api/admin/update/{platform}/{kind} - additive update
async fn admin_update_handler(
    State(state): State<AppState>,
    Path((slug, kind)): Path<(String, String)>,
) -> AdminResult {
    let (platform, kind, client) = match parse_admin_path(&state, &slug, &kind) {
        Ok(v) => v,
        Err(e) => return error_response(e),
    };

    match sync::sync_genres_best_effort_then_fetch(&client, kind, &platform).await {
        Ok((genre_entries, items)) => {
            let conn = state.db.lock().unwrap();
            if let Some(entries) = genre_entries {
                if let Err(e) = sync::apply_genre_list(&conn, &entries) {
                    return error_response(e.into());
                }
            }
            let created = match sync::update_from_items(&conn, &platform, kind, &items) {
                Ok(n) => n,
                Err(e) => return error_response(e),
            };
            match crate::snapshot::save(&state.data_dir, &platform.slug, kind, &items) {
                Ok(path) => Ok(ApiResponse::ok(SyncResult {
                    platform: platform.slug,
                    kind: kind.to_string(),
                    count: created,
                    snapshot: Some(path.display().to_string()),
                    removed: None,
                })),
                Err(e) => error_response(e),
            }
        }
        Err(e) => error_response(e),
    }
}

/// POST /api/admin/purge/{platform}/{kind} - remove stored titles + snapshot
async fn admin_purge_handler(
    State(state): State<AppState>,
    Path((slug, kind)): Path<(String, String)>,
) -> AdminResult {
    let kind = match kind.parse::<TitleKind>() {
        Ok(k) => k,
        Err(_) => {
            return error_response(CatalogError::PlatformNotFound(format!("{}/{}", slug, kind)))
        }
    };
    let conn = state.db.lock().unwrap();
    let platform = match database::get_platform_by_slug(&conn, &slug) {
        Ok(Some(p)) => p,
        Ok(None) => return error_response(CatalogError::PlatformNotFound(slug)),
        Err(e) => return error_response(e.into()),
    };
    match sync::purge(&conn, &state.data_dir, &platform, kind) {
        Ok(removed) => Ok(ApiResponse::ok(SyncResult {
            platform: platform.slug,
            kind: kind.to_string(),
            count: 0,
            snapshot: None,
            removed: Some(removed),
        })),
        Err(e) => error_response(e),
    }
}

/// Build the web server router
pub fn create_router(
    db: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
    tmdb: Option<TmdbClient>,
) -> Router {
    let state = AppState { db, data_dir, tmdb };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/platforms", get(platforms_handler))
        .route("/api/titles", get(titles_handler))
        .route("/api/titles/{id}", get(title_detail_handler))
        .route("/api/genres", get(genres_handler))
        .route("/api/admin/generate/{platform}/{kind}", post(admin_generate_handler))
        .route("/api/admin/update/{platform}/{kind}", post(admin_update_handler))
        .route("/api/admin/purge/{platform}/{kind}", post(admin_purge_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server (async)
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
pub async fn serve(
    db: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
    tmdb: Option<TmdbClient>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(db, data_dir, tmdb);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Web UI listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
