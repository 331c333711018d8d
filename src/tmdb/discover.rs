//! TMDB discover endpoint: paginated title listings filtered by provider

use crate::database::TitleKind;
use crate::error::Result;
use crate::tmdb::client::{TmdbClient, LANGUAGE, WATCH_REGION};
use serde::Deserialize;
use serde_json::Value;

/// Base URL for poster images (w300 rendition)
const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w300";

impl TitleKind {
    /// TMDB discover endpoint for this kind of title
    pub fn discover_endpoint(self) -> &'static str {
        match self {
            TitleKind::Movie => "discover/movie",
            TitleKind::Series => "discover/tv",
        }
    }
}

/// One page of discover results
///
/// Items stay untyped so snapshots preserve the payload exactly as fetched;
/// typed extraction happens at upsert time via [`RawTitle::from_value`].
#[derive(Debug, Deserialize)]
pub struct DiscoverPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub total_pages: u32,
}

/// Fetch one page of titles available on the given watch provider
pub async fn fetch_page(
    client: &TmdbClient,
    kind: TitleKind,
    provider_id: i64,
    page: u32,
) -> Result<DiscoverPage> {
    client
        .get_json(
            kind.discover_endpoint(),
            &[
                ("with_watch_providers", provider_id.to_string()),
                ("watch_region", WATCH_REGION.to_string()),
                ("page", page.to_string()),
                ("language", LANGUAGE.to_string()),
            ],
        )
        .await
}

/// Fields extracted from a raw discover item for storage
///
/// Extraction is lenient: missing or malformed fields degrade to defaults
/// rather than failing the sync.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTitle {
    pub tmdb_id: Option<i64>,
    pub name: String,
    pub popularity: i64,
    pub description: String,
    pub poster_url: String,
    pub genre_ids: Vec<i64>,
}

impl RawTitle {
    pub fn from_value(raw: &Value, kind: TitleKind) -> Self {
        let name = match kind {
            TitleKind::Movie => {
                string_field(raw, "title").or_else(|| string_field(raw, "original_title"))
            }
            TitleKind::Series => {
                string_field(raw, "name").or_else(|| string_field(raw, "original_name"))
            }
        }
        .unwrap_or_default();

        // popularity arrives as a float; stored truncated, missing or
        // non-numeric values count as zero
        let popularity = raw.get("popularity").and_then(Value::as_f64).unwrap_or(0.0) as i64;

        let poster_url = string_field(raw, "poster_path")
            .map(|p| format!("{}{}", POSTER_BASE_URL, p))
            .unwrap_or_default();

        let genre_ids = raw
            .get("genre_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        Self {
            tmdb_id: raw.get("id").and_then(Value::as_i64),
            name,
            popularity,
            description: string_field(raw, "overview").unwrap_or_default(),
            poster_url,
            genre_ids,
        }
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
