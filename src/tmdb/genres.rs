//! TMDB genre-list endpoints

use crate::error::Result;
use crate::tmdb::client::{TmdbClient, LANGUAGE};
use serde::Deserialize;

/// One entry from a TMDB genre list
#[derive(Debug, Clone, Deserialize)]
pub struct GenreEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct GenreListResponse {
    #[serde(default)]
    genres: Vec<GenreEntry>,
}

/// Fetch the canonical movie and tv genre lists, merged
pub async fn fetch_genre_lists(client: &TmdbClient) -> Result<Vec<GenreEntry>> {
    let params = [("language", LANGUAGE.to_string())];
    let movie: GenreListResponse = client.get_json("genre/movie/list", &params).await?;
    let tv: GenreListResponse = client.get_json("genre/tv/list", &params).await?;

    let mut all = movie.genres;
    all.extend(tv.genres);
    Ok(all)
}

/// Slug for a provider-sourced genre
///
/// The `tmdb-` prefix keeps these out of the human-derived slug namespace.
pub fn genre_slug(tmdb_genre_id: i64) -> String {
    format!("tmdb-{}", tmdb_genre_id)
}

/// Display name used for a genre id that has not been synced yet
pub fn placeholder_genre_name(tmdb_genre_id: i64) -> String {
    format!("Genre {}", tmdb_genre_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_list_deserializes() {
        let json = r#"{"genres": [{"id": 28, "name": "Acción"}, {"id": 18, "name": "Drama"}]}"#;
        let list: GenreListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.genres.len(), 2);
        assert_eq!(list.genres[0].id, 28);
        assert_eq!(list.genres[0].name, "Acción");
    }

    #[test]
    fn genre_slug_namespace() {
        assert_eq!(genre_slug(28), "tmdb-28");
        assert_eq!(placeholder_genre_name(28), "Genre 28");
    }

    /// Live API test - run with: cargo test live_genre_lists -- --ignored
    /// Requires TMDB_API_KEY to be set.
    #[tokio::test]
    #[ignore]
    async fn live_genre_lists_are_non_empty() {
        let client = TmdbClient::from_env().unwrap();
        let entries = fetch_genre_lists(&client).await.unwrap();
        assert!(!entries.is_empty());
        assert!(entries.iter().all(|g| !g.name.is_empty()));
    }
}
