//! JSON snapshots of raw sync payloads
//!
//! Every sync writes the concatenated raw items for one platform/kind pair
//! to `<data_dir>/<platform-slug>-<kind-plural>.json`, pretty-printed, for
//! offline inspection and diffing between runs.

use crate::database::TitleKind;
use crate::error::Result;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot file path for a platform/kind pair
pub fn snapshot_path(data_dir: &Path, platform_slug: &str, kind: TitleKind) -> PathBuf {
    data_dir.join(format!("{}-{}.json", platform_slug, kind.plural()))
}

/// Write the raw items for a platform/kind pair, replacing any previous file
pub fn save(
    data_dir: &Path,
    platform_slug: &str,
    kind: TitleKind,
    items: &[Value],
) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)?;
    let path = snapshot_path(data_dir, platform_slug, kind);
    fs::write(&path, serde_json::to_string_pretty(items)?)?;
    log::info!("Saved {} items to {}", items.len(), path.display());
    Ok(path)
}

/// Remove the snapshot for a platform/kind pair
///
/// Returns false when no snapshot existed.
pub fn purge(data_dir: &Path, platform_slug: &str, kind: TitleKind) -> Result<bool> {
    let path = snapshot_path(data_dir, platform_slug, kind);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)?;
    log::info!("Removed snapshot {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn save_round_trips_items_exactly() {
        let dir = TempDir::new().unwrap();
        let items = vec![
            json!({"id": 1, "title": "Acción total", "popularity": 12.34}),
            json!({"id": 2, "name": "Okupas", "genre_ids": [18, 80]}),
        ];

        let path = save(dir.path(), "netflix", TitleKind::Movie, &items).unwrap();
        assert_eq!(path, dir.path().join("netflix-movies.json"));

        let text = std::fs::read_to_string(&path).unwrap();
        // non-ASCII is written verbatim, not escaped
        assert!(text.contains("Acción total"));

        let parsed: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, items);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        save(dir.path(), "netflix", TitleKind::Series, &[json!({"id": 1})]).unwrap();
        let path = save(dir.path(), "netflix", TitleKind::Series, &[json!({"id": 2})]).unwrap();

        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, vec![json!({"id": 2})]);
    }

    #[test]
    fn save_creates_missing_data_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("data").join("snapshots");
        let path = save(&nested, "prime-video", TitleKind::Movie, &[]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn purge_reports_whether_snapshot_existed() {
        let dir = TempDir::new().unwrap();
        save(dir.path(), "netflix", TitleKind::Movie, &[]).unwrap();

        assert!(purge(dir.path(), "netflix", TitleKind::Movie).unwrap());
        assert!(!purge(dir.path(), "netflix", TitleKind::Movie).unwrap());
    }

    #[test]
    fn kinds_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let movies = save(dir.path(), "netflix", TitleKind::Movie, &[]).unwrap();
        let series = save(dir.path(), "netflix", TitleKind::Series, &[]).unwrap();
        assert_ne!(movies, series);
        assert!(series.ends_with("netflix-series.json"));
    }
}
