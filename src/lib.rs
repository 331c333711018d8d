//! Dondever - streaming catalog browser for Argentina
//!
//! Syncs per-platform title availability from TMDB into SQLite, keeps raw
//! JSON snapshots of every sync, and serves a filterable catalog over HTTP.

pub mod database;
pub mod error;
pub mod snapshot;
pub mod sync;
pub mod tmdb;
pub mod web;

pub use database::{init_schema, TitleKind};
pub use error::{CatalogError, Result};
pub use tmdb::TmdbClient;
