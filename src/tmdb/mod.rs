//! TMDB metadata client

pub mod client;
pub mod discover;
pub mod genres;

pub use client::TmdbClient;
pub use discover::{fetch_page, DiscoverPage, RawTitle};
pub use genres::{fetch_genre_lists, GenreEntry};
