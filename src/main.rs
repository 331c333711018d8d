//! Dondever - streaming catalog browser for Argentina
//!
//! Syncs titles from TMDB into SQLite per platform and serves a filterable
//! catalog over HTTP.

use clap::{Parser, Subcommand};
use dondever::database::{self, TitleKind};
use dondever::{init_schema, sync, web, TmdbClient};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Streaming catalog browser - syncs TMDB availability data to SQLite
#[derive(Parser, Debug)]
#[command(name = "dondever")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Directory for JSON snapshots (default: <database dir>/data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Pause between paginated TMDB requests, in milliseconds
    #[arg(long, default_value_t = 250)]
    request_delay_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Register a streaming platform
    AddPlatform {
        /// Display name, e.g. "Prime Video"
        name: String,
        /// TMDB watch provider id (8 = Netflix, 119 = Prime Video, ...)
        #[arg(long)]
        provider_id: Option<i64>,
        /// Logo URL
        #[arg(long, default_value = "")]
        image_url: String,
        /// Slug override (default: derived from the name)
        #[arg(long)]
        slug: Option<String>,
    },
    /// Destructively regenerate one platform/kind pair from TMDB
    Generate {
        /// Platform slug
        platform: String,
        /// Title kind: movies or series
        kind: TitleKind,
    },
    /// Add titles missing from one platform/kind pair, keeping existing rows
    Update {
        /// Platform slug
        platform: String,
        /// Title kind: movies or series
        kind: TitleKind,
    },
    /// Remove all stored titles and the snapshot for a platform/kind pair
    Purge {
        /// Platform slug
        platform: String,
        /// Title kind: movies or series
        kind: TitleKind,
    },
    /// Load sample platforms and titles for local development
    LoadSample,
}

/// Returns the default database path: ~/.local/share/dondever/catalog.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dondever")
        .join("catalog.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);
    let data_dir = args.data_dir.clone().unwrap_or_else(|| {
        db_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("data")
    });

    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_schema(&conn) {
        log::error!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    match args.command {
        Command::Serve { port } => {
            // Admin sync endpoints stay disabled without an API key
            let tmdb = match tmdb_client(args.request_delay_ms) {
                Ok(client) => Some(client),
                Err(e) => {
                    log::warn!("Sync disabled: {}", e);
                    None
                }
            };
            let db = Arc::new(Mutex::new(conn));
            if let Err(e) = web::serve(db, data_dir, tmdb, port).await {
                log::error!("Web server error: {}", e);
                std::process::exit(1);
            }
        }
        Command::AddPlatform {
            name,
            provider_id,
            image_url,
            slug,
        } => {
            match database::insert_platform(&conn, &name, slug.as_deref(), &image_url, provider_id)
            {
                Ok(id) => log::info!("Added platform '{}' (id {})", name, id),
                Err(e) => {
                    log::error!("Failed to add platform: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Generate { platform, kind } => {
            let (client, platform) = sync_prerequisites(&conn, args.request_delay_ms, &platform);
            match sync::generate(&mut conn, &client, &data_dir, &platform, kind).await {
                Ok(outcome) => log::info!(
                    "Generated {} {} for {} (snapshot: {})",
                    outcome.count,
                    kind.plural(),
                    platform.slug,
                    outcome.snapshot_path.display()
                ),
                Err(e) => {
                    log::error!("Generate failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Update { platform, kind } => {
            let (client, platform) = sync_prerequisites(&conn, args.request_delay_ms, &platform);
            match sync::update(&conn, &client, &data_dir, &platform, kind).await {
                Ok(outcome) => log::info!(
                    "Added {} new {} for {} (snapshot: {})",
                    outcome.count,
                    kind.plural(),
                    platform.slug,
                    outcome.snapshot_path.display()
                ),
                Err(e) => {
                    log::error!("Update failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Purge { platform, kind } => {
            let platform = lookup_platform(&conn, &platform);
            match sync::purge(&conn, &data_dir, &platform, kind) {
                Ok(removed) => {
                    if removed {
                        log::info!("Snapshot removed for {}/{}", platform.slug, kind.plural());
                    } else {
                        log::info!("No snapshot file for {}/{}", platform.slug, kind.plural());
                    }
                }
                Err(e) => {
                    log::error!("Purge failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::LoadSample => {
            if let Err(e) = database::load_sample(&conn) {
                log::error!("Failed to load sample data: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn tmdb_client(request_delay_ms: u64) -> dondever::Result<TmdbClient> {
    Ok(TmdbClient::from_env()?.with_request_delay(Duration::from_millis(request_delay_ms)))
}

fn sync_prerequisites(
    conn: &Connection,
    request_delay_ms: u64,
    slug: &str,
) -> (TmdbClient, database::Platform) {
    let client = match tmdb_client(request_delay_ms) {
        Ok(client) => client,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    (client, lookup_platform(conn, slug))
}

fn lookup_platform(conn: &Connection, slug: &str) -> database::Platform {
    match database::get_platform_by_slug(conn, slug) {
        Ok(Some(platform)) => platform,
        Ok(None) => {
            log::error!("Platform '{}' not found", slug);
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("Failed to look up platform: {}", e);
            std::process::exit(1);
        }
    }
}
