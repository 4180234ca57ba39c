//! drugsearch — condition → top-drugs lookup service
//!
//! Usage:
//!   drugsearch serve --port 5000                 — Launch the JSON API server
//!   drugsearch load drugsTrain.csv drugsTest.csv — Bulk-load prescription CSVs

mod auth;
mod loader;
mod routes;

use anyhow::Context;
use clap::{Parser, Subcommand};
use persistence::repository::PrescriptionRepository;
use routes::{api_router, AppState, APP_VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "drugsearch")]
#[command(about = "Drug prescription search service", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
    },
    /// Bulk-load prescription records from CSV files, replacing existing data
    Load {
        /// CSV files with drugName, condition and rating columns
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,drugsearch=debug")
    } else {
        EnvFilter::new("info,engine=info,drugsearch=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("DRUGSEARCH_DB_PATH").unwrap_or_else(|_| "data/drugsearch.db".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Load { files } => {
            cmd_load(files).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("drugsearch v{} starting...", APP_VERSION);

    let db_path = db_path();
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    match PrescriptionRepository::new(db.pool()).count_all().await {
        Ok(count) => info!("{count} prescription records ready"),
        Err(e) => warn!("Could not count prescription records: {e}"),
    }

    let state = AppState { db: Arc::new(db) };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Determine static files directory
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let app = axum::Router::new()
        .nest("/api", api_router(state))
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== drugsearch v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health    - Health check");
    println!("  POST /api/register  - Create an account");
    println!("  POST /api/login     - Obtain a bearer token");
    println!("  POST /api/logout    - Invalidate the token");
    println!("  POST /api/search    - Top drugs for a condition");
    println!("  GET  /api/history   - Past searches for the caller");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Load command — one-shot CSV bulk load
// ============================================================================

async fn cmd_load(files: Vec<PathBuf>) -> anyhow::Result<()> {
    let db_path = db_path();
    info!("Loading {} file(s) into {}", files.len(), db_path);

    let (rows, summary) = loader::read_records(&files)?;
    info!(
        "Parsed {} records ({} skipped)",
        summary.parsed, summary.skipped
    );

    let db = persistence::Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    let inserted = PrescriptionRepository::new(db.pool())
        .replace_all(&rows)
        .await
        .context("bulk load failed")?;

    info!("Done! {} prescription records loaded.", inserted);
    Ok(())
}
