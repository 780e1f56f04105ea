//! Course Notes Development Server
//!
//! Serves the course notes REST API from memory so the `notes` CLI can be
//! exercised without the production backend.
//!
//! # Configuration
//!
//! Environment variables:
//! - `NOTES_SERVER_PORT`: Port to listen on (default: 5555)
//! - `NOTES_SERVER_CONFIG`: Path to config file (default: ~/.config/coursenotes-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! users:
//!   - username: "ada"
//!     email: "ada@example.com"
//!     password: "analytical"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `POST /api/v1/login`: Sets the session and CSRF cookies
//! - `/api/v1/profile/{id}`, `/api/v1/courses/...`: Session required

use coursenotes::server::{router, AppState, SeedUser, Store};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    users: Vec<SeedUser>,
}

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Path to config file
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("NOTES_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5555);

        let config_path = std::env::var("NOTES_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("coursenotes-server")
                    .join("config.yaml")
            });

        Self { port, config_path }
    }
}

/// Reads seed users; a missing or broken file starts the server empty.
fn load_users(config_path: &Path) -> Vec<SeedUser> {
    match std::fs::read_to_string(config_path) {
        Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
            Ok(config) => config.users,
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                Vec::new()
            }
        },
        Err(e) => {
            tracing::warn!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            );
            tracing::warn!("No users loaded - every login will fail");
            Vec::new()
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notes_server=info,coursenotes=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Config file: {}", config.config_path.display());

    let store = Store::seeded(&load_users(&config.config_path));
    tracing::info!("Loaded {} user(s)", store.user_count());

    let app = router(AppState::new(store));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
