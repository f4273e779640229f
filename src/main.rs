//! Guest concierge - chat-driven guest interaction engine
//!
//! Handles RSVP changes, congratulation uploads, QR check-in at the venue
//! checkpoints and the display screen playlist for a wedding reception.

mod api;
mod config;
mod media;
mod playlist;
mod qr;
mod registry;
mod roster;
mod runtime;
mod session;
mod state_machine;
mod store;
mod transport;

use api::{create_router, AppState};
use config::Config;
use media::FsMediaStorage;
use playlist::Playlist;
use qr::RqrrDecoder;
use registry::SqliteRegistry;
use roster::AdminRosters;
use runtime::Dispatcher;
use session::SessionRepository;
use std::net::SocketAddr;
use std::sync::Arc;
use store::{KeySpace, KvStore, MemoryStore, RedisStore};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{LogTransport, Transport, WebhookTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guest_concierge=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;
    let injections = config.load_injections()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path.display(), "Opening guest registry");
    let registry = Arc::new(SqliteRegistry::open(&config.db_path)?);

    let store: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Using Redis session store");
            Arc::new(RedisStore::connect(url).await?)
        }
        None => {
            tracing::warn!("CONCIERGE_REDIS_URL not set, sessions are kept in process memory");
            Arc::new(MemoryStore::new())
        }
    };

    let transport: Arc<dyn Transport> = match &config.gateway_url {
        Some(url) => Arc::new(WebhookTransport::new(url.as_str())?),
        None => {
            tracing::warn!("CONCIERGE_GATEWAY_URL not set, outbound messages are only logged");
            Arc::new(LogTransport)
        }
    };

    let keys = KeySpace::new(config.key_prefix.clone());
    let sessions = SessionRepository::new(store.clone(), keys.clone(), config.session_ttl);
    let rosters = Arc::new(AdminRosters::new(
        store.clone(),
        keys.clone(),
        config.roster_ttl,
        config.roster_seed.clone(),
    ));
    let playlist = Arc::new(Playlist::new(
        store,
        keys,
        config.playlist_ttl,
        config.playlist_defaults.clone(),
        injections,
    ));

    tracing::info!(
        operations_commands = config.features.operations_commands,
        broadcast_mode = config.features.broadcast_mode,
        media_dir = %config.media_dir.display(),
        "Engine configured"
    );

    let dispatcher = Dispatcher::new(
        registry,
        transport,
        Arc::new(FsMediaStorage::new(&config.media_dir)),
        Arc::new(RqrrDecoder),
        sessions,
        rosters,
        playlist.clone(),
        config.features,
        config.reminder,
    );

    let state = AppState::new(dispatcher, playlist);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Guest concierge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
