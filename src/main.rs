//! market-chat server binary.
//!
//! Loads configuration, connects PostgreSQL and the realtime transport, wires
//! the chat service and serves the HTTP/WebSocket API until Ctrl-C.

use std::sync::Arc;

use axum::Router;
use http::{HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use market_chat::adapters::auth::JwtSessionValidator;
use market_chat::adapters::http::{api_router, AuthState, ChatAppState};
use market_chat::adapters::postgres::{
    PostgresConversationRepository, PostgresMessageStore, PostgresProductCatalog,
    PostgresProfileReader,
};
use market_chat::adapters::realtime::{
    InMemoryTransport, RealtimeEventBridge, RedisTransport, SubscriptionManager,
};
use market_chat::adapters::InMemoryEventBus;
use market_chat::application::{ChatPorts, ChatService};
use market_chat::config::{AppConfig, ServerConfig, TransportKind};
use market_chat::ports::{DeliveryBus, RealtimeTransport};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let pool = connect_database(&config).await?;
    let transport = connect_transport(&config).await?;

    let events = Arc::new(InMemoryEventBus::new());
    RealtimeEventBridge::new_shared(transport.clone()).register(events.as_ref());

    let service = Arc::new(ChatService::new(ChatPorts {
        conversations: Arc::new(PostgresConversationRepository::new(pool.clone())),
        messages: Arc::new(PostgresMessageStore::new(pool.clone())),
        profiles: Arc::new(PostgresProfileReader::new(pool.clone())),
        catalog: Arc::new(PostgresProductCatalog::new(pool)),
        events,
    }));
    let bus: Arc<dyn DeliveryBus> = Arc::new(SubscriptionManager::new(transport));
    let auth: AuthState = Arc::new(JwtSessionValidator::new(&config.auth));

    let app: Router = api_router(ChatAppState::new(service, bus), auth)
        .layer(cors_layer(&config.server))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "market-chat listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("market-chat stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.as_str()));

    if server.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect_database(config: &AppConfig) -> Result<PgPool, BoxError> {
    let db = &config.database;
    let pool = PgPoolOptions::new()
        .min_connections(db.min_connections)
        .max_connections(db.max_connections)
        .acquire_timeout(db.acquire_timeout())
        .idle_timeout(db.idle_timeout())
        .connect(&db.url)
        .await?;

    if db.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }
    Ok(pool)
}

async fn connect_transport(config: &AppConfig) -> Result<Arc<dyn RealtimeTransport>, BoxError> {
    match config.chat.transport {
        TransportKind::Memory => {
            tracing::info!(
                capacity = config.chat.channel_capacity,
                "using in-process realtime transport"
            );
            Ok(Arc::new(InMemoryTransport::new(config.chat.channel_capacity)))
        }
        TransportKind::Redis => {
            let transport = tokio::time::timeout(
                config.redis.timeout(),
                RedisTransport::connect(&config.redis.url),
            )
            .await
            .map_err(|_| "timed out connecting to Redis")??;
            tracing::info!("using Redis realtime transport");
            Ok(Arc::new(transport))
        }
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
