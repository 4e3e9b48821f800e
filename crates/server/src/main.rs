use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_core::{
    config_path, load_config, validate_config, ArchivalScheduler, Clock, Collaborators,
    ConfigStore, DiscordClient, EngineConfig, FsTranscriptStore, SqliteConfigStore,
    SqliteTicketRegistry, SystemClock, TicketLifecycleEngine,
};
use warden_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = config_path();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Discord API: {}", config.discord.api_base);

    // Stores
    let configs: Arc<dyn ConfigStore> = Arc::new(
        SqliteConfigStore::new(&config.database.path)
            .context("Failed to create guild config store")?,
    );
    info!("Guild config store initialized");

    let registry = Arc::new(
        SqliteTicketRegistry::new(&config.database.path, Arc::clone(&configs))
            .context("Failed to create ticket registry")?
            .with_fallback_retention(config.retention),
    );
    info!("Ticket registry initialized");

    // Chat platform client serves channels, notifications and member lookups
    let discord = Arc::new(
        DiscordClient::new(&config.discord, config.channel_retry.clone())
            .context("Failed to create Discord client")?,
    );

    let transcripts = Arc::new(FsTranscriptStore::new(&config.transcripts.directory));
    info!(
        "Transcripts stored under {:?}",
        config.transcripts.directory
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let engine = Arc::new(TicketLifecycleEngine::new(
        EngineConfig {
            transcript_max_messages: config.transcripts.max_messages,
        },
        configs,
        registry,
        Collaborators {
            channels: discord.clone(),
            notifier: discord.clone(),
            members: discord,
            transcripts,
            clock: Arc::clone(&clock),
        },
    ));

    // Archival scheduler
    let scheduler = Arc::new(ArchivalScheduler::new(
        config.scheduler.clone(),
        Arc::clone(&engine),
        clock,
    ));
    if config.scheduler.enabled {
        scheduler.start();
    } else {
        info!("Archival scheduler disabled in config");
    }

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        engine,
        Arc::clone(&scheduler),
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if scheduler.is_running() {
        info!("Stopping archival scheduler...");
        scheduler.stop();
    }

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
