//! Social Automation Backend Service
//!
//! Main entry point. This service provides:
//! - HTTP API for users, wallets, X account binding and Twitter analysis
//! - Background sweeping of expired OAuth states

use social_automation_backend::config::AppConfig;
use social_automation_backend::database::{create_pool, run_migrations};
use social_automation_backend::error::{AppError, AppResult};
use social_automation_backend::oauth::StateJanitor;
use social_automation_backend::{router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "social_automation_backend={},sqlx=warn,tower_http=info",
            config.log_level
        )
        .into()
    });

    if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Social Automation Backend Starting                ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);
    info!("Analysis service: {}", config.analysis.service_url);
    if config.x_oauth.client_id.is_empty() {
        warn!("X_CLIENT_ID is not set - X account binding will fail at the token endpoint");
    }

    // =========================================================================
    // STORAGE SETUP
    // =========================================================================
    let app_state = match config.database.clone() {
        Some(db_config) => {
            info!("Connecting to database...");
            let pool = create_pool(&db_config).await.map_err(|e| {
                error!("Failed to create database pool: {}", e);
                AppError::Database(e)
            })?;
            info!("Max connections: {}", db_config.max_connections);

            info!("Running database migrations...");
            run_migrations(&pool, None).await.map_err(|e| {
                error!("Database migration failed: {}", e);
                AppError::Database(e)
            })?;
            info!("Database migrations completed successfully");

            AppState::postgres(pool, config.clone())?
        }
        None => {
            warn!("DATABASE_URL not set - using in-memory storage, data is lost on restart");
            AppState::in_memory(config.clone())?
        }
    };
    let app_state = Arc::new(app_state);
    info!("✓ Application state initialized");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let janitor_handle = if config.x_oauth.state_cleanup_interval_secs > 0 {
        let janitor = StateJanitor::new(app_state.oauth.clone());
        let handle = tokio::spawn(async move {
            janitor.start().await;
        });
        info!(
            "✓ OAuth state janitor started ({}s interval)",
            config.x_oauth.state_cleanup_interval_secs
        );
        Some(handle)
    } else {
        warn!("OAuth state janitor disabled (X_OAUTH_STATE_CLEANUP_SECS=0)");
        None
    };

    // =========================================================================
    // HTTP SERVER
    // =========================================================================
    if config.enable_test_routes {
        warn!("Test and debug OAuth routes are mounted");
    }
    let app = router(app_state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Social Automation Backend Ready!                  ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  HTTP API:     {}", addr);
    info!("║  Environment:  {}", config.environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = server_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = janitor_handle {
                handle.await.ok();
            } else {
                // Never completes when the janitor is disabled
                futures::future::pending::<()>().await;
            }
        } => {
            error!("OAuth state janitor exited unexpectedly");
        }
    }

    info!("Social automation backend shutdown complete");
    Ok(())
}
