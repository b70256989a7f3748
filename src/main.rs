use std::process::ExitCode;
use std::sync::Arc;

use rental_core::auth::{seed, TokenService};
use rental_core::clients::HttpVehicleDirectory;
use rental_core::config::AppConfig;
use rental_core::{create_router, db, AppState, ServiceSettings, Stores};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Rental Core - Starting...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let config = AppConfig::from_env().map_err(|e| format!("Invalid configuration: {}", e))?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| format!("Failed to create database pool: {}", e))?;

    db::run_migrations(&pool)
        .await
        .map_err(|e| format!("Failed to run database migrations: {}", e))?;

    let created = seed::reconcile_roles(&pool)
        .await
        .map_err(|e| format!("Failed to provision roles: {}", e))?;
    tracing::info!("Role provisioning done ({} created)", created);

    let vehicles = HttpVehicleDirectory::new(&config.vehicle_service_url, config.call_policy.timeout)
        .map_err(|e| format!("Failed to build vehicle client: {}", e))?;

    let state = AppState::new(
        Stores::postgres(pool),
        Arc::new(vehicles),
        Arc::new(TokenService::new(config.jwt_secret.clone())),
        ServiceSettings::from(&config),
    );

    if let Some(interval) = config.reconcile_interval {
        let orchestrator = state.orchestrator.clone();
        tracing::info!("Reconciling pending sagas every {:?}", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = orchestrator.reconcile_pending().await {
                    tracing::warn!("Periodic reconciliation failed: {}", e);
                }
            }
        });
    }

    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("Rental Core is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))
}
