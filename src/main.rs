use anyhow::Context;
use axum::http::HeaderValue;
use kidsmarket_api::auth::{AuthConfig, AuthService};
use kidsmarket_api::config;
use kidsmarket_api::db;
use kidsmarket_api::events::{self, EventSender};
use kidsmarket_api::handlers::AppServices;
use kidsmarket_api::services::{CheckoutService, FulfillmentService, ListingService};
use kidsmarket_api::stripe::StripeClient;
use kidsmarket_api::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    info!(
        environment = %app_config.environment,
        "starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db_pool = Arc::new(db::establish_connection_from_app_config(&app_config).await?);
    if app_config.auto_migrate {
        db::run_migrations(&db_pool).await?;
        info!("database migrations applied");
    }

    let (event_tx, event_rx) = mpsc::channel(app_config.event_channel_capacity);
    tokio::spawn(events::process_events(event_rx));
    let event_sender = Arc::new(EventSender::new(event_tx));

    let auth_service = Arc::new(AuthService::new(AuthConfig::new(
        app_config.jwt_secret.clone(),
        app_config.auth_issuer.clone(),
        app_config.auth_audience.clone(),
        Duration::from_secs(app_config.jwt_expiration as u64),
    )));

    let stripe_client = Arc::new(StripeClient::new(
        app_config.stripe_secret_key.clone(),
        app_config.stripe_api_base.clone(),
    )?);

    let services = Arc::new(AppServices {
        listings: ListingService::new(db_pool.clone(), event_sender.clone()),
        checkout: CheckoutService::new(
            db_pool.clone(),
            stripe_client,
            event_sender.clone(),
            app_config.public_origin.clone(),
            app_config.checkout_currency.clone(),
        ),
        fulfillment: FulfillmentService::new(db_pool.clone(), event_sender.clone()),
    });

    let config = Arc::new(app_config);
    let state = AppState {
        db: db_pool,
        config: config.clone(),
        services,
        event_sender,
    };

    let cors = build_cors_layer(&config);
    let app = build_router(state, auth_service)
        .layer(cors)
        .layer(CompressionLayer::new());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn build_cors_layer(config: &config::AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        warn!("CORS is permissive; do not use this setting in production");
        return CorsLayer::permissive();
    }

    match &config.cors_allowed_origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install ctrl-c handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => warn!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
