use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use deskserver::config::AppConfig;
use deskserver::departments::configure_departments_routes;
use deskserver::profiles::configure_profiles_routes;
use deskserver::routing::{configure_routing_routes, GeminiClient};
use deskserver::shared::blob::create_blob_client;
use deskserver::shared::db::{create_pool, run_migrations};
use deskserver::shared::state::AppState;
use deskserver::stats::configure_stats_routes;
use deskserver::tickets::configure_tickets_routes;
use deskserver::web::auth::AuthConfig;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "deskserver",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url)?;
    run_migrations(&pool)?;

    let blob = create_blob_client(&config.blob).await;
    if blob.is_none() {
        tracing::warn!("no blob store endpoint configured; attachment cleanup is disabled");
    }

    let advisor = GeminiClient::new(
        config.advisor.api_key.clone(),
        config.advisor.model.clone(),
        config.advisor.base_url.clone(),
    );

    let state = Arc::new(AppState {
        conn: pool,
        advisor: Arc::new(advisor),
        blob,
        bucket: config.blob.bucket.clone(),
        auth: AuthConfig::new(config.jwt_secret.clone()),
    });

    let app = Router::new()
        .merge(configure_tickets_routes())
        .merge(configure_departments_routes())
        .merge(configure_profiles_routes())
        .merge(configure_routing_routes())
        .merge(configure_stats_routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
