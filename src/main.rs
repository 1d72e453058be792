mod config;
mod db;
mod error;
mod models;
mod routes;
mod scheduling;

use std::sync::Arc;

use crate::{config::Config, models::AppState, scheduling::BookingPolicy};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let schedule = cfg.schedule()?;
    tracing::info!(
        slot_granularity = %schedule.granularity,
        hours_file = ?cfg.clinic_hours_file,
        "schedule loaded"
    );

    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    let state = AppState {
        db: pool,
        policy: Arc::new(BookingPolicy::new(schedule)),
    };

    // Browser front-ends call the API from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
