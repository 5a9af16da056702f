mod archive;
mod config;
mod error;
mod generate;
mod layout;
mod numbering;
mod pdf;
mod preview;
mod roster;
mod routes;
mod state;
mod storage;
mod templates;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sertifikat=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    crate::storage::ensure_dirs(&config.upload_folder, &config.output_folder)?;

    let state = Arc::new(state::AppState {
        config: config.clone(),
    });

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/generate", post(routes::generate_handler))
        .route("/batches/:batch_id", get(routes::view_batch))
        .route("/batches/:batch_id/preview/:index", get(routes::preview_image))
        .route("/batches/:batch_id/download", get(routes::download_archive))
        .route(
            "/batches/:batch_id/certificates/:filename",
            get(routes::download_certificate),
        )
        .route("/api/batches/:batch_id", get(routes::batch_status))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Sertifikat listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
