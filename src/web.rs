use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::engine::DiscoveryEngine;

pub async fn run(engine: Arc<DiscoveryEngine>, port: u16) {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new().nest("/api", api::router(engine)).layer(cors);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tracing::info!("Discovery API running at http://localhost:{}", port);
    axum::serve(listener, app).await.unwrap();
}
