use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use placescout::cache::FjallTileStore;
use placescout::config::PlaceScoutConfig;
use placescout::engine::DiscoveryEngine;
use placescout::sources::{OverpassClient, SupabaseRest};
use placescout::web;

#[tokio::main]
async fn main() -> Result<()> {
    let config = PlaceScoutConfig::load()?;
    init_tracing(&config);

    tracing::info!(
        backend = %config.supabase.base_url,
        overpass = %config.overpass.base_url,
        "starting placescout {}",
        placescout::VERSION
    );

    let supabase = Arc::new(SupabaseRest::new(
        &config.supabase.base_url,
        config.supabase.service_key.clone(),
        config.supabase.timeout_seconds,
    )?);
    let overpass = Arc::new(OverpassClient::new(
        &config.overpass.base_url,
        config.overpass.timeout_seconds,
    )?);
    let tile_store = Arc::new(FjallTileStore::open(config.cache_path())?);

    let engine = Arc::new(DiscoveryEngine::new(
        &config,
        supabase.clone(),
        supabase.clone(),
        overpass,
        supabase.clone(),
        supabase,
        tile_store,
    ));

    web::run(engine, config.server.port).await;
    Ok(())
}

fn init_tracing(config: &PlaceScoutConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
