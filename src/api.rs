//! HTTP API: thin glue between query-string parameters and the engine

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::{DiscoveryEngine, DiscoveryOptions, VenueOptions};
use crate::error::PlaceScoutError;
use crate::filters::{CapacityKey, RawFilters, TimeWindow};
use crate::models::{Coordinates, DiscoveryQuery, DiscoveryResult, VenueDiscovery};

/// Query-string parameters shared by both discovery endpoints
#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    pub lat: f64,
    pub lng: f64,
    pub radius: Option<f64>,
    pub limit: Option<usize>,
    /// Comma-separated lists
    pub types: Option<String>,
    pub tags: Option<String>,
    pub traits: Option<String>,
    pub categories: Option<String>,
    pub price: Option<String>,
    pub capacity: Option<String>,
    pub time: Option<String>,
    pub bypass_cache: Option<bool>,
    // venue endpoint only
    pub activity: Option<String>,
    pub include_unverified: Option<bool>,
}

impl NearbyParams {
    fn to_query(&self, default_radius: f64) -> DiscoveryQuery {
        DiscoveryQuery {
            center: Coordinates::new(self.lat, self.lng),
            radius_meters: self.radius.unwrap_or(default_radius),
            bounds: None,
            limit: self.limit.unwrap_or(0),
            filters: RawFilters {
                activity_types: split_list(self.types.as_deref()),
                tags: split_list(self.tags.as_deref()),
                traits: split_list(self.traits.as_deref()),
                taxonomy_categories: split_list(self.categories.as_deref()),
                price_levels: split_list(self.price.as_deref())
                    .iter()
                    .filter_map(|v| v.parse().ok())
                    .collect(),
                capacity: self.capacity.as_deref().map(CapacityKey::parse),
                time_window: self.time.as_deref().map(TimeWindow::parse),
            },
        }
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Error body returned by the API
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl From<PlaceScoutError> for ApiFailure {
    fn from(error: PlaceScoutError) -> Self {
        let status = match &error {
            PlaceScoutError::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.user_message(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiError {
                error: self.message,
            }),
        )
            .into_response()
    }
}

const DEFAULT_RADIUS_METERS: f64 = 2_000.0;

pub fn router(engine: Arc<DiscoveryEngine>) -> Router {
    Router::new()
        .route("/activities/nearby", get(nearby_activities))
        .route("/venues/nearby", get(nearby_venues))
        .route("/health", get(health))
        .with_state(engine)
}

async fn nearby_activities(
    State(engine): State<Arc<DiscoveryEngine>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<DiscoveryResult>, ApiFailure> {
    let query = params.to_query(DEFAULT_RADIUS_METERS);
    let options = DiscoveryOptions {
        bypass_cache: params.bypass_cache.unwrap_or(false),
    };

    let result = engine
        .discover_nearby_activities(&query, &options)
        .await
        .map_err(ApiFailure::from)?;
    Ok(Json(result))
}

async fn nearby_venues(
    State(engine): State<Arc<DiscoveryEngine>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<VenueDiscovery>, ApiFailure> {
    let query = params.to_query(DEFAULT_RADIUS_METERS);
    let activity = params.activity.clone().unwrap_or_default();
    let options = VenueOptions {
        include_unverified: params.include_unverified.unwrap_or(false),
        bypass_cache: params.bypass_cache.unwrap_or(false),
    };

    let discovery = engine
        .discover_nearby_venues(&query, &activity, &options)
        .await
        .map_err(ApiFailure::from)?;
    Ok(Json(discovery))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "name": "placescout",
        "version": crate::VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("a, b,,c")), vec!["a", "b", "c"]);
        assert!(split_list(None).is_empty());
        assert!(split_list(Some("")).is_empty());
    }

    #[test]
    fn test_params_to_query_parses_filters() {
        let params = NearbyParams {
            lat: 40.0,
            lng: -73.0,
            radius: Some(1500.0),
            limit: Some(10),
            types: Some("climbing,park".into()),
            tags: None,
            traits: None,
            categories: None,
            price: Some("1,2,x".into()),
            capacity: Some("small".into()),
            time: Some("evening".into()),
            bypass_cache: None,
            activity: None,
            include_unverified: None,
        };

        let query = params.to_query(2_000.0);
        assert_eq!(query.radius_meters, 1500.0);
        assert_eq!(query.limit, 10);
        assert_eq!(query.filters.activity_types, vec!["climbing", "park"]);
        assert_eq!(query.filters.price_levels, vec![1, 2]);
        assert_eq!(query.filters.capacity, Some(CapacityKey::Small));
        assert_eq!(query.filters.time_window, Some(TimeWindow::Evening));
    }
}
