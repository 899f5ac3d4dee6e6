//! PostgREST-backed implementations of the source ports
//!
//! The owned data (activities, venues, sessions, and the spatial RPC) lives
//! behind a Supabase/PostgREST API. Schema drift shows up here as error
//! bodies (`42703` for a missing column, `PGRST200` for a missing embedded
//! relationship); those are translated into the typed [`StoreError`]
//! variants the adapters' negotiation loops react to.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::SessionRow;

use super::{
    ActivityQuery, ActivityRow, ActivityStore, ScheduleProvider, SpatialHit, SpatialIndex,
    SpatialQuery, StoreError, VenueQuery, VenueRow, VenueTable,
};

const BASE_ACTIVITY_COLUMNS: &str = "id,name,venue_label,place_id,place_label,lat,lng";
const BASE_VENUE_COLUMNS: &str = "id,name,place_id,place_label,lat,lng";
const SESSION_COLUMNS: &str = "activity_id,starts_at,ends_at,price_minor,capacity";

/// PostgREST client for the owned tables and the spatial RPC
pub struct SupabaseRest {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SupabaseRest {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("placescout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Unavailable {
                message: format!("failed to build http client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        debug!("querying {url}");

        let response = self
            .with_auth(self.client.get(&url))
            .query(query)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("request to {table} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &body));
        }

        response.json().await.map_err(|e| StoreError::Decode {
            message: format!("failed to parse {table} response: {e}"),
        })
    }
}

/// Map a PostgREST error body to a typed store error
fn error_from_body(status: u16, body: &str) -> StoreError {
    #[derive(Deserialize)]
    struct PostgrestError {
        #[serde(default)]
        code: String,
        #[serde(default)]
        message: String,
    }

    if let Ok(parsed) = serde_json::from_str::<PostgrestError>(body) {
        if parsed.code == "42703" || parsed.message.contains("does not exist") {
            if let Some(column) = parse_missing_column(&parsed.message) {
                return StoreError::MissingColumn { column };
            }
        }
        if parsed.code == "PGRST200" || parsed.message.contains("relationship") {
            return StoreError::MissingRelation {
                relation: parse_missing_relation(&parsed.message),
            };
        }
        return StoreError::Unavailable {
            message: format!("backend returned {status}: {}", parsed.message),
        };
    }

    StoreError::Unavailable {
        message: format!("backend returned {status}"),
    }
}

/// Extract the column name from messages like
/// `column activities.price_levels does not exist`
fn parse_missing_column(message: &str) -> Option<String> {
    let rest = message.split("column ").nth(1)?;
    let token = rest.split_whitespace().next()?;
    let token = token.trim_matches(|c| c == '"' || c == '\'');
    Some(token.rsplit('.').next().unwrap_or(token).to_string())
}

/// Extract the relation name from messages like
/// `Could not find a relationship between 'activities' and 'activity_traits'`
fn parse_missing_relation(message: &str) -> String {
    let quoted: Vec<&str> = message
        .split('\'')
        .skip(1)
        .step_by(2)
        .collect();
    quoted
        .get(1)
        .or_else(|| quoted.first())
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}

fn bounds_params(query_bounds: &crate::models::BoundingBox) -> Vec<(String, String)> {
    vec![
        ("lat".into(), format!("gte.{}", query_bounds.sw.lat)),
        ("lat".into(), format!("lte.{}", query_bounds.ne.lat)),
        ("lng".into(), format!("gte.{}", query_bounds.sw.lng)),
        ("lng".into(), format!("lte.{}", query_bounds.ne.lng)),
    ]
}

/// Wire shape of an activity row; the embedded traits relation arrives as a
/// list of objects and is flattened at this boundary
#[derive(Debug, Deserialize)]
struct WireActivityRow {
    id: String,
    name: String,
    #[serde(default)]
    venue_label: Option<String>,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    place_label: Option<String>,
    lat: f64,
    lng: f64,
    #[serde(default)]
    activity_types: Option<Vec<String>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    traits: Option<Vec<WireTraitRef>>,
    #[serde(default)]
    taxonomy_categories: Option<Vec<String>>,
    #[serde(default)]
    price_levels: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct WireTraitRef {
    name: String,
}

impl From<WireActivityRow> for ActivityRow {
    fn from(row: WireActivityRow) -> Self {
        ActivityRow {
            id: row.id,
            name: row.name,
            venue_label: row.venue_label,
            place_id: row.place_id,
            place_label: row.place_label,
            lat: row.lat,
            lng: row.lng,
            activity_types: row.activity_types,
            tags: row.tags,
            traits: row
                .traits
                .map(|refs| refs.into_iter().map(|r| r.name).collect()),
            taxonomy_categories: row.taxonomy_categories,
            price_levels: row.price_levels,
        }
    }
}

#[async_trait]
impl SpatialIndex for SupabaseRest {
    async fn nearest(&self, query: &SpatialQuery) -> Result<Vec<SpatialHit>, StoreError> {
        let url = format!("{}/rest/v1/rpc/nearby_activities", self.base_url);
        debug!("calling spatial rpc at {url}");

        let body = serde_json::json!({
            "lat": query.center.lat,
            "lng": query.center.lng,
            "radius_meters": query.radius_meters,
            "max_results": query.limit,
            "activity_types": if query.activity_types.is_empty() { None } else { Some(&query.activity_types) },
            "tags": if query.tags.is_empty() { None } else { Some(&query.tags) },
        });

        let response = self
            .with_auth(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("spatial rpc failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &body));
        }

        response.json().await.map_err(|e| StoreError::Decode {
            message: format!("failed to parse spatial rpc response: {e}"),
        })
    }
}

#[async_trait]
impl ActivityStore for SupabaseRest {
    async fn activities_in_bounds(
        &self,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityRow>, StoreError> {
        let mut select = BASE_ACTIVITY_COLUMNS.to_string();
        for column in &query.columns {
            select.push(',');
            select.push_str(column.column_name());
        }
        if query.include_traits {
            select.push_str(",traits:activity_traits(name)");
        }

        let mut params = vec![("select".to_string(), select)];
        params.extend(bounds_params(&query.bounds));
        params.push(("limit".into(), query.limit.to_string()));

        let rows: Vec<WireActivityRow> = self.get_rows("activities", &params).await?;
        Ok(rows.into_iter().map(ActivityRow::from).collect())
    }
}

#[async_trait]
impl VenueTable for SupabaseRest {
    async fn venues_in_bounds(&self, query: &VenueQuery) -> Result<Vec<VenueRow>, StoreError> {
        let mut select = BASE_VENUE_COLUMNS.to_string();
        for column in &query.columns {
            select.push(',');
            select.push_str(column.column_name());
        }

        let mut params = vec![("select".to_string(), select)];
        params.extend(bounds_params(&query.bounds));
        params.push(("limit".into(), query.limit.to_string()));

        self.get_rows("venues", &params).await
    }
}

#[async_trait]
impl ScheduleProvider for SupabaseRest {
    async fn upcoming_sessions(
        &self,
        activity_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRow>, StoreError> {
        if activity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let params = vec![
            ("select".to_string(), SESSION_COLUMNS.to_string()),
            (
                "activity_id".into(),
                format!("in.({})", activity_ids.join(",")),
            ),
            ("starts_at".into(), format!("gte.{}", from.to_rfc3339())),
            ("starts_at".into(), format!("lte.{}", to.to_rfc3339())),
            ("order".into(), "starts_at.asc".into()),
        ];

        self.get_rows("activity_sessions", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_error_mapping() {
        let body = r#"{"code":"42703","message":"column activities.price_levels does not exist"}"#;
        let err = error_from_body(400, body);
        assert!(
            matches!(err, StoreError::MissingColumn { column } if column == "price_levels")
        );
    }

    #[test]
    fn test_missing_relation_error_mapping() {
        let body = r#"{"code":"PGRST200","message":"Could not find a relationship between 'activities' and 'activity_traits' in the schema cache"}"#;
        let err = error_from_body(400, body);
        assert!(
            matches!(err, StoreError::MissingRelation { relation } if relation == "activity_traits")
        );
    }

    #[test]
    fn test_other_error_maps_to_unavailable() {
        let err = error_from_body(503, "upstream unavailable");
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn test_parse_missing_column_variants() {
        assert_eq!(
            parse_missing_column("column activities.tags does not exist"),
            Some("tags".to_string())
        );
        assert_eq!(
            parse_missing_column("column \"capacity\" does not exist"),
            Some("capacity".to_string())
        );
        assert_eq!(parse_missing_column("syntax error"), None);
    }
}
