//! Configuration management for the `PlaceScout` service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::PlaceScoutError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `PlaceScout` service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceScoutConfig {
    /// Discovery pipeline settings
    pub discovery: DiscoveryConfig,
    /// Tile cache settings
    pub cache: CacheConfig,
    /// Supabase/PostgREST backend settings
    pub supabase: SupabaseConfig,
    /// Overpass POI service settings
    pub overpass: OverpassConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// HTTP server settings
    pub server: ServerConfig,
}

/// Discovery pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Smallest accepted search radius in meters
    #[serde(default = "default_radius_min")]
    pub radius_min_meters: f64,
    /// Largest accepted search radius in meters
    #[serde(default = "default_radius_max")]
    pub radius_max_meters: f64,
    /// Result limit applied when the caller does not specify one
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// How far ahead the schedule join looks, in days
    #[serde(default = "default_lookahead_days")]
    pub schedule_lookahead_days: i64,
    /// Radius cap for the external POI service in meters
    #[serde(default = "default_poi_radius_cap")]
    pub poi_radius_cap_meters: f64,
    /// Element cap for the external POI service
    #[serde(default = "default_poi_max_elements")]
    pub poi_max_elements: usize,
    /// Attach per-source debug counts to venue responses
    #[serde(default)]
    pub venue_debug: bool,
}

/// Tile cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: i64,
    /// Maximum entries kept per tile before oldest-first eviction
    #[serde(default = "default_max_entries_per_tile")]
    pub max_entries_per_tile: usize,
    /// Maximum items stored per entry; also caps the request limit
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// Supabase/PostgREST backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Base URL of the PostgREST API
    #[serde(default = "default_supabase_url")]
    pub base_url: String,
    /// Service key; optional against a local development stack
    pub service_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u64,
}

/// Overpass POI service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverpassConfig {
    /// Overpass interpreter endpoint
    #[serde(default = "default_overpass_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_overpass_timeout")]
    pub timeout_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_server_port")]
    pub port: u16,
}

// Default value functions
fn default_radius_min() -> f64 {
    100.0
}

fn default_radius_max() -> f64 {
    50_000.0
}

fn default_limit() -> usize {
    20
}

fn default_lookahead_days() -> i64 {
    45
}

fn default_poi_radius_cap() -> f64 {
    10_000.0
}

fn default_poi_max_elements() -> usize {
    60
}

fn default_cache_ttl() -> i64 {
    900
}

fn default_max_entries_per_tile() -> usize {
    24
}

fn default_max_items() -> usize {
    100
}

fn default_cache_location() -> String {
    "~/.cache/placescout".to_string()
}

fn default_supabase_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_overpass_timeout() -> u64 {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for PlaceScoutConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig {
                radius_min_meters: default_radius_min(),
                radius_max_meters: default_radius_max(),
                default_limit: default_limit(),
                schedule_lookahead_days: default_lookahead_days(),
                poi_radius_cap_meters: default_poi_radius_cap(),
                poi_max_elements: default_poi_max_elements(),
                venue_debug: false,
            },
            cache: CacheConfig {
                ttl_seconds: default_cache_ttl(),
                max_entries_per_tile: default_max_entries_per_tile(),
                max_items: default_max_items(),
                location: default_cache_location(),
            },
            supabase: SupabaseConfig {
                base_url: default_supabase_url(),
                service_key: None,
                timeout_seconds: default_backend_timeout(),
            },
            overpass: OverpassConfig {
                base_url: default_overpass_url(),
                timeout_seconds: default_overpass_timeout(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            server: ServerConfig {
                port: default_server_port(),
            },
        }
    }
}

impl PlaceScoutConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides with PLACESCOUT_ prefix
        builder = builder.add_source(
            Environment::with_prefix("PLACESCOUT")
                .separator("_")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: PlaceScoutConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("placescout").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.discovery.radius_min_meters <= 0.0 {
            self.discovery.radius_min_meters = default_radius_min();
        }
        if self.discovery.radius_max_meters <= 0.0 {
            self.discovery.radius_max_meters = default_radius_max();
        }
        if self.discovery.default_limit == 0 {
            self.discovery.default_limit = default_limit();
        }
        if self.discovery.schedule_lookahead_days <= 0 {
            self.discovery.schedule_lookahead_days = default_lookahead_days();
        }
        if self.cache.ttl_seconds <= 0 {
            self.cache.ttl_seconds = default_cache_ttl();
        }
        if self.cache.max_entries_per_tile == 0 {
            self.cache.max_entries_per_tile = default_max_entries_per_tile();
        }
        if self.cache.max_items == 0 {
            self.cache.max_items = default_max_items();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.supabase.base_url.is_empty() {
            self.supabase.base_url = default_supabase_url();
        }
        if self.overpass.base_url.is_empty() {
            self.overpass.base_url = default_overpass_url();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.discovery.radius_min_meters >= self.discovery.radius_max_meters {
            return Err(PlaceScoutError::config(
                "Minimum search radius must be smaller than the maximum radius",
            )
            .into());
        }

        if self.discovery.radius_max_meters > 200_000.0 {
            return Err(
                PlaceScoutError::config("Maximum search radius cannot exceed 200 km").into(),
            );
        }

        if self.cache.ttl_seconds > 7 * 24 * 60 * 60 {
            return Err(
                PlaceScoutError::config("Cache TTL cannot exceed 604800 seconds (1 week)").into(),
            );
        }

        if self.cache.max_items > 500 {
            return Err(
                PlaceScoutError::config("Cache item cap cannot exceed 500 items").into(),
            );
        }

        if self.discovery.default_limit > self.cache.max_items {
            return Err(PlaceScoutError::config(
                "Default limit cannot exceed the cache item cap",
            )
            .into());
        }

        if self.discovery.poi_max_elements > 200 {
            return Err(
                PlaceScoutError::config("POI element cap cannot exceed 200 elements").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(PlaceScoutError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(PlaceScoutError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Supabase", &self.supabase.base_url),
            ("Overpass", &self.overpass.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(PlaceScoutError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Expand a leading `~` in the cache location
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        if let Some(rest) = self.cache.location.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.cache.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlaceScoutConfig::default();
        assert_eq!(config.discovery.radius_min_meters, 100.0);
        assert_eq!(config.discovery.radius_max_meters, 50_000.0);
        assert_eq!(config.cache.ttl_seconds, 900);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 8080);
        assert!(config.supabase.service_key.is_none());
    }

    #[test]
    fn test_default_config_validates() {
        let config = PlaceScoutConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_radius_ordering() {
        let mut config = PlaceScoutConfig::default();
        config.discovery.radius_min_meters = 60_000.0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("smaller than"));
    }

    #[test]
    fn test_config_validation_ttl_bound() {
        let mut config = PlaceScoutConfig::default();
        config.cache.ttl_seconds = 8 * 24 * 60 * 60;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TTL"));
    }

    #[test]
    fn test_config_validation_limit_vs_cap() {
        let mut config = PlaceScoutConfig::default();
        config.discovery.default_limit = 200;
        config.cache.max_items = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = PlaceScoutConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_backend_url() {
        let mut config = PlaceScoutConfig::default();
        config.supabase.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_path_generation() {
        let path = PlaceScoutConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("placescout"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
