//! Error types and handling for `PlaceScout`

use thiserror::Error;

/// Main error type for the `PlaceScout` discovery service
#[derive(Error, Debug)]
pub enum PlaceScoutError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Backend/API communication errors
    #[error("Source error: {message}")]
    Source { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl PlaceScoutError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new source error
    pub fn source<S: Into<String>>(message: S) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PlaceScoutError::Config { .. } => {
                "Configuration error. Please check your config file and backend settings.".to_string()
            }
            PlaceScoutError::Source { .. } => {
                "Unable to reach the discovery data sources. Please try again later.".to_string()
            }
            PlaceScoutError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            PlaceScoutError::Cache { .. } => {
                "Cache operation failed. You may need to clear the cache directory.".to_string()
            }
            PlaceScoutError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            PlaceScoutError::General { message } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = PlaceScoutError::config("missing backend url");
        assert!(matches!(config_err, PlaceScoutError::Config { .. }));

        let source_err = PlaceScoutError::source("connection failed");
        assert!(matches!(source_err, PlaceScoutError::Source { .. }));

        let validation_err = PlaceScoutError::validation("invalid coordinates");
        assert!(matches!(validation_err, PlaceScoutError::Validation { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = PlaceScoutError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let source_err = PlaceScoutError::source("test");
        assert!(source_err.user_message().contains("Unable to reach"));

        let validation_err = PlaceScoutError::validation("test input");
        assert!(validation_err.user_message().contains("test input"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let scout_err: PlaceScoutError = io_err.into();
        assert!(matches!(scout_err, PlaceScoutError::Io { .. }));
    }
}
