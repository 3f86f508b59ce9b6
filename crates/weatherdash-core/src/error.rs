//! Centralized error types for weatherdash.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    ///
    /// These messages are designed to be actionable and non-technical.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The weather server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Local persistence errors (unit preference, favorites, recent searches).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage operation failed: {0}")]
    OperationFailed(String),

    #[error("Stored value for '{key}' is unreadable: {message}")]
    Corrupt { key: String, message: String },
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Unavailable(_) => "Saved settings are unavailable. Using defaults.",
            StorageError::OperationFailed(_) => "Failed to save your settings.",
            StorageError::Corrupt { .. } => "Saved settings could not be read. Using defaults.",
        }
    }
}

/// Configuration errors, carried inside `anyhow` errors from [`crate::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "No configuration directory is available.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Weather service errors, as seen by the rest of the application.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather service reported: {0}")]
    Service(String),

    #[error("Unexpected weather payload: {0}")]
    MalformedResponse(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::Service(_) => "Failed to fetch weather data",
            WeatherError::MalformedResponse(_) => {
                "The weather service returned data we could not read."
            }
            WeatherError::LocationUnavailable(_) => {
                "Your location is unavailable. Search for a city instead."
            }
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::DatabaseBusy
                ) =>
            {
                StorageError::Unavailable(self.to_string())
            }
            _ => StorageError::OperationFailed(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let messages = [
            NetworkError::Timeout.user_message(),
            StorageError::OperationFailed("x".into()).user_message(),
            ConfigError::Invalid("x".into()).user_message(),
            WeatherError::Service("x".into()).user_message(),
            WeatherError::LocationUnavailable("x".into()).user_message(),
        ];

        for message in messages {
            assert!(!message.is_empty());
        }
    }

    #[test]
    fn test_app_error_conversion() {
        let err: AppError = StorageError::Unavailable("locked".into()).into();
        assert!(matches!(err, AppError::Storage(StorageError::Unavailable(_))));
    }

    #[test]
    fn test_user_message_propagation() {
        let err = AppError::Weather(WeatherError::Service("boom".into()));
        assert_eq!(err.user_message(), "Failed to fetch weather data");
    }

    #[test]
    fn test_server_error_message_depends_on_status() {
        let outage = NetworkError::ServerError {
            status: 503,
            message: "unavailable".into(),
        };
        let rejected = NetworkError::ServerError {
            status: 400,
            message: "bad".into(),
        };
        assert!(outage.user_message().contains("try again later"));
        assert_eq!(rejected.user_message(), "The request failed. Please try again.");
    }

    #[test]
    fn test_sqlite_error_maps_to_operation_failed() {
        let err = rusqlite::Error::QueryReturnedNoRows.into_storage_error();
        assert!(matches!(err, StorageError::OperationFailed(_)));
    }
}
