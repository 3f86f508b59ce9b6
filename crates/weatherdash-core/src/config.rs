use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Overrides `backend.api_url`.
pub const API_URL_ENV: &str = "WEATHERDASH_API_URL";
/// Overrides `geocoding.api_key`.
pub const GEOCODING_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather proxy settings
    pub backend: BackendConfig,

    /// City suggestion lookups
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Dashboard defaults
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the weather proxy (serves /weather/current, /forecast, /location)
    pub api_url: String,

    /// Per-request timeout. Unset means requests may wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of the geocoding API
    #[serde(default = "default_geocoding_url")]
    pub api_url: String,

    /// API key for the geocoding service (can be set via environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum number of suggestions per lookup
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: u32,

    /// Quiet period after the last keystroke before a lookup is issued
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_geocoding_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_suggestion_limit() -> u32 {
    5
}

fn default_debounce_ms() -> u64 {
    400
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_url: default_geocoding_url(),
            api_key: None,
            suggestion_limit: default_suggestion_limit(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// A fixed position, used in place of device geolocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedLocation {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// City shown when geolocation is unavailable
    #[serde(default = "default_city")]
    pub default_city: String,

    /// "metric" or "imperial"; used until the user toggles the unit
    #[serde(default = "default_unit")]
    pub default_unit: String,

    /// When set, acts as the geolocation provider
    #[serde(default)]
    pub location: Option<FixedLocation>,
}

fn default_city() -> String {
    "Surat".to_string()
}

fn default_unit() -> String {
    "metric".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_city: default_city(),
            default_unit: default_unit(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding persisted preferences, relative to `config_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "state.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weatherdash");

        Self {
            config_dir,
            backend: BackendConfig::default(),
            geocoding: GeocodingConfig::default(),
            weather: WeatherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, writing defaults there on first run.
    ///
    /// Environment overrides are applied on every load and never written back.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        Self::load_with_env(config_path, |name| std::env::var(name).ok())
    }

    fn load_with_env(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError(e.to_string()))
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            config
        };

        config.apply_env_overrides(env);
        Ok(config)
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = set(API_URL_ENV) {
            tracing::debug!("Using {} from the environment", API_URL_ENV);
            self.backend.api_url = url;
        }
        if let Some(key) = set(GEOCODING_KEY_ENV) {
            self.geocoding.api_key = Some(key);
        }
    }

    /// Load configuration, let `overrides` adjust it, then validate the result.
    pub fn load_validated_with(
        overrides: impl FnOnce(&mut Self),
    ) -> Result<(Self, ValidationResult)> {
        let mut config = Self::load()?;
        overrides(&mut config);
        config.into_validated()
    }

    /// Validate, failing with [`ConfigError::Invalid`] on errors; warnings are logged.
    pub fn into_validated(self) -> Result<(Self, ValidationResult)> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.backend.api_url, "backend.api_url", &mut result);
        self.validate_url(&self.geocoding.api_url, "geocoding.api_url", &mut result);

        if self.backend.request_timeout_secs == Some(0) {
            result.add_error(
                "backend.request_timeout_secs",
                "Timeout must be greater than 0 (omit it to disable)",
            );
        }

        if self.geocoding.api_key.as_deref().map_or(true, str::is_empty) {
            result.add_warning(
                "geocoding.api_key",
                "No geocoding API key - city suggestions will be unavailable",
            );
        }

        if self.geocoding.suggestion_limit == 0 {
            result.add_error(
                "geocoding.suggestion_limit",
                "Suggestion limit must be greater than 0",
            );
        }

        if self.geocoding.debounce_ms > 5000 {
            result.add_warning(
                "geocoding.debounce_ms",
                "Suggestion debounce is unusually long (>5s)",
            );
        }

        if self.weather.default_city.trim().is_empty() {
            result.add_error("weather.default_city", "Default city must not be empty");
        }

        if !matches!(self.weather.default_unit.as_str(), "metric" | "imperial") {
            result.add_error(
                "weather.default_unit",
                format!(
                    "Unit must be \"metric\" or \"imperial\", got: {}",
                    self.weather.default_unit
                ),
            );
        }

        if let Some(location) = self.weather.location {
            if !(-90.0..=90.0).contains(&location.lat) {
                result.add_error("weather.location.lat", "Latitude must be within [-90, 90]");
            }
            if !(-180.0..=180.0).contains(&location.lon) {
                result.add_error(
                    "weather.location.lon",
                    "Longitude must be within [-180, 180]",
                );
            }
        }

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name must not be empty");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Path of the SQLite file used for persisted dashboard state.
    pub fn database_path(&self) -> PathBuf {
        self.config_dir.join(&self.storage.database_file)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no platform config directory".to_string()))?
            .join("weatherdash");

        Ok(config_dir.join("config.toml"))
    }
}
