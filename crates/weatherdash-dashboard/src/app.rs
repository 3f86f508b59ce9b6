use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use weatherdash_core::{AppError, Config};
use weatherdash_weather::{
    Coordinates, FixedPosition, GeocodeClient, GeolocationProvider, Unit, WeatherBackend,
    WeatherClient,
};

use crate::controller::{ControllerOptions, WeatherController};
use crate::storage::{KeyValueStore, Preferences, SqliteStore};
use crate::suggestions::SuggestionService;

/// Application lifecycle: builds the controller and its collaborators from
/// configuration and tears them down on shutdown.
pub struct App {
    config: Arc<Config>,
    controller: Arc<WeatherController>,
    suggestions: Arc<SuggestionService>,
    shutdown: CancellationToken,
}

impl App {
    /// Create the application with preferences stored in the configured
    /// SQLite file.
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.config_dir).with_context(|| {
            format!("Failed to create {}", config.config_dir.display())
        })?;
        let store = SqliteStore::open(config.database_path())
            .context("Failed to open preferences database")?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create the application over an explicit preference store.
    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let timeout = config.backend.request_timeout_secs.map(Duration::from_secs);
        let backend: Arc<dyn WeatherBackend> =
            Arc::new(WeatherClient::new(&config.backend.api_url, timeout)?);

        let default_unit: Unit = config
            .weather
            .default_unit
            .parse()
            .map_err(anyhow::Error::msg)?;

        let geolocation = config.weather.location.map(|loc| {
            Arc::new(FixedPosition(Coordinates::new(loc.lat, loc.lon)))
                as Arc<dyn GeolocationProvider>
        });

        let controller = WeatherController::new(
            backend,
            Preferences::new(store),
            ControllerOptions {
                default_city: config.weather.default_city.clone(),
                default_unit,
                geolocation,
            },
        );

        let geocoder = GeocodeClient::new(
            &config.geocoding.api_url,
            config.geocoding.api_key.clone(),
            config.geocoding.suggestion_limit,
        )?;
        let suggestions = SuggestionService::new(
            geocoder,
            Duration::from_millis(config.geocoding.debounce_ms),
        );

        tracing::debug!("Weather backend at {}", config.backend.api_url);

        Ok(Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
            suggestions: Arc::new(suggestions),
            shutdown: CancellationToken::new(),
        })
    }

    /// Restore saved state and load the first dashboard.
    pub async fn initialize(&self) {
        tracing::info!("Initializing dashboard");
        self.controller.initialize().await;
        match self.controller.error_message() {
            Some(message) => tracing::warn!("Dashboard initialized with error: {}", message),
            None => tracing::info!("Dashboard initialized"),
        }
    }

    /// Restore saved preferences without fetching anything.
    ///
    /// Returns a notice for the user when the store could not be read; the
    /// session then runs on defaults.
    pub fn restore(&self) -> Option<&'static str> {
        match self.controller.restore() {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to restore preferences: {}", e);
                Some(AppError::from(e).user_message())
            }
        }
    }

    /// Run `work`, abandoning it if shutdown is requested first.
    pub async fn run_until_shutdown<F>(&self, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        tokio::select! {
            result = work => result,
            _ = self.shutdown.cancelled() => {
                tracing::info!("Shutdown requested, abandoning current command");
                Ok(())
            }
        }
    }

    pub fn controller(&self) -> Arc<WeatherController> {
        self.controller.clone()
    }

    pub fn suggestions(&self) -> Arc<SuggestionService> {
        self.suggestions.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancelling it ends [`App::run_until_shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutting down");
        self.suggestions.cancel();
        self.shutdown.cancel();
    }
}
