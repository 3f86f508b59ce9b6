//! Session controller for the dashboard.
//!
//! Owns the current snapshot, forecast, unit, favorites and recent searches.
//! Every operation takes `&self` and the state mutex is never held across an
//! await, so one controller can be shared as `Arc<WeatherController>`.
//!
//! Each weather fetch takes a generation number when it starts. Only the
//! fetch holding the latest generation may write its result (or its error);
//! anything older is discarded when it completes.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use weatherdash_core::StorageError;
use weatherdash_weather::{
    CitySuggestion, Coordinates, FavoriteEntry, FavoriteKey, ForecastSeries, GeolocationProvider,
    Unit, WeatherBackend, WeatherError, WeatherSnapshot,
};

use crate::error_mapping::display_message;
use crate::recent::RecentSearches;
use crate::state::SessionState;
use crate::storage::Preferences;

pub const DEFAULT_CITY: &str = "Surat";
pub const INITIALIZE_FAILURE_MESSAGE: &str = "Failed to fetch initial weather data";

type Fetched = (WeatherSnapshot, ForecastSeries);

/// Result of [`WeatherController::toggle_favorite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteToggle {
    Added,
    Removed,
    /// Lookup failed or the city was already pinned under its canonical name
    Unchanged,
}

#[derive(Clone)]
pub struct ControllerOptions {
    pub default_city: String,
    pub default_unit: Unit,
    pub geolocation: Option<Arc<dyn GeolocationProvider>>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            default_city: DEFAULT_CITY.to_string(),
            default_unit: Unit::Metric,
            geolocation: None,
        }
    }
}

/// What the dashboard was last asked to show.
#[derive(Debug, Clone, PartialEq)]
enum FetchTarget {
    City(String),
    Position(Coordinates),
}

#[derive(Default)]
struct Inner {
    session: SessionState,
    recent: RecentSearches,
    in_flight: usize,
    generation: u64,
    last_target: Option<FetchTarget>,
}

/// Keeps `loading` true while at least one operation is outstanding.
struct LoadingGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl<'a> LoadingGuard<'a> {
    fn new(inner: &'a Mutex<Inner>) -> Self {
        let mut state = inner.lock();
        state.in_flight += 1;
        state.session.loading = true;
        Self { inner }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.session.loading = state.in_flight > 0;
    }
}

pub struct WeatherController {
    backend: Arc<dyn WeatherBackend>,
    preferences: Preferences,
    default_city: String,
    geolocation: Option<Arc<dyn GeolocationProvider>>,
    inner: Mutex<Inner>,
}

impl WeatherController {
    pub fn new(
        backend: Arc<dyn WeatherBackend>,
        preferences: Preferences,
        options: ControllerOptions,
    ) -> Self {
        let inner = Inner {
            session: SessionState {
                unit: options.default_unit,
                ..Default::default()
            },
            ..Default::default()
        };

        Self {
            backend,
            preferences,
            default_city: options.default_city,
            geolocation: options.geolocation,
            inner: Mutex::new(inner),
        }
    }

    // =========== Accessors ===========

    pub fn state(&self) -> SessionState {
        self.inner.lock().session.clone()
    }

    pub fn unit(&self) -> Unit {
        self.inner.lock().session.unit
    }

    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        self.inner.lock().session.favorites.clone()
    }

    pub fn recent_searches(&self) -> Vec<String> {
        self.inner.lock().recent.entries().to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().session.loading
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.lock().session.error_message.clone()
    }

    pub fn default_city(&self) -> &str {
        &self.default_city
    }

    // =========== Lifecycle ===========

    /// Load the persisted unit, favorites and recent searches.
    ///
    /// Unreadable values fall back to their defaults; only a failing store is
    /// an error.
    pub fn restore(&self) -> Result<(), StorageError> {
        let unit = self.preferences.load_unit()?;
        let favorites = self.preferences.load_favorites()?;
        let recent = self.preferences.load_recent_searches()?;

        let mut inner = self.inner.lock();
        if let Some(unit) = unit {
            inner.session.unit = unit;
        }
        inner.session.favorites = favorites;
        inner.recent = RecentSearches::from_entries(recent);

        tracing::debug!(
            "Restored unit={} favorites={} recent={}",
            inner.session.unit,
            inner.session.favorites.len(),
            inner.recent.len()
        );
        Ok(())
    }

    /// Restore saved state, then show the device position if one is
    /// available and the default city otherwise.
    pub async fn initialize(&self) {
        let _loading = LoadingGuard::new(&self.inner);

        if let Err(e) = self.restore() {
            tracing::error!("Failed to restore saved dashboard state: {}", e);
            self.inner.lock().session.error_message = Some(INITIALIZE_FAILURE_MESSAGE.to_string());
            return;
        }

        let Some(geolocation) = &self.geolocation else {
            tracing::info!("No geolocation provider, showing {}", self.default_city);
            self.fetch_by_city(&self.default_city, None).await;
            return;
        };

        match geolocation.current_position().await {
            Ok(position) => {
                tracing::info!("Using device position {}", position);
                self.fetch_by_location(position).await;
            }
            Err(e) => {
                tracing::warn!("Geolocation failed ({}), showing {}", e, self.default_city);
                self.fetch_by_city(&self.default_city, None).await;
            }
        }
    }

    // =========== Weather ===========

    /// Fetch current conditions and forecast for `city`.
    ///
    /// `unit` overrides the session unit for this request; when the result is
    /// applied the override becomes the session unit. Returns true when the
    /// result was applied.
    pub async fn fetch_by_city(&self, city: &str, unit: Option<Unit>) -> bool {
        let city = city.trim();
        if city.is_empty() {
            return false;
        }

        self.run_fetch(FetchTarget::City(city.to_string()), unit, |unit| {
            self.load_city(city, unit)
        })
        .await
    }

    /// Fetch conditions at `position`, then the forecast for the city the
    /// service resolved it to.
    pub async fn fetch_by_location(&self, position: Coordinates) -> bool {
        self.run_fetch(FetchTarget::Position(position), None, |unit| {
            self.load_position(position, unit)
        })
        .await
    }

    /// Record `query` as a recent search and show it.
    pub async fn search(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }

        {
            let mut inner = self.inner.lock();
            inner.recent.record(query);
            if let Err(e) = self.preferences.save_recent_searches(inner.recent.entries()) {
                tracing::warn!("Failed to save recent searches: {}", e);
            }
        }

        self.fetch_by_city(query, None).await
    }

    pub async fn select_suggestion(&self, suggestion: &CitySuggestion) -> bool {
        self.search(&suggestion.name).await
    }

    /// Flip between metric and imperial and re-fetch what is on screen.
    pub async fn toggle_unit(&self) -> Unit {
        let (unit, target) = {
            let mut inner = self.inner.lock();
            inner.session.unit = inner.session.unit.toggled();
            self.save_unit(inner.session.unit);

            let on_screen = inner.session.weather.as_ref().map(|w| match w.coordinates {
                Some(c) => FetchTarget::Position(c),
                None => FetchTarget::City(w.city_name.clone()),
            });
            (inner.session.unit, on_screen.or_else(|| inner.last_target.clone()))
        };
        tracing::info!("Unit switched to {}", unit);

        let refreshed = match target {
            Some(FetchTarget::Position(position)) => self.fetch_by_location(position).await,
            Some(FetchTarget::City(city)) => self.fetch_by_city(&city, None).await,
            None => false,
        };

        // A successful fetch already refreshed the favorites
        if !refreshed {
            self.refresh_favorites().await;
        }
        unit
    }

    // =========== Favorites ===========

    /// Remove `city` if pinned, otherwise look it up and pin it.
    pub async fn toggle_favorite(&self, city: &str) -> FavoriteToggle {
        let city = city.trim();
        if city.is_empty() {
            return FavoriteToggle::Unchanged;
        }
        let key = FavoriteKey::new(city);

        let mut unit = {
            let mut inner = self.inner.lock();
            if let Some(index) = inner.session.favorites.iter().position(|f| f.key() == key) {
                let removed = inner.session.favorites.remove(index);
                self.save_favorites(&inner.session.favorites);
                tracing::info!("Removed favorite {}", removed.city_name);
                return FavoriteToggle::Removed;
            }
            inner.session.unit
        };

        loop {
            let snapshot = match self.backend.current_by_city(city, unit).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Failed to add favorite {}: {}", city, e);
                    return FavoriteToggle::Unchanged;
                }
            };

            let outcome = {
                let mut inner = self.inner.lock();
                if inner.session.unit != unit {
                    Err(inner.session.unit)
                } else {
                    let entry = FavoriteEntry::from_snapshot(&snapshot);
                    let entry_key = entry.key();
                    if inner
                        .session
                        .favorites
                        .iter()
                        .any(|f| f.key() == key || f.key() == entry_key)
                    {
                        tracing::debug!("{} is already a favorite", entry.city_name);
                        Ok(FavoriteToggle::Unchanged)
                    } else {
                        tracing::info!("Added favorite {}", entry.city_name);
                        inner.session.favorites.push(entry);
                        self.save_favorites(&inner.session.favorites);
                        Ok(FavoriteToggle::Added)
                    }
                }
            };

            match outcome {
                Ok(toggle) => return toggle,
                // Unit changed mid-lookup; the entry must match the current unit
                Err(current) => unit = current,
            }
        }
    }

    /// Re-read every favorite in the current unit.
    ///
    /// Lookups run concurrently. A failed lookup leaves its entry as it was;
    /// successful ones replace their entry in place.
    pub(crate) async fn refresh_favorites(&self) {
        let (favorites, unit) = {
            let inner = self.inner.lock();
            (inner.session.favorites.clone(), inner.session.unit)
        };
        if favorites.is_empty() {
            return;
        }

        let lookups = favorites.iter().map(|fav| async move {
            let result = self.backend.current_by_city(&fav.city_name, unit).await;
            (fav.key(), result)
        });
        let results = join_all(lookups).await;

        let mut inner = self.inner.lock();
        if inner.session.unit != unit {
            // The unit toggle that caused this schedules its own refresh
            tracing::debug!("Unit changed during favorites refresh, discarding results");
            return;
        }

        let total = results.len();
        let mut updated = 0;
        for (key, result) in results {
            match result {
                Ok(snapshot) => {
                    if let Some(entry) = inner.session.favorites.iter_mut().find(|f| f.key() == key) {
                        *entry = FavoriteEntry::from_snapshot(&snapshot);
                        updated += 1;
                    }
                }
                Err(e) => tracing::warn!("Failed to refresh favorite {}: {}", key.as_str(), e),
            }
        }

        // A canonical rename can collide with another entry
        let mut seen: Vec<FavoriteKey> = Vec::with_capacity(inner.session.favorites.len());
        inner.session.favorites.retain(|f| {
            let key = f.key();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });

        self.save_favorites(&inner.session.favorites);
        tracing::info!("Refreshed {}/{} favorites", updated, total);
    }

    // =========== Internals ===========

    async fn run_fetch<F>(
        &self,
        target: FetchTarget,
        requested: Option<Unit>,
        load: impl FnOnce(Unit) -> F,
    ) -> bool
    where
        F: Future<Output = Result<Fetched, WeatherError>>,
    {
        let _loading = LoadingGuard::new(&self.inner);

        let (generation, unit) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.session.error_message = None;
            inner.last_target = Some(target);
            (inner.generation, requested.unwrap_or(inner.session.unit))
        };

        let result = load(unit).await;
        let applied = self.apply_fetch(generation, unit, requested.is_some(), result);
        if applied {
            self.refresh_favorites().await;
        }
        applied
    }

    fn apply_fetch(
        &self,
        generation: u64,
        unit: Unit,
        adopt_unit: bool,
        result: Result<Fetched, WeatherError>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if generation != inner.generation {
            tracing::debug!("Discarding superseded weather fetch #{}", generation);
            return false;
        }

        match result {
            Ok((snapshot, forecast)) => {
                if inner.session.unit != unit {
                    if !adopt_unit {
                        tracing::debug!("Discarding weather fetched in {} after unit change", unit);
                        return false;
                    }
                    inner.session.unit = unit;
                    self.save_unit(unit);
                }

                tracing::info!(
                    "Weather for {}: {} {}",
                    snapshot.city_name,
                    unit.format_temperature(snapshot.temperature),
                    snapshot.condition
                );
                inner.session.weather = Some(snapshot);
                inner.session.forecast = Some(forecast);
                inner.session.error_message = None;
                true
            }
            Err(e) => {
                tracing::error!("Failed to fetch weather: {}", e);
                inner.session.error_message = Some(display_message(e));
                false
            }
        }
    }

    async fn load_city(&self, city: &str, unit: Unit) -> Result<Fetched, WeatherError> {
        let (current, forecast) = tokio::join!(
            self.backend.current_by_city(city, unit),
            self.backend.forecast_by_city(city, unit)
        );
        Ok((current?, forecast?))
    }

    async fn load_position(&self, position: Coordinates, unit: Unit) -> Result<Fetched, WeatherError> {
        let current = self.backend.current_by_coordinates(position, unit).await?;
        let forecast = self.backend.forecast_by_city(&current.city_name, unit).await?;
        Ok((current, forecast))
    }

    fn save_unit(&self, unit: Unit) {
        if let Err(e) = self.preferences.save_unit(unit) {
            tracing::warn!("Failed to save unit: {}", e);
        }
    }

    fn save_favorites(&self, favorites: &[FavoriteEntry]) {
        if let Err(e) = self.preferences.save_favorites(favorites) {
            tracing::warn!("Failed to save favorites: {}", e);
        }
    }
}
