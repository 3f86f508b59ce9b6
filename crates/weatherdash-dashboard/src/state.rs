//! Observable dashboard state.

use weatherdash_weather::{FavoriteEntry, FavoriteKey, ForecastSeries, Unit, WeatherSnapshot};

/// Coarse view of what the dashboard is doing, for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing fetched yet
    #[default]
    Idle,
    Loading,
    Ready,
    /// Last fetch failed; any earlier data is still shown
    Error,
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<ForecastSeries>,
    pub unit: Unit,
    pub favorites: Vec<FavoriteEntry>,
    pub loading: bool,
    pub error_message: Option<String>,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Loading
        } else if self.error_message.is_some() {
            Phase::Error
        } else if self.weather.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    pub fn is_favorite(&self, city_name: &str) -> bool {
        let key = FavoriteKey::new(city_name);
        self.favorites.iter().any(|fav| fav.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_idle() {
        let state = SessionState::default();
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.unit, Unit::Metric);
    }

    #[test]
    fn loading_takes_precedence_over_error() {
        let state = SessionState {
            loading: true,
            error_message: Some("city not found".into()),
            ..Default::default()
        };
        assert_eq!(state.phase(), Phase::Loading);
    }

    #[test]
    fn error_with_stale_data_reports_error() {
        let state = SessionState {
            weather: Some(WeatherSnapshot {
                city_name: "Paris".into(),
                temperature: 18.2,
                condition: "clear sky".into(),
                coordinates: None,
                feels_like: None,
                humidity: None,
                wind_speed: None,
                unit: Unit::Metric,
            }),
            error_message: Some("city not found".into()),
            ..Default::default()
        };
        assert_eq!(state.phase(), Phase::Error);
    }

    #[test]
    fn favorite_lookup_ignores_case_and_padding() {
        let state = SessionState {
            favorites: vec![FavoriteEntry {
                city_name: "Paris".into(),
                temperature: 18,
                condition: "clear sky".into(),
            }],
            ..Default::default()
        };
        assert!(state.is_favorite(" paris"));
        assert!(!state.is_favorite("Oslo"));
    }
}
