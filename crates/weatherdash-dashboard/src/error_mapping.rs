//! Maps weather client failures onto the application error hierarchy and
//! picks the message shown on the dashboard.

use weatherdash_core::{AppError, ReqwestErrorExt, WeatherError as CoreWeatherError};
use weatherdash_weather::WeatherError;

pub trait WeatherErrorExt {
    fn into_app_error(self) -> AppError;
}

impl WeatherErrorExt for WeatherError {
    fn into_app_error(self) -> AppError {
        match self {
            WeatherError::Network(e) => AppError::Network(e.into_network_error()),
            WeatherError::Service { message } => {
                AppError::Weather(CoreWeatherError::Service(message.unwrap_or_default()))
            }
            WeatherError::MalformedResponse(s) => {
                AppError::Weather(CoreWeatherError::MalformedResponse(s))
            }
            WeatherError::Location(e) => {
                AppError::Weather(CoreWeatherError::LocationUnavailable(e.to_string()))
            }
            WeatherError::NotConfigured(s) => AppError::Other(anyhow::anyhow!(s)),
        }
    }
}

/// The service's own message when it sent one, otherwise a generic one.
pub fn display_message(err: WeatherError) -> String {
    if let Some(message) = err.service_message() {
        return message.to_string();
    }
    err.into_app_error().user_message().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weatherdash_weather::LocationError;

    #[test]
    fn service_message_wins() {
        let msg = display_message(WeatherError::service("city not found"));
        assert_eq!(msg, "city not found");
    }

    #[test]
    fn silent_service_failure_uses_generic_message() {
        let msg = display_message(WeatherError::Service { message: None });
        assert_eq!(msg, "Failed to fetch weather data");

        let blank = display_message(WeatherError::service("  "));
        assert_eq!(blank, "Failed to fetch weather data");
    }

    #[test]
    fn malformed_payload_maps_to_weather_error() {
        let err = WeatherError::MalformedResponse("missing main".into()).into_app_error();
        assert!(matches!(
            err,
            AppError::Weather(CoreWeatherError::MalformedResponse(_))
        ));
    }

    #[test]
    fn location_failure_maps_to_location_unavailable() {
        let err = WeatherError::Location(LocationError::PermissionDenied).into_app_error();
        assert!(matches!(
            err,
            AppError::Weather(CoreWeatherError::LocationUnavailable(_))
        ));
    }
}
