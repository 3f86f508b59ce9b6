//! Client for the weather proxy.
//!
//! The proxy reports success in the body rather than the HTTP status, and the
//! endpoints disagree on the sentinel's type: current conditions use the number
//! `200`, the forecast uses the string `"200"`. Each request declares which one it
//! expects and the raw value is checked as returned; callers only see Ok/Err.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::types::{
    Coordinates, ForecastEntry, ForecastSeries, Unit, WeatherError, WeatherSnapshot,
};

const USER_AGENT: &str = concat!("weatherdash/", env!("CARGO_PKG_VERSION"));

/// Operations the dashboard needs from a weather source.
#[async_trait]
pub trait WeatherBackend: Send + Sync {
    /// Current conditions for a city name.
    async fn current_by_city(&self, city: &str, unit: Unit)
        -> Result<WeatherSnapshot, WeatherError>;

    /// Current conditions for a position; the snapshot carries the resolved city name.
    async fn current_by_coordinates(
        &self,
        coordinates: Coordinates,
        unit: Unit,
    ) -> Result<WeatherSnapshot, WeatherError>;

    /// Multi-day forecast for a city name.
    async fn forecast_by_city(&self, city: &str, unit: Unit)
        -> Result<ForecastSeries, WeatherError>;
}

/// Success marker carried in the `cod` field of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sentinel {
    /// `"cod": 200`
    Numeric,
    /// `"cod": "200"`
    Text,
}

impl Sentinel {
    fn accepts(self, cod: Option<&Value>) -> bool {
        match (self, cod) {
            (Sentinel::Numeric, Some(Value::Number(n))) => n.as_u64() == Some(200),
            (Sentinel::Text, Some(Value::String(s))) => s == "200",
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    name: String,
    coord: Option<RawCoord>,
    main: RawCurrentMain,
    weather: Vec<RawCondition>,
    wind: Option<RawWind>,
}

#[derive(Debug, Deserialize)]
struct RawCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawCurrentMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    list: Vec<RawForecastItem>,
    city: Option<RawForecastCity>,
}

#[derive(Debug, Deserialize)]
struct RawForecastItem {
    dt: i64,
    main: RawForecastMain,
    weather: Vec<RawCondition>,
    wind: RawWind,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawForecastMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct RawForecastCity {
    name: Option<String>,
    timezone: Option<i32>,
}

fn first_description(weather: Vec<RawCondition>) -> Result<String, WeatherError> {
    weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| WeatherError::MalformedResponse("empty weather list".to_string()))
}

fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

impl RawCurrent {
    fn into_snapshot(
        self,
        unit: Unit,
        requested: Option<Coordinates>,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let condition = first_description(self.weather)?;
        Ok(WeatherSnapshot {
            city_name: self.name,
            temperature: self.main.temp,
            condition,
            coordinates: self
                .coord
                .map(|c| Coordinates::new(c.lat, c.lon))
                .or(requested),
            feels_like: self.main.feels_like,
            humidity: self.main.humidity.map(percent),
            wind_speed: self.wind.map(|w| w.speed),
            unit,
        })
    }
}

impl RawForecast {
    fn into_series(self, unit: Unit) -> Result<ForecastSeries, WeatherError> {
        let entries = self
            .list
            .into_iter()
            .map(|item| {
                let timestamp = DateTime::from_timestamp(item.dt, 0).ok_or_else(|| {
                    WeatherError::MalformedResponse(format!("invalid timestamp {}", item.dt))
                })?;
                Ok(ForecastEntry {
                    timestamp,
                    temperature: item.main.temp,
                    condition: first_description(item.weather)?,
                    humidity: percent(item.main.humidity),
                    wind_speed: item.wind.speed,
                    precipitation_probability: item.pop.unwrap_or(0.0).clamp(0.0, 1.0),
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        let (city_name, utc_offset_secs) = match self.city {
            Some(city) => (city.name, city.timezone.unwrap_or(0)),
            None => (None, 0),
        };

        Ok(ForecastSeries {
            city_name,
            utc_offset_secs,
            unit,
            entries,
        })
    }
}

/// HTTP client for the weather proxy.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    /// Create a client for the proxy at `base_url`.
    ///
    /// Without a timeout a request may wait indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, WeatherError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path`, then check the body's sentinel before decoding it as `T`.
    async fn get_checked<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        sentinel: Sentinel,
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("Non-JSON body from {} ({}): {}", path, status, e);
            WeatherError::MalformedResponse(format!("{path} returned non-JSON body ({status})"))
        })?;

        if !sentinel.accepts(value.get("cod")) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            tracing::debug!(
                "{} reported failure: cod={:?} message={:?}",
                path,
                value.get("cod"),
                message
            );
            return Err(WeatherError::Service { message });
        }

        serde_json::from_value(value)
            .map_err(|e| WeatherError::MalformedResponse(format!("{path}: {e}")))
    }
}

#[async_trait]
impl WeatherBackend for WeatherClient {
    #[instrument(skip(self), level = "debug")]
    async fn current_by_city(
        &self,
        city: &str,
        unit: Unit,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let raw: RawCurrent = self
            .get_checked(
                "/weather/current",
                &[("city", city.to_string()), ("units", unit.to_string())],
                Sentinel::Numeric,
            )
            .await?;
        raw.into_snapshot(unit, None)
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_by_coordinates(
        &self,
        coordinates: Coordinates,
        unit: Unit,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let raw: RawCurrent = self
            .get_checked(
                "/weather/location",
                &[
                    ("lat", coordinates.lat.to_string()),
                    ("lon", coordinates.lon.to_string()),
                    ("units", unit.to_string()),
                ],
                Sentinel::Numeric,
            )
            .await?;
        raw.into_snapshot(unit, Some(coordinates))
    }

    #[instrument(skip(self), level = "debug")]
    async fn forecast_by_city(
        &self,
        city: &str,
        unit: Unit,
    ) -> Result<ForecastSeries, WeatherError> {
        let raw: RawForecast = self
            .get_checked(
                "/weather/forecast",
                &[("city", city.to_string()), ("units", unit.to_string())],
                Sentinel::Text,
            )
            .await?;
        raw.into_series(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body(name: &str, temp: f64, description: &str) -> Value {
        json!({
            "cod": 200,
            "name": name,
            "coord": {"lat": 48.85, "lon": 2.35},
            "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 40},
            "weather": [{"description": description}],
            "wind": {"speed": 3.6}
        })
    }

    fn forecast_body(steps: usize) -> Value {
        let list: Vec<Value> = (0..steps)
            .map(|i| {
                json!({
                    "dt": 1_700_000_000 + (i as i64) * 10_800,
                    "main": {"temp": 10.0 + i as f64, "humidity": 70},
                    "weather": [{"description": "light rain"}],
                    "wind": {"speed": 4.1},
                    "pop": 0.35
                })
            })
            .collect();
        json!({"cod": "200", "message": 0, "list": list, "city": {"name": "Paris", "timezone": 3600}})
    }

    #[test]
    fn test_sentinels_do_not_coerce() {
        assert!(Sentinel::Numeric.accepts(Some(&json!(200))));
        assert!(!Sentinel::Numeric.accepts(Some(&json!("200"))));
        assert!(Sentinel::Text.accepts(Some(&json!("200"))));
        assert!(!Sentinel::Text.accepts(Some(&json!(200))));
        assert!(!Sentinel::Text.accepts(None));
    }

    #[tokio::test]
    async fn test_current_by_city_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/current"))
            .and(query_param("city", "Paris"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris", 18.0, "clear sky")))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let snapshot = client.current_by_city("Paris", Unit::Metric).await.unwrap();

        assert_eq!(snapshot.city_name, "Paris");
        assert_eq!(snapshot.temperature, 18.0);
        assert_eq!(snapshot.condition, "clear sky");
        assert_eq!(snapshot.coordinates, Some(Coordinates::new(48.85, 2.35)));
        assert_eq!(snapshot.humidity, Some(40));
        assert_eq!(snapshot.unit, Unit::Metric);
    }

    #[tokio::test]
    async fn test_current_with_string_sentinel_is_rejected() {
        let server = MockServer::start().await;
        let mut body = current_body("Paris", 18.0, "clear sky");
        body["cod"] = json!("200");
        Mock::given(method("GET"))
            .and(path("/weather/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let err = client.current_by_city("Paris", Unit::Metric).await.unwrap_err();
        assert!(matches!(err, WeatherError::Service { .. }));
    }

    #[tokio::test]
    async fn test_current_city_not_found_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/current"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let err = client.current_by_city("Nowhere", Unit::Metric).await.unwrap_err();
        assert_eq!(err.service_message(), Some("city not found"));
    }

    #[tokio::test]
    async fn test_forecast_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/forecast"))
            .and(query_param("city", "Paris"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(9)))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let series = client.forecast_by_city("Paris", Unit::Imperial).await.unwrap();

        assert_eq!(series.entries.len(), 9);
        assert_eq!(series.unit, Unit::Imperial);
        assert_eq!(series.utc_offset_secs, 3600);
        assert_eq!(series.entries[0].humidity, 70);
        assert_eq!(series.entries[0].precipitation_probability, 0.35);
        assert_eq!(
            series.entries[1].timestamp - series.entries[0].timestamp,
            chrono::Duration::hours(3)
        );
    }

    #[tokio::test]
    async fn test_forecast_with_numeric_sentinel_is_rejected() {
        let server = MockServer::start().await;
        let mut body = forecast_body(2);
        body["cod"] = json!(200);
        Mock::given(method("GET"))
            .and(path("/weather/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let result = client.forecast_by_city("Paris", Unit::Metric).await;
        assert!(matches!(result, Err(WeatherError::Service { message: None })));
    }

    #[tokio::test]
    async fn test_location_lookup_sends_coordinates() {
        let server = MockServer::start().await;
        let mut body = current_body("Surat", 31.0, "haze");
        body.as_object_mut().unwrap().remove("coord");
        Mock::given(method("GET"))
            .and(path("/weather/location"))
            .and(query_param("lat", "21.17"))
            .and(query_param("lon", "72.83"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let snapshot = client
            .current_by_coordinates(Coordinates::new(21.17, 72.83), Unit::Metric)
            .await
            .unwrap();

        assert_eq!(snapshot.city_name, "Surat");
        // Falls back to the requested position when the body has no coord
        assert_eq!(snapshot.coordinates, Some(Coordinates::new(21.17, 72.83)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/current"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let err = client.current_by_city("Paris", Unit::Metric).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_fields_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/current"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"cod": 200, "name": "Paris", "weather": []})),
            )
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), None).unwrap();
        let err = client.current_by_city("Paris", Unit::Metric).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = WeatherClient::new("http://127.0.0.1:1", None).unwrap();
        let err = client.current_by_city("Paris", Unit::Metric).await.unwrap_err();
        assert!(matches!(err, WeatherError::Network(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = WeatherClient::new("http://localhost:5000/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }
}
