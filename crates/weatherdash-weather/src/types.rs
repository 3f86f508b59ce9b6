use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Measurement system for every displayed value. Global to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    /// Value sent as the `units` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Metric => Self::Imperial,
            Self::Imperial => Self::Metric,
        }
    }

    pub fn temperature_symbol(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    pub fn speed_label(self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }

    /// Render a temperature rounded to whole degrees, e.g. `18°C`.
    pub fn format_temperature(self, value: f64) -> String {
        format!("{}{}", value.round() as i64, self.temperature_symbol())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!("Unknown unit '{other}'. Expected metric or imperial.")),
        }
    }
}

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Current conditions for the active location.
///
/// Each fetch replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_name: String,
    pub temperature: f64,
    pub condition: String,
    /// Absent when the service omits `coord`
    pub coordinates: Option<Coordinates>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub wind_speed: Option<f64>,
    /// Unit the values above are expressed in
    pub unit: Unit,
}

/// One forecast step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub condition: String,
    pub humidity: u8,
    pub wind_speed: f64,
    /// Probability of precipitation in `[0, 1]`
    pub precipitation_probability: f64,
}

/// Per-day rollup of a forecast series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    /// Most frequent condition of the day; earliest wins on ties
    pub condition: String,
    pub max_precipitation: f64,
}

/// Ordered forecast at fixed (3-hour) steps over a multi-day horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub city_name: Option<String>,
    /// Offset of the forecast city from UTC, in seconds
    pub utc_offset_secs: i32,
    pub unit: Unit,
    pub entries: Vec<ForecastEntry>,
}

impl ForecastSeries {
    /// The first `count` steps (9 steps cover the next 24 hours).
    pub fn hourly(&self, count: usize) -> &[ForecastEntry] {
        &self.entries[..count.min(self.entries.len())]
    }

    /// Group entries by local calendar date of the forecast city.
    pub fn daily(&self) -> Vec<DailySummary> {
        let offset =
            FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix());

        let mut days: Vec<(NaiveDate, Vec<&ForecastEntry>)> = Vec::new();
        for entry in &self.entries {
            let date = entry.timestamp.with_timezone(&offset).date_naive();
            match days.iter_mut().find(|(d, _)| *d == date) {
                Some((_, bucket)) => bucket.push(entry),
                None => days.push((date, vec![entry])),
            }
        }
        days.sort_by_key(|(date, _)| *date);

        days.into_iter()
            .map(|(date, entries)| summarize_day(date, &entries))
            .collect()
    }
}

fn summarize_day(date: NaiveDate, entries: &[&ForecastEntry]) -> DailySummary {
    let high = entries
        .iter()
        .map(|e| e.temperature)
        .fold(f64::NEG_INFINITY, f64::max);
    let low = entries
        .iter()
        .map(|e| e.temperature)
        .fold(f64::INFINITY, f64::min);
    let max_precipitation = entries
        .iter()
        .map(|e| e.precipitation_probability)
        .fold(0.0, f64::max);

    let mut tally: Vec<(&str, usize)> = Vec::new();
    for entry in entries {
        match tally.iter_mut().find(|(c, _)| *c == entry.condition) {
            Some((_, n)) => *n += 1,
            None => tally.push((entry.condition.as_str(), 1)),
        }
    }
    // max_by_key returns the last maximum; iterate reversed so the earliest wins
    let condition = tally
        .iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(c, _)| (*c).to_string())
        .unwrap_or_default();

    DailySummary {
        date,
        high,
        low,
        condition,
        max_precipitation,
    }
}

/// Identity of a favorite: trimmed, lower-cased city name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FavoriteKey(String);

impl FavoriteKey {
    pub fn new(city_name: &str) -> Self {
        Self(city_name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A user-pinned city with its last known conditions.
///
/// Serialized as `{ "city", "temp", "condition" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    #[serde(rename = "city")]
    pub city_name: String,
    #[serde(rename = "temp")]
    pub temperature: i32,
    pub condition: String,
}

impl FavoriteEntry {
    pub fn from_snapshot(snapshot: &WeatherSnapshot) -> Self {
        Self {
            city_name: snapshot.city_name.clone(),
            temperature: snapshot.temperature.round() as i32,
            condition: snapshot.condition.clone(),
        }
    }

    pub fn key(&self) -> FavoriteKey {
        FavoriteKey::new(&self.city_name)
    }
}

/// Location service errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather client errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// The request could not complete.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// A response arrived but its success sentinel was absent.
    #[error("{}", .message.as_deref().unwrap_or("weather service reported a failure"))]
    Service { message: Option<String> },
    /// The payload did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Location error: {0}")]
    Location(#[from] LocationError),
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl WeatherError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: Some(message.into()),
        }
    }

    /// Message supplied by the weather service, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Service { message } => message.as_deref().filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }
}
