//! Forward geocoding for the search box: turn a partial query into candidate cities.
//! Uses the OpenWeather direct geocoding endpoint.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::types::{Coordinates, WeatherError};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const DIRECT_PATH: &str = "/geo/1.0/direct";

#[derive(Debug, Deserialize)]
struct DirectEntry {
    name: String,
    lat: Option<f64>,
    lon: Option<f64>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// One candidate city for a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySuggestion {
    pub name: String,
    pub state: Option<String>,
    pub country: Option<String>,
    pub coordinates: Coordinates,
    /// Display text, e.g. "Springfield, Illinois, US"
    pub label: String,
}

impl CitySuggestion {
    fn from_entry(entry: DirectEntry) -> Option<Self> {
        let coordinates = Coordinates::new(entry.lat?, entry.lon?);

        let label = std::iter::once(entry.name.as_str())
            .chain(entry.state.as_deref())
            .chain(entry.country.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Some(Self {
            name: entry.name,
            state: entry.state,
            country: entry.country,
            coordinates,
            label,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeocodeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limit: u32,
}

impl GeocodeClient {
    pub fn new(base_url: &str, api_key: Option<String>, limit: u32) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            limit,
        })
    }

    /// Candidate cities for `query`. A blank query yields no suggestions and no request.
    #[instrument(skip(self), level = "debug")]
    pub async fn suggest(&self, query: &str) -> Result<Vec<CitySuggestion>, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            WeatherError::NotConfigured("geocoding API key is not set".to_string())
        })?;

        let url = format!("{}{}", self.base_url, DIRECT_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query.to_string()),
                ("limit", self.limit.to_string()),
                ("appid", api_key.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| format!("geocoding request failed ({status})"));
            return Err(WeatherError::service(message));
        }

        let entries: Vec<DirectEntry> = response
            .json()
            .await
            .map_err(|e| WeatherError::MalformedResponse(format!("geocoding: {e}")))?;

        let suggestions: Vec<CitySuggestion> = entries
            .into_iter()
            .filter_map(CitySuggestion::from_entry)
            .collect();

        tracing::debug!("{} suggestions for {:?}", suggestions.len(), query);
        Ok(suggestions)
    }
}
