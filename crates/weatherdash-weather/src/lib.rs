//! Weather data for weatherdash
//!
//! Talks to the weather proxy (current conditions, forecast, coordinate
//! lookup) and the geocoding API used for city suggestions.

pub mod client;
pub mod geocode;
pub mod location;
pub mod types;

pub use client::{WeatherBackend, WeatherClient};
pub use geocode::{CitySuggestion, GeocodeClient};
pub use location::{FixedPosition, GeolocationProvider};
pub use types::*;
