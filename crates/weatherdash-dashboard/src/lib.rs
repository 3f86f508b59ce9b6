//! Dashboard session state for weatherdash
//!
//! [`WeatherController`] holds the current conditions, forecast, unit and
//! favorites, and mediates every fetch. [`App`] wires it to the HTTP clients
//! and the preference store.

pub mod app;
pub mod controller;
pub mod error_mapping;
pub mod recent;
pub mod state;
pub mod storage;
pub mod suggestions;

pub use app::App;
pub use controller::{
    ControllerOptions, FavoriteToggle, WeatherController, DEFAULT_CITY,
    INITIALIZE_FAILURE_MESSAGE,
};
pub use error_mapping::{display_message, WeatherErrorExt};
pub use recent::{RecentSearches, RECENT_SEARCH_CAPACITY};
pub use state::{Phase, SessionState};
pub use storage::{KeyValueStore, MemoryStore, Preferences, SqliteStore};
pub use suggestions::{SuggestionService, DEFAULT_DEBOUNCE};
