//! Plain-text rendering of dashboard state.

use std::fmt::Write;

use weatherdash_dashboard::{Phase, SessionState};
use weatherdash_weather::{CitySuggestion, FavoriteEntry, ForecastSeries, Unit, WeatherSnapshot};

pub fn dashboard(state: &SessionState, hours: usize, daily: bool) -> String {
    let mut out = String::new();

    if let Some(message) = &state.error_message {
        let _ = writeln!(out, "! {message}");
    }

    match &state.weather {
        Some(weather) => out.push_str(&current(weather, state.is_favorite(&weather.city_name))),
        None if state.phase() == Phase::Idle => out.push_str("No weather loaded.\n"),
        None => {}
    }

    if let Some(forecast) = &state.forecast {
        out.push_str(&hourly(forecast, hours));
        if daily {
            out.push_str(&days(forecast));
        }
    }

    if !state.favorites.is_empty() {
        out.push_str(&favorites(&state.favorites, state.unit));
    }
    out
}

fn current(weather: &WeatherSnapshot, pinned: bool) -> String {
    let unit = weather.unit;
    let mut out = format!(
        "{}: {}, {}{}\n",
        weather.city_name,
        unit.format_temperature(weather.temperature),
        weather.condition,
        if pinned { "  [favorite]" } else { "" }
    );
    if let Some(feels_like) = weather.feels_like {
        let _ = writeln!(out, "  feels like {}", unit.format_temperature(feels_like));
    }
    if let Some(humidity) = weather.humidity {
        let _ = writeln!(out, "  humidity {humidity}%");
    }
    if let Some(wind) = weather.wind_speed {
        let _ = writeln!(out, "  wind {wind:.1} {}", unit.speed_label());
    }
    out
}

fn hourly(forecast: &ForecastSeries, hours: usize) -> String {
    let offset = chrono::FixedOffset::east_opt(forecast.utc_offset_secs);
    let mut out = String::from("Next hours:\n");
    for entry in forecast.hourly(hours) {
        let time = match offset {
            Some(offset) => entry.timestamp.with_timezone(&offset).format("%H:%M"),
            None => entry.timestamp.format("%H:%M"),
        };
        let _ = writeln!(
            out,
            "  {time}  {:>6}  {:<20} {:>3.0}%",
            forecast.unit.format_temperature(entry.temperature),
            entry.condition,
            entry.precipitation_probability * 100.0
        );
    }
    out
}

fn days(forecast: &ForecastSeries) -> String {
    let unit = forecast.unit;
    let mut out = String::from("Daily:\n");
    for day in forecast.daily() {
        let _ = writeln!(
            out,
            "  {}  {:>6} / {:<6} {}",
            day.date.format("%a %d %b"),
            unit.format_temperature(day.high),
            unit.format_temperature(day.low),
            day.condition
        );
    }
    out
}

pub fn favorites(favorites: &[FavoriteEntry], unit: Unit) -> String {
    let mut out = String::from("Favorites:\n");
    for fav in favorites {
        let _ = writeln!(
            out,
            "  * {}: {}{}, {}",
            fav.city_name,
            fav.temperature,
            unit.temperature_symbol(),
            fav.condition
        );
    }
    out
}

/// Numbered so a choice can be passed back with `suggest --pick`.
pub fn suggestions(suggestions: &[CitySuggestion]) -> String {
    if suggestions.is_empty() {
        return "No matching cities.\n".to_string();
    }
    suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "  {}. {} ({:.2}, {:.2})\n",
                i + 1,
                s.label,
                s.coordinates.lat,
                s.coordinates.lon
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> WeatherSnapshot {
        WeatherSnapshot {
            city_name: "Paris".into(),
            temperature: 18.4,
            condition: "clear sky".into(),
            coordinates: None,
            feels_like: Some(17.6),
            humidity: Some(40),
            wind_speed: Some(3.6),
            unit: Unit::Metric,
        }
    }

    #[test]
    fn renders_current_conditions() {
        let state = SessionState {
            weather: Some(paris()),
            ..Default::default()
        };
        let text = dashboard(&state, 9, false);
        assert!(text.starts_with("Paris: 18°C, clear sky\n"));
        assert!(text.contains("feels like 18°C"));
        assert!(text.contains("wind 3.6 m/s"));
    }

    #[test]
    fn renders_error_above_stale_data() {
        let state = SessionState {
            weather: Some(paris()),
            error_message: Some("city not found".into()),
            ..Default::default()
        };
        let text = dashboard(&state, 9, false);
        assert!(text.starts_with("! city not found\nParis"));
    }

    #[test]
    fn marks_pinned_city() {
        let state = SessionState {
            weather: Some(paris()),
            favorites: vec![FavoriteEntry {
                city_name: "paris".into(),
                temperature: 18,
                condition: "clear sky".into(),
            }],
            ..Default::default()
        };
        let text = dashboard(&state, 9, false);
        assert!(text.starts_with("Paris: 18°C, clear sky  [favorite]\n"));
    }

    #[test]
    fn numbers_suggestions() {
        let list = vec![CitySuggestion {
            name: "Paris".into(),
            state: None,
            country: Some("FR".into()),
            coordinates: weatherdash_weather::Coordinates::new(48.85, 2.35),
            label: "Paris, FR".into(),
        }];
        assert_eq!(suggestions(&list), "  1. Paris, FR (48.85, 2.35)\n");
    }

    #[test]
    fn renders_favorites_in_session_unit() {
        let favs = vec![FavoriteEntry {
            city_name: "Oslo".into(),
            temperature: 23,
            condition: "snow".into(),
        }];
        assert_eq!(favorites(&favs, Unit::Imperial), "Favorites:\n  * Oslo: 23°F, snow\n");
    }
}
