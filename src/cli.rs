use anyhow::Context;
use clap::{Parser, Subcommand};

use weatherdash_core::Config;
use weatherdash_dashboard::{App, FavoriteToggle};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Weather dashboard")]
pub struct Cli {
    /// Weather proxy base URL, overriding the configured one.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the dashboard for a city, or for the current location when omitted.
    Show {
        city: Option<String>,

        /// Number of 3-hour forecast steps to list.
        #[arg(long, default_value_t = 9)]
        hours: usize,

        /// Also list per-day highs and lows.
        #[arg(long)]
        daily: bool,
    },

    /// Switch between metric and imperial.
    Unit,

    /// Pin a city, or unpin it if already pinned.
    Favorite { city: String },

    /// List pinned cities.
    Favorites,

    /// List recent searches.
    Recent,

    /// Suggest cities matching a partial name.
    Suggest {
        query: String,

        /// Show the dashboard for the suggestion with this number.
        #[arg(long)]
        pick: Option<usize>,
    },
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.backend.api_url = url.clone();
        }
    }

    pub async fn run(self, app: &App) -> anyhow::Result<()> {
        let controller = app.controller();

        match self.command {
            Command::Show { city, hours, daily } => {
                match city {
                    Some(city) => {
                        restore(app);
                        controller.search(&city).await;
                    }
                    None => app.initialize().await,
                }
                print!("{}", render::dashboard(&controller.state(), hours, daily));
            }
            Command::Unit => {
                restore(app);
                let unit = controller.toggle_unit().await;
                println!("Unit is now {unit}");
                let favorites = controller.favorites();
                if !favorites.is_empty() {
                    print!("{}", render::favorites(&favorites, unit));
                }
            }
            Command::Favorite { city } => {
                restore(app);
                match controller.toggle_favorite(&city).await {
                    FavoriteToggle::Added => println!("Added {city} to favorites"),
                    FavoriteToggle::Removed => println!("Removed {city} from favorites"),
                    FavoriteToggle::Unchanged => println!("Favorites unchanged"),
                }
            }
            Command::Favorites => {
                restore(app);
                let favorites = controller.favorites();
                if favorites.is_empty() {
                    println!("No favorites yet.");
                } else {
                    print!("{}", render::favorites(&favorites, controller.unit()));
                }
            }
            Command::Recent => {
                restore(app);
                for search in controller.recent_searches() {
                    println!("{search}");
                }
            }
            Command::Suggest { query, pick } => {
                let Some(suggestions) = app.suggestions().on_input(&query).await else {
                    return Ok(());
                };
                match pick {
                    None => print!("{}", render::suggestions(&suggestions)),
                    Some(number) => {
                        let choice = number
                            .checked_sub(1)
                            .and_then(|index| suggestions.get(index))
                            .with_context(|| format!("No suggestion {number} for {query:?}"))?;
                        restore(app);
                        controller.select_suggestion(choice).await;
                        print!("{}", render::dashboard(&controller.state(), 9, false));
                    }
                }
            }
        }

        Ok(())
    }
}

fn restore(app: &App) {
    if let Some(notice) = app.restore() {
        eprintln!("{notice}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_override_is_validated() {
        let cli = Cli::try_parse_from(["weatherdash", "--api-url", "not a url", "unit"]).unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        let err = config.into_validated().unwrap_err();
        assert!(err.to_string().contains("backend.api_url"));
    }

    #[test]
    fn valid_api_url_override_wins() {
        let cli =
            Cli::try_parse_from(["weatherdash", "favorites", "--api-url", "http://proxy:8080"])
                .unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        let (config, _) = config.into_validated().unwrap();
        assert_eq!(config.backend.api_url, "http://proxy:8080");
    }

    #[test]
    fn parses_suggestion_pick() {
        let cli = Cli::try_parse_from(["weatherdash", "suggest", "spring", "--pick", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Suggest { ref query, pick: Some(2) } if query == "spring"
        ));
    }
}
