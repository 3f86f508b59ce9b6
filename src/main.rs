mod cli;
mod render;

use anyhow::Result;
use clap::Parser;

use weatherdash_core::{Config, ConfigError};
use weatherdash_dashboard::App;

#[tokio::main]
async fn main() -> Result<()> {
    weatherdash_core::init()?;

    let cli = cli::Cli::parse();

    let (config, _validation) = Config::load_validated_with(|config| cli.apply_overrides(config))
        .inspect_err(|e| {
            if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                eprintln!("{}", config_error.user_message());
            }
        })?;

    let app = App::new(config)?;
    tracing::info!("weatherdash started");

    let shutdown = app.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let result = app.run_until_shutdown(cli.run(&app)).await;

    app.shutdown();
    result
}
