mod context;
mod database;
mod notifications;
mod settings;
mod subscriptions;
mod vapid;
mod webserver;

use anyhow::Result;
use clap::{Parser, Subcommand};
use context::AppContext;
use settings::Settings;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vapid::keys::VapidKeys;

#[derive(Parser)]
#[command(version, about = "Stores browser push subscriptions and broadcasts notifications to them")]
struct Cli {
    /// Settings file, defaults to ./settings.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webserver (default)
    Serve,
    /// Print a fresh VAPID key pair in .env format
    GenerateKeys,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine, the environment may be set up otherwise.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::GenerateKeys => {
            let keys = VapidKeys::generate()?;
            println!("VAPID_PUBLIC_KEY={}", keys.public_key_base64url());
            println!("VAPID_PRIVATE_KEY={}", keys.private_key_base64url());
            Ok(())
        }
        Command::Serve => {
            let settings = Settings::load(cli.config.as_deref())?;
            debug!(database = ?settings.database, "Settings loaded");
            let context = AppContext::from_settings(&settings).await?;

            webserver::start(&settings.webserver, &settings.static_dir, context).await
        }
    }
}
