use clap::Parser;
use tracing_subscriber::EnvFilter;

use hero_registry::cli::{self, Cli};
use hero_registry::is_development;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let default_filter = if is_development!() {
        "hero_registry=debug,tower_http=debug"
    } else {
        "hero_registry=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    if let Err(e) = cli::run(Cli::parse()).await {
        match std::env::var("HERO_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}
