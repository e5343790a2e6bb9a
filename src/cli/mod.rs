use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};

use crate::app::AppState;
use crate::config::{self, AppConfig};
use crate::database::models::user::{MAX_EMAIL_LEN, MAX_NAME_LEN, MIN_NAME_LEN, MIN_PASSWORD_LEN};
use crate::handlers::validation::is_valid_email;
use crate::server;

#[derive(Parser)]
#[command(name = "hero-registry")]
#[command(about = "Hero registry and user accounts REST API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Bind address, overrides HOST")]
        host: Option<String>,

        #[arg(long, help = "Port, overrides HERO_API_PORT / PORT")]
        port: Option<u16>,
    },

    #[command(about = "Create an admin account, or promote an existing one")]
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config().clone();

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            tracing::info!("Starting Hero Registry in {:?} mode", config.environment);

            let state = AppState::from_config(config).await?;
            server::serve(state, &host, port).await
        }
        Commands::CreateAdmin { name, email, password } => create_admin(config, &name, &email, &password).await,
    }
}

async fn create_admin(config: AppConfig, name: &str, email: &str, password: &str) -> anyhow::Result<()> {
    let name_len = name.trim().chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name_len) {
        bail!("name must be {}-{} characters", MIN_NAME_LEN, MAX_NAME_LEN);
    }
    if email.len() > MAX_EMAIL_LEN || !is_valid_email(email.trim()) {
        bail!("invalid email: {}", email);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {} characters", MIN_PASSWORD_LEN);
    }

    let state = AppState::from_config(config).await?;
    let (user, created) = state
        .auth
        .create_admin(name, email.trim(), password)
        .await
        .context("failed to create admin")?;

    if created {
        println!("Created admin {} ({})", user.email, user.id);
    } else {
        println!("Promoted {} ({}) to admin", user.email, user.id);
    }
    if let Some(database) = &state.database {
        database.close().await;
    }
    Ok(())
}
