use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, bail};
use sea_orm::Database;
use std::sync::Arc;
use token_issuer::AppResources;
use token_issuer::api::start_webserver;
use token_issuer::config::load_config;
use token_issuer::oauth2::store::DbClientRegistry;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "token-issuer")]
#[command(about = "Password-grant bearer token issuance service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Manage the clients allowed to request tokens
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Register a new client and print its id and secret
    Create {
        /// Human-readable client name
        #[arg(long)]
        name: String,
    },
    /// Revoke a client so it can no longer obtain tokens
    Revoke {
        /// Client id
        #[arg(long)]
        id: String,
    },
}

fn initialize_tracing() {
    let default_directives = "token_issuer=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    // A missing .env is fine; real deployments use the environment directly.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    initialize_tracing();

    let config = Arc::new(load_config().wrap_err("Failed to load configuration")?);

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("Failed to connect to database")?,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(
                bind_address = %config.bind_address,
                token_lifetime_days = config.oauth2.personal_token_lifetime_days,
                allow_registration = config.registration.allow_registration,
                authentication_guard = %config.registration.authentication_guard,
                "Configuration loaded"
            );
            start_webserver(AppResources { db, config }).await?;
        }
        Command::Client { action } => {
            let registry = DbClientRegistry::new(db);
            match action {
                ClientAction::Create { name } => {
                    let (client, secret) = registry.create_client(&name).await?;
                    println!("Client ID:     {}", client.id);
                    println!("Client secret: {secret}");
                }
                ClientAction::Revoke { id } => {
                    if !registry.revoke_client(&id).await? {
                        bail!("No client with id {id}");
                    }
                    println!("Client {id} revoked");
                }
            }
        }
    }

    Ok(())
}
