use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deploys_auth::{
    app,
    auth::{codes::ExchangeCodes, google::GoogleProvider, session::SessionManager, tokens::TokenService},
    config::AppConfig,
    maintenance,
    models::{now_timestamp, oauth2_client::OAuth2Client},
    repos::{self, BrokerRepo},
    telemetry::Telemetry,
};

#[derive(Parser)]
#[command(name = "deploys-auth", about = "OAuth2 broker in front of Google sign-in")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Delete expired sessions, exchange codes and tokens, then exit
    Cleanup,
    /// Manage registered OAuth2 clients
    Client {
        #[command(subcommand)]
        command: ClientCommand,
    },
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Register a client, or replace an existing one with the same id
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        secret: String,
        /// Allowed redirect_uri pattern; `*` matches any substring
        #[arg(long)]
        redirect_uri: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            config.validate()?;
            tracing::info!(public_url = %config.server.public_url, "loaded config");
            app::run(config).await
        }
        Command::Cleanup => {
            let telemetry = Telemetry::tracing();
            let (repo, token_stores) = app::connect(&config, &telemetry).await?;
            let provider = Arc::new(GoogleProvider::from_config(&config)?);
            let sessions = SessionManager::new(repo.clone(), telemetry.clone());
            let codes = ExchangeCodes::new(repo, telemetry.clone());
            let tokens = TokenService::new(token_stores, provider, telemetry);
            maintenance::run_cleanup(&sessions, &codes, &tokens).await;
            Ok(())
        }
        Command::Client { command: ClientCommand::Add { id, secret, redirect_uri } } => {
            deploys_auth::auth::clients::RedirectPattern::compile(&redirect_uri)
                .context("invalid redirect uri pattern")?;
            let (repo, _) = repos::open_durable(&config.db.url)?;
            repo.save_client(OAuth2Client { id: id.clone(), secret, redirect_uri, created_at: now_timestamp() })
                .await?;
            tracing::info!(client_id = %id, "client saved");
            Ok(())
        }
    }
}
