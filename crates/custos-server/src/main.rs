//! Custos operator binary.

mod cli;
mod logging;
mod seed;

use anyhow::{Context, bail};
use clap::Parser;
use custos_auth::{AuthConfig, TokenCodec, parse_bearer};
use custos_core::repository::UserRepository;
use custos_db::repository::{
    SurrealAccessRuleRepository, SurrealBusinessElementRepository, SurrealRoleRepository,
    SurrealUserRepository,
};
use custos_db::{DbManager, run_migrations};
use tracing::info;
use uuid::Uuid;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format).context("invalid log filter")?;

    match &cli.command {
        Commands::Migrate => {
            let db = connect(&cli).await?;
            let version = run_migrations(db.client()).await?;
            info!(version, "Schema is up to date");
        }
        Commands::SeedDemo => {
            let config = AuthConfig::from_env()?;
            let db = connect(&cli).await?;
            run_migrations(db.client()).await?;

            let client = db.client().clone();
            let summary = seed::seed_demo(
                &SurrealUserRepository::new(client.clone()),
                &SurrealRoleRepository::new(client.clone()),
                &SurrealBusinessElementRepository::new(client.clone()),
                &SurrealAccessRuleRepository::new(client),
                config.pepper.as_deref(),
            )
            .await?;

            println!("admin  {}  {}", summary.admin.id, seed::ADMIN_EMAIL);
            println!("user   {}  {}", summary.user.id, seed::USER_EMAIL);
            println!("password for both: {}", seed::DEMO_PASSWORD);
        }
        Commands::IssueToken { user_id } => {
            let config = AuthConfig::from_env()?;
            let db = connect(&cli).await?;
            let token = issue_token(&config, &db, *user_id).await?;
            println!("{token}");
        }
        Commands::InspectToken { token } => {
            let config = AuthConfig::from_env()?;
            let codec = TokenCodec::new(&config)?;
            let raw = parse_bearer(token).unwrap_or_else(|| token.trim().to_string());
            let report = codec.inspect_at(&raw, chrono::Utc::now());
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<DbManager> {
    let config = cli.db_config();
    let db = DbManager::connect(&config)
        .await
        .with_context(|| format!("cannot connect to {}", config.url))?;
    if config.is_memory() {
        run_migrations(db.client()).await?;
    }
    Ok(db)
}

async fn issue_token(config: &AuthConfig, db: &DbManager, user_id: Uuid) -> anyhow::Result<String> {
    let users = SurrealUserRepository::new(db.client().clone());
    let user = users
        .get_by_id(user_id)
        .await
        .with_context(|| format!("no user {user_id}"))?;
    if !user.is_active {
        bail!("user {user_id} is deactivated");
    }

    let token = TokenCodec::new(config)?.issue(user.id)?;
    info!(user_id = %user.id, "Access token issued");
    Ok(token)
}
