//! Command-line interface for the `custos` operator binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use custos_db::DbConfig;
use uuid::Uuid;

/// Custos operator tool: schema migrations, demo data and token
/// diagnostics.
#[derive(Parser, Debug)]
#[command(name = "custos", version, about, long_about = None, propagate_version = true)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CUSTOS_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "CUSTOS_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Use the embedded in-memory database instead of `--db-url`
    #[arg(long, global = true)]
    pub memory: bool,

    #[command(flatten)]
    pub db: DbArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Create the demo roles, elements, rule matrix and accounts
    ///
    /// Safe to run repeatedly; existing records are left untouched.
    #[command(name = "seed-demo")]
    SeedDemo,

    /// Issue an access token for an active user
    #[command(name = "issue-token")]
    IssueToken {
        /// User ID
        user_id: Uuid,
    },

    /// Verify an access token and report which check failed, if any
    #[command(name = "inspect-token")]
    InspectToken {
        /// Raw token or a full `Bearer <token>` header value
        token: String,
    },
}

/// SurrealDB connection flags.
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// SurrealDB endpoint
    #[arg(long = "db-url", default_value = "ws://127.0.0.1:8000", env = "CUSTOS_DB_URL", global = true)]
    pub url: String,

    #[arg(long = "db-namespace", default_value = "custos", env = "CUSTOS_DB_NAMESPACE", global = true)]
    pub namespace: String,

    #[arg(long = "db-database", default_value = "main", env = "CUSTOS_DB_DATABASE", global = true)]
    pub database: String,

    #[arg(long = "db-user", default_value = "root", env = "CUSTOS_DB_USER", global = true)]
    pub username: String,

    #[arg(long = "db-password", default_value = "root", env = "CUSTOS_DB_PASSWORD", global = true, hide_env_values = true)]
    pub password: String,
}

impl Cli {
    pub fn db_config(&self) -> DbConfig {
        if self.memory {
            return DbConfig {
                namespace: self.db.namespace.clone(),
                database: self.db.database.clone(),
                ..DbConfig::memory()
            };
        }
        DbConfig {
            url: self.db.url.clone(),
            namespace: self.db.namespace.clone(),
            database: self.db.database.clone(),
            username: self.db.username.clone(),
            password: self.db.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per event
    Json,
}
