use std::process;

use anyhow::Context;
use clap::{Args, Parser};

use novus_auth::{Role, Session};
use novus_core::UserId;
use novus_infra::{AppConfig, SqliteStore};

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "novus")]
#[command(about = "Novus manufacturing operations: orders, materials and approvals")]
#[command(version)]
struct Cli {
    /// Database URL (overrides NOVUS_DATABASE_URL)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(flatten)]
    actor: Actor,

    #[command(subcommand)]
    command: Commands,
}

/// Who is running the command.
#[derive(Args)]
struct Actor {
    /// Display name recorded with changes
    #[arg(long, env = "NOVUS_USER", default_value = "operator", global = true)]
    user: String,

    /// Role deciding what the user may do (admin, owner, manager, supplier, staff)
    #[arg(long, env = "NOVUS_ROLE", default_value = "staff", global = true)]
    role: String,

    /// Stable user id for history entries; a fresh one is used when omitted
    #[arg(long, env = "NOVUS_USER_ID", global = true)]
    user_id: Option<UserId>,
}

impl Actor {
    fn session(&self) -> Session {
        let user_id = self.user_id.unwrap_or_else(|| {
            tracing::debug!("NOVUS_USER_ID not set; using a one-off user id");
            UserId::new()
        });
        Session::new(user_id, self.user.clone(), Role::new(self.role.clone()))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.database {
        config = config.with_database_url(url);
    }
    novus_observability::init_with(config.log_format);

    let store = SqliteStore::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let session = cli.actor.session();
    let outcome = commands::handle_command(cli.command, &store, &session, &config).await;
    store.close().await;
    outcome
}
