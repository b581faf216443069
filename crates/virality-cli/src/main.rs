mod analyses;
mod setup;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::analyses::{AnalysesCommands, ApiArgs};
use crate::setup::SetupCommands;

#[derive(Debug, Parser)]
#[command(name = "virality-cli")]
#[command(about = "Virality Analyzer command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage user profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// List, inspect, submit, and update analyses through the API
    Analyses {
        #[command(flatten)]
        api: ApiArgs,
        #[command(subcommand)]
        command: AnalysesCommands,
    },
    /// Show remaining credits through the API
    Credits {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Local development setup
    Setup {
        #[command(subcommand)]
        command: SetupCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum ProfileCommands {
    /// Create a profile or reset its credits and tier
    Seed {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long, default_value_t = 10)]
        credits: i32,
        #[arg(long, default_value = "free")]
        tier: String,
    },
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let config = virality_core::load_app_config()?;
    let pool_config = virality_db::PoolConfig::from_app_config(&config);
    Ok(virality_db::connect_pool(&config.database_url, pool_config).await?)
}

async fn run_db(command: DbCommands) -> anyhow::Result<()> {
    let pool = connect().await?;
    match command {
        DbCommands::Ping => {
            virality_db::ping(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = virality_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

async fn run_profile(command: ProfileCommands) -> anyhow::Result<()> {
    match command {
        ProfileCommands::Seed {
            user_id,
            credits,
            tier,
        } => {
            if credits < 0 {
                anyhow::bail!("--credits must be zero or more, got {credits}");
            }
            let pool = connect().await?;
            let profile = virality_db::upsert_profile(&pool, user_id, credits, &tier).await?;
            println!(
                "profile {} has {} credit(s) on the {} tier",
                profile.user_id, profile.credits_remaining, profile.subscription_tier
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Db { command }) => run_db(command).await,
        Some(Commands::Profile { command }) => run_profile(command).await,
        Some(Commands::Analyses { api, command }) => analyses::run(&api, command).await,
        Some(Commands::Credits { api }) => analyses::run_credits(&api).await,
        Some(Commands::Setup { command }) => setup::run(command),
        None => {
            println!("virality-cli: run with --help to see available commands");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
