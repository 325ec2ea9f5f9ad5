use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

mod init;
mod migrate;
mod output;
mod stats;
mod store;
mod telemetry;

#[derive(Parser)]
#[command(name = "pmig", about = "Copy public profile fields from users into publicProfiles")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    Migrate(migrate::MigrateCmd),
    Stats(stats::StatsCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);
    telemetry::config::init_tracing();

    let dsn = cli
        .dsn
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("Please provide --dsn or set DATABASE_URL in .env")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .context("connecting to the document store")?;

    match cli.command {
        Commands::Init(args) => init::run(&pool, args).await?,
        Commands::Migrate(args) => migrate::run(&pool, args).await?,
        Commands::Stats(args) => stats::run(&pool, args).await?,
    }

    Ok(())
}
