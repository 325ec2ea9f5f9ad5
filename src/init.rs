use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::Instrument;

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, default_value_t = false)] pub apply: bool,
}

#[derive(Serialize)]
struct InitPlan { migrations: Vec<String> }

#[derive(Serialize)]
struct InitResult { applied: usize }

pub async fn run(pool: &PgPool, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span_kv([("apply", args.apply.to_string())]).entered();

    let names: Vec<String> = MIGRATOR
        .iter()
        .map(|m| format!("{}_{}", m.version, m.description))
        .collect();

    if !args.apply {
        let _p = log.span(&InitPhase::Plan).entered();
        if telemetry::config::json_mode() {
            log.plan(&InitPlan { migrations: names })?;
        } else {
            log.info(format!("📝 Init plan — {} migration(s) embedded", names.len()));
            for n in &names { log.info(format!("  {}", n)); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    MIGRATOR
        .run(pool)
        .instrument(log.span(&InitPhase::Migrate))
        .await
        .context("applying docstore migrations")?;
    log.info("✅ Document store initialized");

    if telemetry::config::json_mode() {
        log.result(&InitResult { applied: names.len() })?;
    }
    Ok(())
}
