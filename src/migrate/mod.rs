use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use crate::output::types::Meta;
use crate::store::pg::PgStore;
use crate::store::DocumentStore;
use crate::telemetry::{self};
use crate::telemetry::ops::migrate::Phase as MigratePhase;

pub mod controller;
pub mod error;
pub mod profile;
pub mod reader;
pub mod types;
pub mod validate;
pub mod writer;

use controller::MigrationSettings;
use types::{planned_batches, render_summary, MigratePlan, MigrationReport};
use validate::{AssumeYes, Confirm, ConsolePrompt, ProceedDecision};
use writer::{effective_batch_size, RetryPolicy};

#[derive(Args, Debug)]
pub struct MigrateCmd {
    #[arg(long, default_value = "users")] pub source: String,
    #[arg(long, default_value = "publicProfiles")] pub dest: String,
    #[arg(long, default_value_t = 500)] pub batch_size: usize,
    #[arg(long, default_value_t = 500)] pub page_size: usize,
    #[arg(long, default_value_t = 0)] pub retries: u32,
    #[arg(long, default_value_t = 250)] pub retry_delay_ms: u64,
    #[arg(long, default_value_t = false)] pub apply: bool,
    /// Answer the overwrite confirmation with "yes" without prompting
    #[arg(long, default_value_t = false)] pub yes: bool,
    #[arg(long, default_value_t = 10)] pub plan_limit: usize,
}

impl MigrateCmd {
    fn settings(&self) -> MigrationSettings {
        MigrationSettings {
            source: self.source.clone(),
            dest: self.dest.clone(),
            batch_size: effective_batch_size(self.batch_size),
            page_size: self.page_size.max(1),
            retry: if self.retries == 0 {
                RetryPolicy::none()
            } else {
                RetryPolicy { max_retries: self.retries, base_delay: Duration::from_millis(self.retry_delay_ms) }
            },
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Aborted,
    Completed(MigrationReport),
}

#[derive(Serialize)]
struct AbortedResult { aborted: bool, writes: u64 }

pub async fn run(pool: &PgPool, args: MigrateCmd) -> Result<()> {
    let log = telemetry::migrate();
    let settings = args.settings();
    let _g = log.root_span_kv([
        ("source", settings.source.clone()),
        ("dest", settings.dest.clone()),
        ("batch_size", settings.batch_size.to_string()),
        ("page_size", settings.page_size.to_string()),
        ("retries", args.retries.to_string()),
        ("apply", args.apply.to_string()),
        ("yes", args.yes.to_string()),
    ]).entered();

    let store = PgStore::new(pool.clone());

    if !args.apply {
        let plan = build_plan(&store, &settings, args.plan_limit)
            .instrument(log.span(&MigratePhase::Plan))
            .await?;
        if telemetry::config::json_mode() {
            log.plan(&plan)?;
        } else {
            log.info(format!(
                "📝 Migrate plan — {} ({} docs) → {} ({} docs) batch={} batches={}",
                plan.source, plan.source_documents, plan.dest, plan.dest_documents, plan.batch_size, plan.planned_batches
            ));
            for id in &plan.sample_ids { log.info(format!("  id={}", id)); }
            if (plan.sample_ids.len() as u64) < plan.source_documents { log.info("  ... (more up to source count)"); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let started = Instant::now();
    let outcome = if args.yes {
        execute(&store, &settings, &mut AssumeYes).await?
    } else {
        execute(&store, &settings, &mut ConsolePrompt::stdio()).await?
    };

    match outcome {
        Outcome::Aborted => {
            if telemetry::config::json_mode() {
                log.result(&AbortedResult { aborted: true, writes: 0 })?;
            }
        }
        Outcome::Completed(report) => {
            let _r = log.span(&MigratePhase::Report).entered();
            log.report(&report);
            if telemetry::config::json_mode() {
                let meta = Meta { duration_ms: Some(started.elapsed().as_millis()), run_id: Some(Uuid::new_v4().to_string()) };
                log.result_meta(&report, meta)?;
            } else {
                print!("{}", render_summary(&report));
            }
        }
    }
    Ok(())
}

/// Validation gate followed by the migration itself.
pub async fn execute<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &MigrationSettings,
    confirm: &mut dyn Confirm,
) -> Result<Outcome> {
    let log = telemetry::migrate();
    let decision = validate::validate(store, &settings.dest, confirm)
        .instrument(log.span(&MigratePhase::Validate))
        .await
        .context("pre-flight validation failed")?;
    if decision == ProceedDecision::Abort {
        return Ok(Outcome::Aborted);
    }

    log.info("🚀 Starting migration...");
    let report = controller::run(store, settings)
        .await
        .with_context(|| format!("migration {} → {} failed", settings.source, settings.dest))?;
    Ok(Outcome::Completed(report))
}

async fn build_plan<S: DocumentStore + ?Sized>(store: &S, settings: &MigrationSettings, plan_limit: usize) -> Result<MigratePlan> {
    let source_documents = store
        .count(&settings.source)
        .await
        .with_context(|| format!("counting source collection {}", settings.source))?;
    let dest_documents = store
        .count(&settings.dest)
        .await
        .with_context(|| format!("counting destination collection {}", settings.dest))?;
    let sample_ids = if plan_limit == 0 {
        vec![]
    } else {
        store
            .fetch_page(&settings.source, None, plan_limit)
            .await
            .with_context(|| format!("sampling source collection {}", settings.source))?
            .into_iter()
            .map(|r| r.id)
            .collect()
    };
    Ok(MigratePlan {
        source: settings.source.clone(),
        dest: settings.dest.clone(),
        source_documents,
        dest_documents,
        batch_size: settings.batch_size,
        planned_batches: planned_batches(source_documents, settings.batch_size),
        sample_ids,
    })
}
