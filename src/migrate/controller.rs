use tracing::Instrument;

use crate::store::DocumentStore;
use crate::telemetry::{self};
use crate::telemetry::ops::migrate::Phase as MigratePhase;

use super::error::MigrateError;
use super::profile::extract;
use super::reader::read_all;
use super::types::MigrationReport;
use super::writer::{BatchWriter, RetryPolicy};

#[derive(Clone, Debug)]
pub struct MigrationSettings {
    pub source: String,
    pub dest: String,
    pub batch_size: usize,
    pub page_size: usize,
    pub retry: RetryPolicy,
}

/// Reads every source document in id order, maps it and commits the results in batches.
/// Records that fail to map are counted and skipped; store faults end the run.
pub async fn run<S: DocumentStore + ?Sized>(store: &S, settings: &MigrationSettings) -> Result<MigrationReport, MigrateError> {
    let log = telemetry::migrate();

    let total = store
        .count(&settings.source)
        .await
        .map_err(|source| MigrateError::SourceUnavailable { collection: settings.source.clone(), source })?;
    if total == 0 {
        log.warn(format!("⚠️  No documents found in {}", settings.source));
    } else {
        log.info(format!("📊 Found {} documents in {}", total, settings.source));
    }

    let mut report = MigrationReport { total, ..Default::default() };
    let mut reader = read_all(store, &settings.source, settings.page_size);
    let mut writer = BatchWriter::new(store, &settings.dest, settings.batch_size, settings.retry);

    loop {
        let page = reader
            .next_page()
            .instrument(log.span(&MigratePhase::ReadPage))
            .await
            .map_err(|e| fatal(&report, e))?;
        if page.is_empty() {
            break;
        }

        for rec in page {
            report.attempted += 1;
            let extracted = {
                let _s = log.span(&MigratePhase::Extract).entered();
                extract(&rec.id, &rec.data)
            };
            match extracted {
                Ok(profile) => {
                    {
                        let _s = log.span(&MigratePhase::Stage).entered();
                        writer.stage(rec.id.clone(), profile);
                    }
                    report.succeeded += 1;
                    log.debug_kv(&format!("✓ {} queued ({})", rec.id, writer.staged()), [("id", rec.id.clone())]);
                    writer.flush_if_full().await.map_err(|e| fatal(&report, e))?;
                }
                Err(e) => {
                    report.failed += 1;
                    log.warn_kv(&format!("✗ Error processing {}: {}", rec.id, e), [
                        ("id", rec.id.clone()),
                        ("error", e.to_string()),
                    ]);
                }
            }
        }
    }

    writer.flush_remaining().await.map_err(|e| fatal(&report, e))?;
    report.batches_committed = writer.committed_batches();
    log.debug_kv(&format!("{} documents written to {}", writer.committed_writes(), settings.dest), [
        ("dest", settings.dest.clone()),
        ("written", writer.committed_writes().to_string()),
    ]);
    Ok(report)
}

fn fatal(report: &MigrationReport, e: MigrateError) -> MigrateError {
    telemetry::migrate().error_kv(&format!("❌ Migration failed: {}", e), [
        ("attempted", report.attempted.to_string()),
        ("succeeded", report.succeeded.to_string()),
        ("failed", report.failed.to_string()),
    ]);
    e
}
