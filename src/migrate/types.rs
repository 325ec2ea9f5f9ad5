use serde::Serialize;

// Plan envelope types
#[derive(Serialize)]
pub struct MigratePlan {
    pub source: String,
    pub dest: String,
    pub source_documents: u64,
    pub dest_documents: u64,
    pub batch_size: usize,
    pub planned_batches: u64,
    pub sample_ids: Vec<String>,
}

/// Run counters. Built incrementally, emitted once at the end, never persisted.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total: u64,
    pub batches_committed: usize,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool { self.failed == 0 }
}

pub fn planned_batches(documents: u64, batch_size: usize) -> u64 {
    documents.div_ceil(batch_size.max(1) as u64)
}

pub fn render_summary(report: &MigrationReport) -> String {
    let rule = "=".repeat(50);
    let outcome = if report.is_clean() {
        "🎉 Migration completed successfully!"
    } else {
        "⚠️  Migration completed with some errors"
    };
    format!(
        "\n{rule}\n📈 Migration Summary:\n{rule}\n✅ Successful: {}\n❌ Failed: {}\n🔁 Attempted: {}\n📊 Total: {}\n💾 Batches committed: {}\n{rule}\n\n{outcome}\n",
        report.succeeded, report.failed, report.attempted, report.total, report.batches_committed,
    )
}
