use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;
use tracing::Instrument;

use crate::store::pg::PgStore;
use crate::telemetry::{self};
use crate::telemetry::ops::stats::Phase as StatsPhase;

#[derive(Args, Debug)]
pub struct StatsCmd {
    /// Only report these collections
    #[arg(long = "collection")] pub collections: Vec<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct CollectionCount { pub collection: String, pub documents: i64 }

pub async fn run(pool: &PgPool, args: StatsCmd) -> Result<()> {
    let log = telemetry::stats();
    let _g = log.root_span_kv([("collections", format!("{:?}", args.collections))]).entered();

    let store = PgStore::new(pool.clone());
    let counts = store
        .collection_counts()
        .instrument(log.span(&StatsPhase::Count))
        .await
        .context("counting documents per collection")?;
    let rows = select(counts, &args.collections);

    if telemetry::config::json_mode() {
        log.result(&rows)?;
    } else {
        println!("{:<32} {:>12}", "collection", "documents");
        for r in &rows { println!("{:<32} {:>12}", r.collection, r.documents); }
    }
    Ok(())
}

/// Filters to the requested collections, listing requested-but-empty ones with zero.
fn select(counts: Vec<(String, i64)>, wanted: &[String]) -> Vec<CollectionCount> {
    if wanted.is_empty() {
        return counts.into_iter().map(|(collection, documents)| CollectionCount { collection, documents }).collect();
    }
    wanted
        .iter()
        .map(|w| CollectionCount {
            collection: w.clone(),
            documents: counts.iter().find(|(c, _)| c == w).map(|(_, n)| *n).unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_keeps_requested_order_and_fills_missing() {
        let counts = vec![("publicProfiles".to_string(), 2), ("users".to_string(), 5)];
        let rows = select(counts.clone(), &["users".into(), "posts".into()]);
        assert_eq!(rows, vec![
            CollectionCount { collection: "users".into(), documents: 5 },
            CollectionCount { collection: "posts".into(), documents: 0 },
        ]);
        assert_eq!(select(counts, &[]).len(), 2);
    }
}
