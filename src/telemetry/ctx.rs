use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::Span;

use super::emit;
use crate::migrate::types::MigrationReport;
use crate::output::types::{Body, Meta};
use crate::telemetry::ops::migrate::Migrate;

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Level { Debug, Info, Warn, Error }

// tracing needs the level at the call site, so every event goes through this match.
macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            Level::Debug => tracing::debug!($($rest)+),
            Level::Info => tracing::info!($($rest)+),
            Level::Warn => tracing::warn!($($rest)+),
            Level::Error => tracing::error!($($rest)+),
        }
    };
}

/// Logger for one command. Human mode logs the bare message; JSON mode adds `op` and `details`.
pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = O::root_span();
        self.announce(None, render_fields(fields));
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = ph.span();
        self.announce(Some(ph.name()), render_fields(fields));
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { self.event(Level::Info, msg.as_ref(), String::new()) }
    pub fn warn(&self, msg: impl AsRef<str>) { self.event(Level::Warn, msg.as_ref(), String::new()) }

    pub fn info_kv<'a, D: IntoIterator<Item = (&'a str, String)>>(&self, msg: &str, kv: D) {
        self.event(Level::Info, msg, render_fields(kv))
    }

    pub fn debug_kv<'a, D: IntoIterator<Item = (&'a str, String)>>(&self, msg: &str, kv: D) {
        self.event(Level::Debug, msg, render_fields(kv))
    }

    pub fn warn_kv<'a, D: IntoIterator<Item = (&'a str, String)>>(&self, msg: &str, kv: D) {
        self.event(Level::Warn, msg, render_fields(kv))
    }

    pub fn error_kv<'a, D: IntoIterator<Item = (&'a str, String)>>(&self, msg: &str, kv: D) {
        self.event(Level::Error, msg, render_fields(kv))
    }

    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> { emit::print(O::NAME, Body::plan(plan)?, None) }
    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> { emit::print(O::NAME, Body::result(result)?, None) }
    pub fn result_meta<T: Serialize>(&self, result: &T, meta: Meta) -> Result<()> {
        emit::print(O::NAME, Body::result(result)?, Some(meta))
    }

    fn event(&self, level: Level, msg: &str, details: String) {
        let op = O::NAME;
        match (self.json, details.is_empty()) {
            (false, _) => event_at!(level, "{}", msg),
            (true, true) => event_at!(level, op = %op, "{}", msg),
            (true, false) => event_at!(level, op = %op, details = %details, "{}", msg),
        }
    }

    // Span openings are always structured, whatever the log format.
    fn announce(&self, phase: Option<&'static str>, details: String) {
        let op = O::NAME;
        match (phase, details.is_empty()) {
            (None, true) => tracing::info!(op = %op, "start"),
            (None, false) => tracing::info!(op = %op, details = %details, "start"),
            (Some(ph), true) => tracing::info!(op = %op, phase = ph, "span_start"),
            (Some(ph), false) => tracing::info!(op = %op, phase = ph, details = %details, "span_start"),
        }
    }
}

impl LogCtx<Migrate> {
    pub fn report(&self, r: &MigrationReport) {
        if self.json {
            tracing::info!(
                op = Migrate::NAME,
                attempted = r.attempted,
                succeeded = r.succeeded,
                failed = r.failed,
                total = r.total,
                batches = r.batches_committed,
                "migrate_report"
            );
        } else {
            self.info(format!(
                "📈 Migrate totals: attempted={} succeeded={} failed={} total={} batches={}",
                r.attempted, r.succeeded, r.failed, r.total, r.batches_committed
            ));
        }
    }
}

fn render_fields<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    kv.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ")
}
