use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Migrate;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Validate, ReadPage, Extract, Stage, Commit, Report }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Validate => "validate",
        Phase::ReadPage => "read_page",
        Phase::Extract => "extract",
        Phase::Stage => "stage",
        Phase::Commit => "commit",
        Phase::Report => "report",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Validate => info_span!("validate"),
        Phase::ReadPage => info_span!("read_page"),
        Phase::Extract => info_span!("extract"),
        Phase::Stage => info_span!("stage"),
        Phase::Commit => info_span!("commit"),
        Phase::Report => info_span!("report"),
    }}
}

impl OpMarker for Migrate {
    const NAME: &'static str = "migrate";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("migrate") }
}
