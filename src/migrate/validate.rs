use std::io::{self, BufRead, Write};

use crate::store::DocumentStore;
use crate::telemetry::{self};

use super::error::MigrateError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProceedDecision {
    Proceed,
    Abort,
}

/// Line-oriented operator confirmation. The only blocking read in a run.
pub trait Confirm {
    fn ask(&mut self, prompt: &str) -> io::Result<String>;
}

pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ConsolePrompt { input, output }
    }
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        ConsolePrompt::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Confirm for ConsolePrompt<R, W> {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = Vec::new();
        self.input.read_until(b'\n', &mut line)?;
        // Undecodable bytes can never spell "yes"; they read as a decline.
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Pre-answers every confirmation (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn ask(&mut self, _prompt: &str) -> io::Result<String> {
        Ok("yes".to_string())
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Gates the run on operator confirmation when the destination already holds documents.
pub async fn validate<S: DocumentStore + ?Sized>(
    store: &S,
    dest: &str,
    confirm: &mut dyn Confirm,
) -> Result<ProceedDecision, MigrateError> {
    let log = telemetry::migrate();
    let existing = store
        .count(dest)
        .await
        .map_err(|source| MigrateError::DestinationUnavailable { collection: dest.to_string(), source })?;

    if existing == 0 {
        log.debug_kv("destination empty, no confirmation needed", [("dest", dest.to_string())]);
        return Ok(ProceedDecision::Proceed);
    }

    log.warn_kv(
        &format!("⚠️  Warning: {} documents already exist in {} collection", existing, dest),
        [("dest", dest.to_string()), ("existing", existing.to_string())],
    );
    log.warn(format!("This run will merge/overwrite existing documents in {}", dest));

    let prompt = format!("{} documents already exist in {}. Continue? (yes/no): ", existing, dest);
    let answer = confirm.ask(&prompt).map_err(MigrateError::ConsoleUnavailable)?;
    if is_affirmative(&answer) {
        Ok(ProceedDecision::Proceed)
    } else {
        log.info("Migration cancelled");
        Ok(ProceedDecision::Abort)
    }
}
