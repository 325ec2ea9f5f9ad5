use anyhow::Result;

use crate::output::config::OutputConfig;
use crate::output::types::{Body, Envelope, Meta};
use crate::output::Emitter;

pub fn print(op: &'static str, body: Body, meta: Option<Meta>) -> Result<()> {
    Emitter::new(OutputConfig::from_env()).emit(&Envelope::new(op, body, meta))?;
    Ok(())
}
