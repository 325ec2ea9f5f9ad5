pub mod config;
pub mod types;

use std::io::{self, Write};

use config::OutputConfig;
use types::Envelope;

/// Writes one envelope per line to stdout.
pub struct Emitter {
    cfg: OutputConfig,
}

impl Emitter {
    pub fn new(cfg: OutputConfig) -> Self {
        Emitter { cfg }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.write_to(env, &mut out)?;
        out.flush()
    }

    pub fn write_to(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.cfg.pretty { serde_json::to_writer_pretty(&mut *w, env)?; } else { serde_json::to_writer(&mut *w, env)?; }
        writeln!(w)
    }
}
