//! Write-only diagnostic output
//!
//! Received messages are echoed as `TOPIC=` / `DATA=` lines. Nothing written
//! here is read back by the orchestrator.

use std::io::{self, Write};

pub trait DiagnosticSink: Send + Sync {
    /// A message arrived; both slices are already bounded to their reported lengths
    fn received(&self, topic: &[u8], payload: &[u8]);
}

/// Writes diagnostic lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDiagnostics;

impl ConsoleDiagnostics {
    fn write_lines(out: &mut impl Write, topic: &[u8], payload: &[u8]) -> io::Result<()> {
        out.write_all(b"TOPIC=")?;
        out.write_all(topic)?;
        out.write_all(b"\r\nDATA=")?;
        out.write_all(payload)?;
        out.write_all(b"\r\n")?;
        out.flush()
    }
}

impl DiagnosticSink for ConsoleDiagnostics {
    fn received(&self, topic: &[u8], payload: &[u8]) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = Self::write_lines(&mut out, topic, payload) {
            tracing::warn!("Failed to write diagnostics: {}", e);
        }
    }
}
