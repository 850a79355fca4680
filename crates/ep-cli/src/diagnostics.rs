//! `evprep inspect` and `evprep dump`.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use ep_io::{EventTable, describe, dump_events};

pub fn cmd_inspect(path: &Path, head: usize) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    describe(path, head, &mut out).with_context(|| format!("failed to inspect {}", path.display()))?;
    out.flush()?;
    Ok(())
}

pub fn cmd_dump(path: &Path, events: usize) -> Result<()> {
    tracing::info!(path = %path.display(), "reading events");
    let table = EventTable::read_parquet(path, Some(events))
        .with_context(|| format!("failed to read {}", path.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    dump_events(&table, events, &mut out)?;
    out.flush()?;
    Ok(())
}
