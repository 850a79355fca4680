//! File-by-file conversion driver.

use std::fmt;
use std::path::Path;

use ep_core::Result;

use crate::config::RunConfig;
use crate::defines::{DefineSet, apply_defines};
use crate::export::write_datasets;
use crate::table::EventTable;

/// Outcome counts of a [`Converter::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Files converted.
    pub converted: usize,
    /// Files skipped because their output already existed.
    pub skipped: usize,
    /// Files that failed to read, derive or export.
    pub failed: usize,
}

impl fmt::Display for ConvertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} converted, {} skipped, {} failed", self.converted, self.skipped, self.failed)
    }
}

/// Converts every resolved input file of a [`RunConfig`] into its output directory.
#[derive(Debug)]
pub struct Converter<'a> {
    config: &'a RunConfig,
    overwrite: bool,
}

impl<'a> Converter<'a> {
    /// Converter that skips inputs whose output directory already exists.
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config, overwrite: false }
    }

    /// Replace existing outputs instead of skipping them.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Convert all inputs. Input file `i` is written to `output_{i + file_index_offset:03}`.
    ///
    /// A failing file is logged and counted; the remaining files still run.
    /// Only configuration errors abort the whole run.
    pub fn run(&self, file_index_offset: usize) -> Result<ConvertSummary> {
        let defines = self.config.define_sets()?;
        let inputs = &self.config.input.resolved;
        let output_dir = self.config.output_dir();
        std::fs::create_dir_all(&output_dir)?;
        tracing::info!(output = %output_dir.display(), inputs = inputs.len(), "starting conversion");

        let mut summary = ConvertSummary::default();
        for (i, input) in inputs.iter().enumerate() {
            let index = i + file_index_offset;
            let out_dir = self.config.file_output_dir(index);
            tracing::info!(file = index, of = inputs.len() + file_index_offset, path = %input.display(), "converting");

            if out_dir.exists() {
                if !self.overwrite {
                    tracing::info!(output = %out_dir.display(), "output exists, skipping");
                    summary.skipped += 1;
                    continue;
                }
                tracing::info!(output = %out_dir.display(), "output exists, removing for overwrite");
                std::fs::remove_dir_all(&out_dir)?;
            }

            match self.convert_file(input, &out_dir, &defines) {
                Ok(()) => summary.converted += 1,
                Err(e) => {
                    tracing::error!(path = %input.display(), error = %e, "conversion failed");
                    summary.failed += 1;
                    if out_dir.exists() {
                        if let Err(e) = std::fs::remove_dir_all(&out_dir) {
                            tracing::warn!(output = %out_dir.display(), error = %e, "could not remove partial output");
                        }
                    }
                }
            }
        }

        tracing::info!(%summary, "conversion finished");
        Ok(summary)
    }

    fn convert_file(&self, input: &Path, out_dir: &Path, defines: &[DefineSet]) -> Result<()> {
        let max_events = self.config.input.max_events_per_file;
        if let Some(max) = max_events {
            tracing::info!(max_events = max, "limiting events per file");
        }
        let mut table = EventTable::read_parquet(input, max_events)?;
        apply_defines(&mut table, defines, &self.config.association)?;

        std::fs::create_dir_all(out_dir)?;
        let written = write_datasets(&table, self.config, out_dir)?;
        tracing::info!(output = %out_dir.display(), datasets = written.len(), events = table.n_events(), "file converted");
        Ok(())
    }
}
