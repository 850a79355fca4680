//! `evprep convert`, `clean` and `batch`: the run-configuration driven commands.

use anyhow::{Context, Result};
use std::path::Path;

use ep_io::{BatchOptions, Converter, RunConfig, delete_incomplete_outputs, submit_batch};

fn load_config(
    config: &Path,
    input: Option<&Path>,
    output_subfolder: Option<&str>,
    max_events_per_file: Option<usize>,
) -> Result<RunConfig> {
    let mut run = RunConfig::load(config, input, output_subfolder)
        .with_context(|| format!("failed to load configuration {}", config.display()))?;
    if let Some(max) = max_events_per_file {
        if max == 0 {
            anyhow::bail!("--max-events-per-file must be greater than 0");
        }
        run.input.max_events_per_file = Some(max);
    }
    Ok(run)
}

pub fn cmd_convert(
    config: &Path,
    input: Option<&Path>,
    output_subfolder: Option<&str>,
    max_events_per_file: Option<usize>,
    file_index_offset: usize,
    overwrite: bool,
) -> Result<()> {
    let run = load_config(config, input, output_subfolder, max_events_per_file)?;
    tracing::info!(output = %run.output_dir().display(), "writing outputs");
    for file in &run.input.resolved {
        tracing::debug!(path = %file.display(), "input file");
    }

    let summary = Converter::new(&run)
        .overwrite(overwrite)
        .run(file_index_offset)
        .context("conversion failed")?;
    if summary.failed > 0 {
        anyhow::bail!("{} of {} input files failed to convert", summary.failed, run.input.resolved.len());
    }
    Ok(())
}

pub fn cmd_clean(config: &Path, output_subfolder: Option<&str>, dry_run: bool) -> Result<()> {
    let run = load_config(config, None, output_subfolder, None)?;
    let counts = delete_incomplete_outputs(&run, dry_run).context("output cleanup failed")?;
    println!("{counts}");
    Ok(())
}

pub fn cmd_batch(
    config: &Path,
    output_subfolder: Option<&str>,
    max_events_per_file: Option<usize>,
    dry_run: bool,
    debug: bool,
    overwrite: bool,
) -> Result<()> {
    let run = load_config(config, None, output_subfolder, max_events_per_file)?;
    let summary = submit_batch(&run, config, BatchOptions { dry_run, debug, overwrite })
        .context("batch preparation failed")?;
    for script in &summary.scripts {
        println!("{}", script.display());
    }
    Ok(())
}
