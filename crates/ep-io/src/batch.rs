//! Slurm job scripts, one per input file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use ep_core::Result;

use crate::config::{BatchConfig, RunConfig};

/// Flags forwarded to the generated jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Write scripts without calling `sbatch`.
    pub dry_run: bool,
    /// Run the jobs with debug logging.
    pub debug: bool,
    /// Resubmit files whose output already exists.
    pub overwrite: bool,
}

/// Result of [`submit_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Scripts written, in file order.
    pub scripts: Vec<PathBuf>,
    /// Files skipped because their output exists.
    pub skipped: usize,
    /// Scripts handed to `sbatch` successfully.
    pub submitted: usize,
}

/// One Slurm job converting a single input file.
#[derive(Debug, Clone)]
pub struct SlurmJob<'a> {
    /// `--job-name`
    pub name: String,
    /// Resource settings.
    pub batch: &'a BatchConfig,
    /// Directory receiving stdout / stderr files.
    pub log_dir: PathBuf,
    /// Command line run by the job.
    pub command: String,
}

impl SlurmJob<'_> {
    /// The `#SBATCH` script.
    pub fn render(&self) -> String {
        let b = self.batch;
        let log = self.log_dir.join(&self.name);
        let log = log.display();

        let mut s = String::from("#!/bin/bash\n");
        let _ = writeln!(s, "#SBATCH --job-name={}", self.name);
        if let Some(partition) = &b.partition {
            let _ = writeln!(s, "#SBATCH --partition={partition}");
        }
        if let Some(account) = &b.account {
            let _ = writeln!(s, "#SBATCH --account={account}");
        }
        let _ = writeln!(s, "#SBATCH --output={log}-%j.out");
        let _ = writeln!(s, "#SBATCH --error={log}-%j.err");
        let _ = writeln!(s, "#SBATCH --ntasks=1");
        let _ = writeln!(s, "#SBATCH --time={}", b.time);
        let _ = writeln!(s, "#SBATCH --cpus-per-task={}", b.cpu_count);
        let _ = writeln!(s, "#SBATCH --mem={}G", b.memory_gb);
        s.push('\n');
        for line in &b.setup {
            let _ = writeln!(s, "{line}");
        }
        let _ = writeln!(s, "{}", self.command);
        s
    }
}

fn quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

fn job_command(
    config: &RunConfig,
    config_path: &Path,
    input: &Path,
    index: usize,
    opts: BatchOptions,
) -> String {
    let mut cmd = format!(
        "{} convert -c {} -i {} --file-index-offset {index}",
        config.batch.executable,
        quote(config_path),
        quote(input)
    );
    if let Some(sub) = &config.output.subfolder {
        let _ = write!(cmd, " -o {}", quote(Path::new(sub)));
    }
    if let Some(max) = config.input.max_events_per_file {
        let _ = write!(cmd, " -m {max}");
    }
    if opts.overwrite {
        cmd.push_str(" -k");
    }
    if opts.debug {
        cmd.push_str(" --debug");
    }
    cmd
}

/// Directory holding the `logs/` and `submission/` folders of a configuration.
pub fn slurm_dir(config: &RunConfig, config_path: &Path) -> PathBuf {
    let stem = config_path.file_stem().map(|s| s.to_string_lossy().into_owned());
    config.output_dir().join("slurm").join(stem.unwrap_or_else(|| "config".to_string()))
}

/// Write one job script per input file and submit it unless `dry_run`.
pub fn submit_batch(config: &RunConfig, config_path: &Path, opts: BatchOptions) -> Result<BatchSummary> {
    let config_path = std::fs::canonicalize(config_path).unwrap_or_else(|_| config_path.to_path_buf());
    let job_dir = slurm_dir(config, &config_path);
    let log_dir = job_dir.join("logs");
    let submission_dir = job_dir.join("submission");
    std::fs::create_dir_all(&log_dir)?;
    std::fs::create_dir_all(&submission_dir)?;
    tracing::info!(path = %job_dir.display(), "writing Slurm submission files");

    let mut summary = BatchSummary::default();
    for (index, input) in config.input.resolved.iter().enumerate() {
        if config.batch.max_files.is_some_and(|max| index >= max) {
            tracing::info!(max_files = index, "reached maximum number of files");
            break;
        }
        let out_dir = config.file_output_dir(index);
        if !opts.overwrite && out_dir.exists() {
            tracing::info!(output = %out_dir.display(), "output exists, not submitting");
            summary.skipped += 1;
            continue;
        }

        let job = SlurmJob {
            name: format!("{}_{index:03}", config.batch.name),
            batch: &config.batch,
            log_dir: log_dir.clone(),
            command: job_command(config, &config_path, input, index, opts),
        };
        let script = submission_dir.join(format!("{}.sh", job.name));
        std::fs::write(&script, job.render())?;
        tracing::debug!(script = %script.display(), "job script written");

        if !opts.dry_run {
            match Command::new("sbatch").arg(&script).status() {
                Ok(status) if status.success() => summary.submitted += 1,
                Ok(status) => tracing::warn!(script = %script.display(), %status, "sbatch failed"),
                Err(e) => tracing::warn!(script = %script.display(), error = %e, "could not run sbatch"),
            }
        }
        summary.scripts.push(script);
    }

    tracing::info!(
        scripts = summary.scripts.len(),
        submitted = summary.submitted,
        skipped = summary.skipped,
        "batch preparation finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(out: &Path) -> RunConfig {
        let text = format!(
            "input: {{ files: '*.parquet', max_events_per_file: 50 }}\n\
             output: {{ path: {} }}\n\
             batch: {{ name: job, partition: roma, max_files: 2, setup: ['source env.sh'] }}\n",
            out.display()
        );
        let mut config = RunConfig::from_yaml_str(&text).unwrap();
        config.input.resolved = vec!["/in/a.parquet".into(), "/in/b.parquet".into(), "/in/c.parquet".into()];
        config
    }

    #[test]
    fn test_render_script() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let job = SlurmJob {
            name: "job_001".into(),
            batch: &config.batch,
            log_dir: PathBuf::from("/logs"),
            command: job_command(
                &config,
                Path::new("/cfg/run.yaml"),
                Path::new("/in/b.parquet"),
                1,
                BatchOptions { debug: true, ..Default::default() },
            ),
        };
        let script = job.render();
        assert!(script.starts_with("#!/bin/bash\n#SBATCH --job-name=job_001\n"));
        assert!(script.contains("#SBATCH --partition=roma\n"));
        assert!(!script.contains("--account"));
        assert!(script.contains("#SBATCH --output=/logs/job_001-%j.out\n"));
        assert!(script.contains("#SBATCH --mem=4G\n"));
        assert!(script.contains("source env.sh\n"));
        assert!(script.ends_with(
            "evprep convert -c '/cfg/run.yaml' -i '/in/b.parquet' --file-index-offset 1 -m 50 --debug\n"
        ));
    }

    #[test]
    fn test_dry_run_writes_scripts_and_respects_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        std::fs::create_dir_all(config.file_output_dir(0)).unwrap();
        let cfg_path = tmp.path().join("run.yaml");

        let opts = BatchOptions { dry_run: true, ..Default::default() };
        let summary = submit_batch(&config, &cfg_path, opts).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.scripts.len(), 1);
        assert!(summary.scripts[0].ends_with("slurm/run/submission/job_001.sh"));
        assert!(summary.scripts[0].is_file());

        let opts = BatchOptions { dry_run: true, overwrite: true, ..Default::default() };
        let summary = submit_batch(&config, &cfg_path, opts).unwrap();
        assert_eq!(summary.scripts.len(), 2);
    }
}
