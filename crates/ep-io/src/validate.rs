//! Detection and cleanup of incomplete outputs.

use std::fmt;
use std::fs::File;
use std::path::Path;

use parquet::file::reader::SerializedFileReader;

use ep_core::Result;

use crate::config::RunConfig;

/// State of the output directory of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    /// Every dataset present and readable.
    Good,
    /// At least one dataset missing.
    Incomplete,
    /// A dataset exists but is not a readable Parquet file.
    Corrupted,
    /// No output directory.
    NotFound,
}

/// Per-status file counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// [`OutputStatus::Good`]
    pub good: usize,
    /// [`OutputStatus::Incomplete`]
    pub incomplete: usize,
    /// [`OutputStatus::Corrupted`]
    pub corrupted: usize,
    /// [`OutputStatus::NotFound`]
    pub not_found: usize,
}

impl StatusCounts {
    fn record(&mut self, status: OutputStatus) {
        match status {
            OutputStatus::Good => self.good += 1,
            OutputStatus::Incomplete => self.incomplete += 1,
            OutputStatus::Corrupted => self.corrupted += 1,
            OutputStatus::NotFound => self.not_found += 1,
        }
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} good, {} incomplete, {} corrupted, {} not found",
            self.good, self.incomplete, self.corrupted, self.not_found
        )
    }
}

fn readable_parquet(path: &Path) -> bool {
    File::open(path).ok().is_some_and(|f| SerializedFileReader::new(f).is_ok())
}

/// Classify one output directory against the expected dataset names.
pub fn check_output_dir(dir: &Path, datasets: &[String]) -> OutputStatus {
    if !dir.is_dir() {
        return OutputStatus::NotFound;
    }
    let paths: Vec<_> = datasets.iter().map(|d| dir.join(format!("{d}.parquet"))).collect();
    if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
        tracing::debug!(path = %missing.display(), "dataset missing");
        return OutputStatus::Incomplete;
    }
    if let Some(bad) = paths.iter().find(|p| !readable_parquet(p)) {
        tracing::debug!(path = %bad.display(), "dataset unreadable");
        return OutputStatus::Corrupted;
    }
    OutputStatus::Good
}

/// Check the output of every resolved input file and delete incomplete or
/// corrupted ones unless `dry_run`.
pub fn delete_incomplete_outputs(config: &RunConfig, dry_run: bool) -> Result<StatusCounts> {
    if dry_run {
        tracing::info!("dry run, no outputs will be deleted");
    }
    let datasets = config.dataset_names();
    let n_files = config.input.resolved.len();
    let mut counts = StatusCounts::default();

    for index in 0..n_files {
        let dir = config.file_output_dir(index);
        let status = check_output_dir(&dir, &datasets);
        tracing::debug!(file = index + 1, of = n_files, output = %dir.display(), ?status, "checked");
        counts.record(status);
        if matches!(status, OutputStatus::Incomplete | OutputStatus::Corrupted) {
            if dry_run {
                tracing::info!(output = %dir.display(), ?status, "would delete");
            } else {
                tracing::info!(output = %dir.display(), ?status, "deleting");
                std::fs::remove_dir_all(&dir)?;
            }
        }
    }

    tracing::info!(%counts, "output status");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::EventTable;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn write_dataset(dir: &Path, name: &str) {
        let batch = RecordBatch::try_from_iter(vec![(
            "eventNumber",
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
        )])
        .unwrap();
        EventTable::from_record_batch(&batch).write_parquet(&dir.join(format!("{name}.parquet"))).unwrap();
    }

    #[test]
    fn test_check_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let datasets = vec!["jets".to_string(), "tracks".to_string()];
        let dir = tmp.path().join("output_000");
        assert_eq!(check_output_dir(&dir, &datasets), OutputStatus::NotFound);

        std::fs::create_dir(&dir).unwrap();
        write_dataset(&dir, "jets");
        assert_eq!(check_output_dir(&dir, &datasets), OutputStatus::Incomplete);

        std::fs::write(dir.join("tracks.parquet"), b"not parquet").unwrap();
        assert_eq!(check_output_dir(&dir, &datasets), OutputStatus::Corrupted);

        write_dataset(&dir, "tracks");
        assert_eq!(check_output_dir(&dir, &datasets), OutputStatus::Good);
    }

    #[test]
    fn test_delete_incomplete_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let text = format!(
            "input: {{ files: '*.parquet' }}\noutput: {{ path: {} }}\nobjects:\n  event: {{ source_format: scalar, branches: [eventNumber] }}\n",
            tmp.path().display()
        );
        let mut config = RunConfig::from_yaml_str(&text).unwrap();
        config.input.resolved = vec!["a".into(), "b".into(), "c".into()];

        let good = config.file_output_dir(0);
        std::fs::create_dir_all(&good).unwrap();
        write_dataset(&good, "event");
        let incomplete = config.file_output_dir(1);
        std::fs::create_dir_all(&incomplete).unwrap();

        let counts = delete_incomplete_outputs(&config, true).unwrap();
        assert_eq!(counts, StatusCounts { good: 1, incomplete: 1, corrupted: 0, not_found: 1 });
        assert!(incomplete.exists());

        delete_incomplete_outputs(&config, false).unwrap();
        assert!(!incomplete.exists());
        assert!(good.exists());
    }
}
