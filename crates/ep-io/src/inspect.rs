//! Dataset overview: row counts, field types and optionally the first rows.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use ep_core::{Error, Result};

use crate::table::{read_parquet_batches, storage_err};

/// Parquet files to describe: `path` itself, or the `*.parquet` files in it.
pub fn dataset_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::Validation(format!("{} does not exist", path.display())));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    Ok(files)
}

/// Print each dataset's name, row count and field types, plus the first
/// `head` rows when non-zero.
pub fn describe(path: &Path, head: usize, out: &mut dyn Write) -> Result<()> {
    for file in dataset_files(path)? {
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(File::open(&file)?).map_err(storage_err)?;
        let rows = builder.metadata().file_metadata().num_rows();
        let schema = builder.schema().clone();
        let name = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

        writeln!(out, "\n~~~~~~ [{name}] ({rows} rows) ~~~~~~")?;
        for field in schema.fields() {
            writeln!(out, "{:40} : {}", field.name(), field.data_type())?;
        }

        if head > 0 {
            let (_, batches) = read_parquet_batches(&file, Some(head))?;
            let table = pretty_format_batches(&batches).map_err(storage_err)?;
            writeln!(out, "{table}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::write_record_batch;
    use arrow::array::{ArrayRef, Float32Array, Int64Array};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    #[test]
    fn test_describe_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let batch = RecordBatch::try_from_iter(vec![
            ("eventNumber", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            ("pt", Arc::new(Float32Array::from(vec![10.5, 20.0, 30.0])) as ArrayRef),
        ])
        .unwrap();
        write_record_batch(&tmp.path().join("jets.parquet"), &batch).unwrap();
        std::fs::write(tmp.path().join("README"), b"ignored").unwrap();

        assert_eq!(dataset_files(tmp.path()).unwrap().len(), 1);

        let mut out = Vec::new();
        describe(tmp.path(), 2, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[jets] (3 rows)"));
        assert!(text.contains("eventNumber"));
        assert!(text.contains("Float32"));
        assert!(text.contains("10.5"));
        assert!(!text.contains("30.0"));
    }

    #[test]
    fn test_missing_path() {
        let mut out = Vec::new();
        let err = describe(Path::new("/definitely/not/here"), 0, &mut out);
        assert!(matches!(err, Err(Error::Validation(_))));
    }
}
