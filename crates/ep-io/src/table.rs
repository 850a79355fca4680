//! Columnar event table backed by Arrow arrays.
//!
//! One row per event. Per-object quantities are list columns; the typed
//! accessors turn them into [`JaggedCol`]s, widening numeric and boolean
//! child types as needed. Derived columns are appended in place and the
//! whole table can be written back to Parquet.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Float64Array, Float64Builder, Int32Array,
    Int32Builder, ListBuilder,
};
use arrow::compute::{can_cast_types, cast, concat_batches};
use arrow::datatypes::{DataType, Field, FieldRef, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use ep_core::{Error, JaggedCol, Result};

pub(crate) fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

fn type_error(column: &str, expected: &str, actual: &DataType) -> Error {
    Error::ColumnType {
        column: column.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn is_list(dt: &DataType) -> bool {
    matches!(dt, DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _))
}

/// Offsets (rebased to start at zero) and the matching slice of child values
/// of a list-typed array.
pub(crate) fn list_parts(column: &str, array: &ArrayRef) -> Result<(Vec<usize>, ArrayRef)> {
    let (offsets, values): (Vec<usize>, ArrayRef) = match array.data_type() {
        DataType::List(_) => {
            let list = array.as_list::<i32>();
            (list.value_offsets().iter().map(|&o| o as usize).collect(), list.values().clone())
        }
        DataType::LargeList(_) => {
            let list = array.as_list::<i64>();
            (list.value_offsets().iter().map(|&o| o as usize).collect(), list.values().clone())
        }
        DataType::FixedSizeList(_, size) => {
            let list = array.as_fixed_size_list();
            let size = *size as usize;
            let base = if list.is_empty() { 0 } else { list.value_offset(0) as usize };
            ((0..=list.len()).map(|i| base + i * size).collect(), list.values().clone())
        }
        other => return Err(type_error(column, "List", other)),
    };
    let base = offsets.first().copied().unwrap_or(0);
    let end = offsets.last().copied().unwrap_or(0);
    let values = values.slice(base, end - base);
    Ok((offsets.iter().map(|o| o - base).collect(), values))
}

fn cast_values(column: &str, values: &ArrayRef, to: &DataType) -> Result<ArrayRef> {
    let from = values.data_type();
    let allowed = match to {
        DataType::Float64 => from.is_numeric(),
        DataType::Int32 | DataType::Int64 => from.is_numeric() || *from == DataType::Boolean,
        DataType::Boolean => from.is_integer() || *from == DataType::Boolean,
        _ => false,
    };
    if !allowed || !can_cast_types(from, to) {
        return Err(type_error(column, &to.to_string(), from));
    }
    cast(values.as_ref(), to).map_err(storage_err)
}

fn f64_values(column: &str, values: &ArrayRef) -> Result<Vec<f64>> {
    let cast = cast_values(column, values, &DataType::Float64)?;
    Ok(cast.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn i32_values(column: &str, values: &ArrayRef) -> Result<Vec<i32>> {
    let cast = cast_values(column, values, &DataType::Int32)?;
    Ok(cast.as_primitive::<Int32Type>().iter().map(|v| v.unwrap_or(0)).collect())
}

fn bool_values(column: &str, values: &ArrayRef) -> Result<Vec<bool>> {
    let cast = cast_values(column, values, &DataType::Boolean)?;
    Ok(cast.as_boolean().iter().map(|v| v.unwrap_or(false)).collect())
}

fn default_compression() -> Compression {
    // Snappy needs no system library; Zstd only when the feature pulls it in.
    #[cfg(feature = "parquet-zstd")]
    {
        Compression::ZSTD(Default::default())
    }
    #[cfg(not(feature = "parquet-zstd"))]
    {
        Compression::SNAPPY
    }
}

/// Read a Parquet file into Arrow RecordBatches, stopping after `max_rows`.
pub fn read_parquet_batches(
    path: &Path,
    max_rows: Option<usize>,
) -> Result<(Arc<Schema>, Vec<RecordBatch>)> {
    let file = File::open(path)?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(storage_err)?;
    if let Some(limit) = max_rows {
        builder = builder.with_limit(limit);
    }
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(storage_err)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>().map_err(storage_err)?;
    Ok((schema, batches))
}

/// Write one RecordBatch to a Parquet file.
///
/// Uses Zstd if the `parquet-zstd` feature is enabled, otherwise Snappy.
pub fn write_record_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let props = WriterProperties::builder().set_compression(default_compression()).build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(storage_err)?;
    writer.write(batch).map_err(storage_err)?;
    writer.close().map_err(storage_err)?;
    Ok(())
}

/// Per-event columns of one input file.
#[derive(Debug, Clone)]
pub struct EventTable {
    fields: Vec<FieldRef>,
    columns: Vec<ArrayRef>,
    n_events: usize,
}

impl EventTable {
    /// Table holding the columns of a single batch.
    pub fn from_record_batch(batch: &RecordBatch) -> Self {
        Self {
            fields: batch.schema().fields().iter().cloned().collect(),
            columns: batch.columns().to_vec(),
            n_events: batch.num_rows(),
        }
    }

    /// Concatenate batches sharing `schema` into one table.
    pub fn from_batches(schema: &Arc<Schema>, batches: &[RecordBatch]) -> Result<Self> {
        let batch = concat_batches(schema, batches).map_err(storage_err)?;
        Ok(Self::from_record_batch(&batch))
    }

    /// Read the first `max_events` events (all if `None`) of a Parquet file.
    pub fn read_parquet(path: &Path, max_events: Option<usize>) -> Result<Self> {
        let (schema, batches) = read_parquet_batches(path, max_events)?;
        let table = Self::from_batches(&schema, &batches)?;
        tracing::debug!(
            path = %path.display(),
            events = table.n_events,
            columns = table.columns.len(),
            "event table loaded"
        );
        Ok(table)
    }

    /// Number of events (rows).
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name().as_str()).collect()
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Raw Arrow array of a column.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Flattened child values of a list column and their per-event offsets.
    pub fn list_values(&self, name: &str) -> Result<(ArrayRef, Vec<usize>)> {
        let (offsets, values) = list_parts(name, self.column(name)?)?;
        Ok((values, offsets))
    }

    /// Per-event object values as `f64`.
    pub fn f64_lists(&self, name: &str) -> Result<JaggedCol<f64>> {
        let (offsets, values) = list_parts(name, self.column(name)?)?;
        JaggedCol::from_parts(f64_values(name, &values)?, offsets)
    }

    /// Per-event object values as `i32`.
    pub fn i32_lists(&self, name: &str) -> Result<JaggedCol<i32>> {
        let (offsets, values) = list_parts(name, self.column(name)?)?;
        JaggedCol::from_parts(i32_values(name, &values)?, offsets)
    }

    /// Per-event object flags; integer children are true when non-zero.
    pub fn bool_lists(&self, name: &str) -> Result<JaggedCol<bool>> {
        let (offsets, values) = list_parts(name, self.column(name)?)?;
        JaggedCol::from_parts(bool_values(name, &values)?, offsets)
    }

    /// Per-event, per-object index lists (`List<List<Int>>`).
    pub fn index_lists(&self, name: &str) -> Result<JaggedCol<Vec<i32>>> {
        let (outer, inner) = list_parts(name, self.column(name)?)?;
        let (inner_offsets, leaf) = list_parts(name, &inner)?;
        let leaf = i32_values(name, &leaf)?;
        let lists = inner_offsets.windows(2).map(|w| leaf[w[0]..w[1]].to_vec()).collect();
        JaggedCol::from_parts(lists, outer)
    }

    /// One value per event as `f64`.
    pub fn scalar_f64(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.column(name)?;
        if is_list(col.data_type()) {
            return Err(type_error(name, "numeric scalar", col.data_type()));
        }
        f64_values(name, col)
    }

    /// One value per event as `i64`.
    pub fn scalar_i64(&self, name: &str) -> Result<Vec<i64>> {
        let col = self.column(name)?;
        if is_list(col.data_type()) {
            return Err(type_error(name, "integer scalar", col.data_type()));
        }
        let cast = cast_values(name, col, &DataType::Int64)?;
        Ok(cast.as_primitive::<Int64Type>().iter().map(|v| v.unwrap_or(0)).collect())
    }

    /// Append a column, replacing any existing column of the same name.
    pub fn push_column(&mut self, name: &str, array: ArrayRef) -> Result<()> {
        if !self.columns.is_empty() && array.len() != self.n_events {
            return Err(Error::Validation(format!(
                "column '{name}' has {} rows, table has {} events",
                array.len(),
                self.n_events
            )));
        }
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));
        match self.position(name) {
            Some(i) => {
                tracing::debug!(column = name, "replacing existing column");
                self.fields[i] = field;
                self.columns[i] = array;
            }
            None => {
                self.fields.push(field);
                self.columns.push(array);
            }
        }
        self.n_events = self.columns[0].len();
        Ok(())
    }

    /// Append a `List<Float64>` column.
    pub fn push_f64_lists(&mut self, name: &str, col: &JaggedCol<f64>) -> Result<()> {
        let mut builder = ListBuilder::new(Float64Builder::with_capacity(col.flat.len()));
        for row in col.rows() {
            builder.values().append_slice(row);
            builder.append(true);
        }
        self.push_column(name, Arc::new(builder.finish()))
    }

    /// Append a `List<Int32>` column.
    pub fn push_i32_lists(&mut self, name: &str, col: &JaggedCol<i32>) -> Result<()> {
        let mut builder = ListBuilder::new(Int32Builder::with_capacity(col.flat.len()));
        for row in col.rows() {
            builder.values().append_slice(row);
            builder.append(true);
        }
        self.push_column(name, Arc::new(builder.finish()))
    }

    /// Append a `List<Boolean>` column.
    pub fn push_bool_lists(&mut self, name: &str, col: &JaggedCol<bool>) -> Result<()> {
        let mut builder = ListBuilder::new(BooleanBuilder::with_capacity(col.flat.len()));
        for row in col.rows() {
            builder.values().append_slice(row);
            builder.append(true);
        }
        self.push_column(name, Arc::new(builder.finish()))
    }

    /// Append an `Int32` scalar column.
    pub fn push_scalar_i32(&mut self, name: &str, values: Vec<i32>) -> Result<()> {
        self.push_column(name, Arc::new(Int32Array::from(values)))
    }

    /// Append a `Float64` scalar column.
    pub fn push_scalar_f64(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.push_column(name, Arc::new(Float64Array::from(values)))
    }

    /// The table as a single RecordBatch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(self.fields.clone()));
        let options = RecordBatchOptions::new().with_row_count(Some(self.n_events));
        RecordBatch::try_new_with_options(schema, self.columns.clone(), &options)
            .map_err(storage_err)
    }

    /// Write the table (including derived columns) to Parquet.
    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        write_record_batch(path, &self.to_record_batch()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float32Builder, Int64Array};

    fn make_batch() -> RecordBatch {
        let mut z0 = ListBuilder::new(Float32Builder::new());
        z0.values().append_slice(&[1.0, 5.0]);
        z0.append(true);
        z0.append(true);
        z0.values().append_slice(&[-2.0]);
        z0.append(true);

        let mut quality = ListBuilder::new(Int32Builder::new());
        quality.values().append_slice(&[1, 0]);
        quality.append(true);
        quality.append(true);
        quality.values().append_slice(&[2]);
        quality.append(true);

        let mut idx = ListBuilder::new(ListBuilder::new(Int32Builder::new()));
        idx.values().values().append_slice(&[0, 1]);
        idx.values().append(true);
        idx.values().append(true);
        idx.append(true);
        idx.append(true);
        idx.values().values().append_slice(&[0]);
        idx.values().append(true);
        idx.append(true);

        let z0 = Arc::new(z0.finish()) as ArrayRef;
        let quality = Arc::new(quality.finish()) as ArrayRef;
        let idx = Arc::new(idx.finish()) as ArrayRef;
        let event_number = Arc::new(Int64Array::from(vec![10, 11, 12])) as ArrayRef;

        RecordBatch::try_from_iter(vec![
            ("eventNumber", event_number),
            ("Track_z0", z0),
            ("Track_quality", quality),
            ("Jet_track_idx", idx),
        ])
        .unwrap()
    }

    #[test]
    fn test_typed_list_access() {
        let table = EventTable::from_record_batch(&make_batch());
        assert_eq!(table.n_events(), 3);

        let z0 = table.f64_lists("Track_z0").unwrap();
        assert_eq!(z0.n_entries(), 3);
        assert_eq!(z0.row(0), &[1.0, 5.0]);
        assert!(z0.row(1).is_empty());

        let quality = table.bool_lists("Track_quality").unwrap();
        assert_eq!(quality.row(0), &[true, false]);
        assert_eq!(quality.row(2), &[true]);

        let idx = table.index_lists("Jet_track_idx").unwrap();
        assert_eq!(idx.row(0), &[vec![0, 1], vec![]]);
        assert!(idx.row(1).is_empty());
        assert_eq!(idx.row(2), &[vec![0]]);

        assert_eq!(table.scalar_i64("eventNumber").unwrap(), vec![10, 11, 12]);
    }

    #[test]
    fn test_type_and_missing_errors() {
        let table = EventTable::from_record_batch(&make_batch());
        assert!(matches!(table.f64_lists("nope"), Err(Error::MissingColumn(_))));
        assert!(matches!(table.f64_lists("eventNumber"), Err(Error::ColumnType { .. })));
        assert!(matches!(table.scalar_f64("Track_z0"), Err(Error::ColumnType { .. })));
        assert!(matches!(table.index_lists("Track_z0"), Err(Error::ColumnType { .. })));
    }

    #[test]
    fn test_push_and_replace_columns() {
        let mut table = EventTable::from_record_batch(&make_batch());
        let derived = JaggedCol::from_rows(vec![vec![0.5, 0.5], vec![], vec![1.0]]);
        table.push_f64_lists("Track_derived", &derived).unwrap();
        assert_eq!(table.f64_lists("Track_derived").unwrap(), derived);

        table.push_scalar_i32("iPV", vec![0, -1, 2]).unwrap();
        table.push_scalar_i32("iPV", vec![1, 1, 1]).unwrap();
        assert_eq!(table.scalar_i64("iPV").unwrap(), vec![1, 1, 1]);
        assert_eq!(table.column_names().iter().filter(|n| **n == "iPV").count(), 1);

        let err = table.push_scalar_f64("short", vec![1.0]);
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn test_parquet_roundtrip_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.parquet");
        let mut table = EventTable::from_record_batch(&make_batch());
        table
            .push_bool_lists("flag", &JaggedCol::from_rows(vec![vec![true], vec![], vec![false]]))
            .unwrap();
        table.write_parquet(&path).unwrap();

        let back = EventTable::read_parquet(&path, None).unwrap();
        assert_eq!(back.n_events(), 3);
        assert_eq!(back.bool_lists("flag").unwrap().row(2), &[false]);
        assert_eq!(back.index_lists("Jet_track_idx").unwrap().row(0), &[vec![0, 1], vec![]]);

        let head = EventTable::read_parquet(&path, Some(2)).unwrap();
        assert_eq!(head.n_events(), 2);
        assert_eq!(head.f64_lists("Track_z0").unwrap().n_entries(), 2);
    }
}
