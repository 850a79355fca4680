//! Object and collection datasets.
//!
//! Every configured dataset becomes one Parquet file `<name>.parquet` in the
//! output directory of an input file:
//!
//! - vector objects: one row per object, all events concatenated
//! - scalar objects: one row per event
//! - collections: one row per parent object (or per event without a link),
//!   each branch a `FixedSizeList` of `max_objects` entries, zero-padded, with
//!   a `valid` mask of the same shape

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, FixedSizeListArray, Int32Array, Int64Array, Scalar, UInt64Array,
};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, filter, take};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;

use ep_core::{Error, JaggedCol, Result};

use crate::config::{CollectionConfig, ObjectConfig, RunConfig, SourceFormat};
use crate::table::{EventTable, storage_err, write_record_batch};

/// Column holding the validity mask of a collection dataset.
pub const VALID_COLUMN: &str = "valid";

/// Per-event object counts of a vector object and which objects survived its
/// selection. Collections linked to the object follow the same rows.
#[derive(Debug, Clone)]
pub struct ObjectRows {
    offsets: Vec<usize>,
    keep: Option<Vec<bool>>,
}

impl ObjectRows {
    fn kept(&self, flat_index: usize) -> bool {
        self.keep.as_ref().is_none_or(|k| k[flat_index])
    }

    /// Number of exported rows.
    pub fn n_rows(&self) -> usize {
        match &self.keep {
            Some(keep) => keep.iter().filter(|&&k| k).count(),
            None => self.offsets.last().copied().unwrap_or(0),
        }
    }
}

/// Export every configured dataset of `table` into `out_dir`.
pub fn write_datasets(table: &EventTable, config: &RunConfig, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut linked: BTreeMap<String, ObjectRows> = BTreeMap::new();

    for (name, object) in &config.objects {
        let batch = match object.source_format {
            SourceFormat::Vector => {
                let (batch, rows) =
                    vector_object(table, name, object, &config.input.event_number_column)?;
                if object.store_length {
                    linked.insert(name.clone(), rows);
                }
                batch
            }
            SourceFormat::Scalar => {
                scalar_object(table, name, object, &config.input.event_number_column)?
            }
        };
        written.push(write_dataset(out_dir, name, &batch)?);
    }

    for (name, collection) in &config.collections {
        let batch = object_collection(table, name, collection, &linked)?;
        written.push(write_dataset(out_dir, name, &batch)?);
    }
    Ok(written)
}

fn write_dataset(out_dir: &Path, name: &str, batch: &RecordBatch) -> Result<PathBuf> {
    let path = out_dir.join(format!("{name}.parquet"));
    write_record_batch(&path, batch)?;
    tracing::info!(dataset = name, rows = batch.num_rows(), path = %path.display(), "dataset written");
    Ok(path)
}

fn same_lengths(name: &str, branch: &str, reference: &[usize], offsets: &[usize]) -> Result<()> {
    if reference != offsets {
        return Err(Error::Validation(format!(
            "{name}: branch '{branch}' has different per-event lengths than the other branches"
        )));
    }
    Ok(())
}

/// One row per object. Returns the batch and the row layout for linked collections.
pub fn vector_object(
    table: &EventTable,
    name: &str,
    config: &ObjectConfig,
    event_number_column: &str,
) -> Result<(RecordBatch, ObjectRows)> {
    let mut columns: Vec<(String, ArrayRef)> = Vec::with_capacity(config.branches.len() + 1);
    let mut reference: Option<Vec<usize>> = None;
    for branch in &config.branches {
        let (values, offsets) = table.list_values(branch)?;
        match &reference {
            Some(r) => same_lengths(name, branch, r, &offsets)?,
            None => reference = Some(offsets),
        }
        columns.push((branch.clone(), values));
    }
    let offsets = reference.unwrap_or_else(|| vec![0; table.n_events() + 1]);

    let keep = match &config.selection {
        Some(selection) => {
            let flags = table.bool_lists(selection)?;
            same_lengths(name, selection, &offsets, &flags.offsets)?;
            Some(flags.flat)
        }
        None => None,
    };
    let rows = ObjectRows { offsets, keep };

    if let Some(keep) = &rows.keep {
        let mask = BooleanArray::from(keep.clone());
        for (_, values) in columns.iter_mut() {
            *values = filter(values.as_ref(), &mask).map_err(storage_err)?;
        }
    }

    if config.event_number {
        let event_numbers = table.scalar_i64(event_number_column)?;
        let mut repeated = Vec::with_capacity(rows.n_rows());
        for (ev, w) in rows.offsets.windows(2).enumerate() {
            for i in w[0]..w[1] {
                if rows.kept(i) {
                    repeated.push(event_numbers[ev]);
                }
            }
        }
        columns.push((event_number_column.to_string(), Arc::new(Int64Array::from(repeated))));
    }

    let batch = RecordBatch::try_from_iter(columns).map_err(storage_err)?;
    Ok((batch, rows))
}

/// One row per event.
pub fn scalar_object(
    table: &EventTable,
    name: &str,
    config: &ObjectConfig,
    event_number_column: &str,
) -> Result<RecordBatch> {
    let mut columns: Vec<(String, ArrayRef)> = Vec::new();
    for branch in &config.branches {
        let col = table.column(branch)?;
        // Fixed-shape per-event values (association tables) are fine.
        if matches!(col.data_type(), DataType::List(_) | DataType::LargeList(_)) {
            return Err(Error::Validation(format!(
                "{name}: scalar object branch '{branch}' is a variable-length list column"
            )));
        }
        columns.push((branch.clone(), col.clone()));
    }
    if config.event_number && !config.branches.iter().any(|b| b == event_number_column) {
        columns.push((event_number_column.to_string(), table.column(event_number_column)?.clone()));
    }
    RecordBatch::try_from_iter(columns).map_err(storage_err)
}

/// Local object indices of one collection row, before selection and padding.
struct CollectionRow {
    event: usize,
    indices: Vec<i32>,
}

fn collection_rows(
    table: &EventTable,
    name: &str,
    config: &CollectionConfig,
    linked: &BTreeMap<String, ObjectRows>,
    n_objects: &[usize],
) -> Result<Vec<CollectionRow>> {
    let Some(link) = &config.object_link else {
        return Ok((0..table.n_events())
            .map(|event| CollectionRow { event, indices: (0..n_objects[event] as i32).collect() })
            .collect());
    };

    let parents = linked.get(&link.object).ok_or_else(|| {
        Error::Config(format!("{name}: linked object '{}' was not exported", link.object))
    })?;
    let link_lists: JaggedCol<Vec<i32>> = table.index_lists(&link.link)?;
    same_lengths(name, &link.link, &parents.offsets, &link_lists.offsets)?;

    let mut rows = Vec::with_capacity(parents.n_rows());
    for event in 0..table.n_events() {
        let start = parents.offsets[event];
        for (j, indices) in link_lists.row(event).iter().enumerate() {
            if parents.kept(start + j) {
                rows.push(CollectionRow { event, indices: indices.clone() });
            }
        }
    }
    Ok(rows)
}

/// Fixed-width rows of `max_objects` entries per parent object.
pub fn object_collection(
    table: &EventTable,
    name: &str,
    config: &CollectionConfig,
    linked: &BTreeMap<String, ObjectRows>,
) -> Result<RecordBatch> {
    let max = config.max_objects;
    let mut branch_values: Vec<(String, ArrayRef)> = Vec::with_capacity(config.branches.len());
    let mut reference: Option<Vec<usize>> = None;
    for branch in &config.branches {
        let (values, offsets) = table.list_values(branch)?;
        match &reference {
            Some(r) => same_lengths(name, branch, r, &offsets)?,
            None => reference = Some(offsets),
        }
        branch_values.push((branch.clone(), values));
    }
    let offsets = reference.unwrap_or_else(|| vec![0; table.n_events() + 1]);
    let n_objects: Vec<usize> = offsets.windows(2).map(|w| w[1] - w[0]).collect();

    let selection = match &config.selection {
        Some(s) => Some(table.bool_lists(s)?),
        None => None,
    };

    let rows = collection_rows(table, name, config, linked, &n_objects)?;

    let mut take_idx: Vec<Option<u64>> = Vec::with_capacity(rows.len() * max);
    let mut valid: Vec<bool> = Vec::with_capacity(rows.len() * max);
    let mut dropped = 0usize;
    for row in &rows {
        let mut picked: Vec<usize> = Vec::with_capacity(max);
        for &idx in &row.indices {
            let Ok(local) = usize::try_from(idx) else {
                dropped += 1;
                continue;
            };
            if local >= n_objects[row.event] {
                dropped += 1;
                continue;
            }
            let selected = selection
                .as_ref()
                .is_none_or(|s| s.row(row.event).get(local).copied().unwrap_or(false));
            if selected {
                picked.push(offsets[row.event] + local);
            }
        }
        picked.truncate(max);
        for k in 0..max {
            let slot = picked.get(k).map(|&i| i as u64);
            valid.push(slot.is_some());
            take_idx.push(slot);
        }
    }
    if dropped > 0 {
        tracing::warn!(collection = name, dropped, "skipped out-of-range object indices");
    }

    let width = i32::try_from(max)
        .map_err(|_| Error::Config(format!("{name}: max_objects {max} is too large")))?;
    let take_idx = UInt64Array::from(take_idx);
    let valid = BooleanArray::from(valid);

    let mut columns: Vec<(String, ArrayRef)> = Vec::with_capacity(branch_values.len() + 1);
    for (branch, values) in branch_values {
        let taken = take(values.as_ref(), &take_idx, None).map_err(storage_err)?;
        let zero = cast(&Int32Array::from(vec![0]), values.data_type()).map_err(storage_err)?;
        let padded = zip(&valid, &taken, &Scalar::new(zero)).map_err(storage_err)?;
        columns.push((branch, fixed_size(padded, width)?));
    }
    columns.push((VALID_COLUMN.to_string(), fixed_size(Arc::new(valid), width)?));

    tracing::debug!(collection = name, rows = rows.len(), max_objects = max, "collection built");
    RecordBatch::try_from_iter(columns).map_err(storage_err)
}

fn fixed_size(values: ArrayRef, width: i32) -> Result<ArrayRef> {
    let item = Arc::new(Field::new("item", values.data_type().clone(), true));
    let list = FixedSizeListArray::try_new(item, width, values, None).map_err(storage_err)?;
    Ok(Arc::new(list))
}
