//! Variable-length per-event columns.

use crate::error::{Error, Result};

/// A jagged (variable-length) column: flat values + per-event offsets.
///
/// `offsets` has length `n_entries + 1`. Entry `i` has values
/// `flat[offsets[i]..offsets[i+1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JaggedCol<T> {
    /// Flat array of all values across all entries.
    pub flat: Vec<T>,
    /// Entry boundaries: `offsets.len() == n_entries + 1`.
    pub offsets: Vec<usize>,
}

impl<T> Default for JaggedCol<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JaggedCol<T> {
    /// Empty column with zero entries.
    pub fn new() -> Self {
        Self { flat: Vec::new(), offsets: vec![0] }
    }

    /// Build from raw parts, checking that offsets start at zero, are
    /// non-decreasing and end at `flat.len()`.
    pub fn from_parts(flat: Vec<T>, offsets: Vec<usize>) -> Result<Self> {
        match (offsets.first(), offsets.last()) {
            (Some(&0), Some(&end)) if end == flat.len() => {}
            _ => {
                return Err(Error::Validation(format!(
                    "jagged offsets must run from 0 to {}, got {:?}..{:?}",
                    flat.len(),
                    offsets.first(),
                    offsets.last()
                )));
            }
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::Validation("jagged offsets must be non-decreasing".into()));
        }
        Ok(Self { flat, offsets })
    }

    /// Build from per-entry rows.
    pub fn from_rows<R, I>(rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = T>,
    {
        let mut col = Self::new();
        for row in rows {
            col.push_row(row);
        }
        col
    }

    /// Append one entry.
    pub fn push_row(&mut self, row: impl IntoIterator<Item = T>) {
        self.flat.extend(row);
        self.offsets.push(self.flat.len());
    }

    /// Values of entry `row`.
    pub fn row(&self, row: usize) -> &[T] {
        &self.flat[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Number of values in entry `row`.
    pub fn row_len(&self, row: usize) -> usize {
        self.offsets[row + 1] - self.offsets[row]
    }

    /// Number of entries.
    pub fn n_entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Iterate over entries in order.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.offsets.windows(2).map(move |w| &self.flat[w[0]..w[1]])
    }

    /// Per-entry lengths.
    pub fn lengths(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl<T: Copy> JaggedCol<T> {
    /// Get element `index` of entry `row`. Returns `oor` for out-of-range.
    pub fn get(&self, row: usize, index: usize, oor: T) -> T {
        self.row(row).get(index).copied().unwrap_or(oor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_and_access() {
        let col = JaggedCol::from_rows(vec![vec![1.0, 2.0], vec![], vec![3.0]]);
        assert_eq!(col.n_entries(), 3);
        assert_eq!(col.offsets, vec![0, 2, 2, 3]);
        assert_eq!(col.row(0), &[1.0, 2.0]);
        assert!(col.row(1).is_empty());
        assert_eq!(col.row_len(2), 1);
        assert_eq!(col.get(0, 1, -1.0), 2.0);
        assert_eq!(col.get(1, 0, -1.0), -1.0);
        assert_eq!(col.lengths(), vec![2, 0, 1]);
    }

    #[test]
    fn test_rows_iterator_matches_row() {
        let col = JaggedCol::from_rows(vec![vec![1, 2, 3], vec![4]]);
        let rows: Vec<&[i32]> = col.rows().collect();
        assert_eq!(rows, vec![col.row(0), col.row(1)]);
    }

    #[test]
    fn test_from_parts_validates_offsets() {
        assert!(JaggedCol::from_parts(vec![1, 2, 3], vec![0, 1, 3]).is_ok());
        assert!(JaggedCol::from_parts(vec![1, 2, 3], vec![0, 1, 2]).is_err());
        assert!(JaggedCol::from_parts(vec![1, 2, 3], vec![1, 3]).is_err());
        assert!(JaggedCol::from_parts(vec![1, 2, 3], vec![0, 2, 1, 3]).is_err());
        assert!(JaggedCol::<i32>::from_parts(vec![], vec![]).is_err());
    }

    #[test]
    fn test_empty_column() {
        let col: JaggedCol<f64> = JaggedCol::new();
        assert_eq!(col.n_entries(), 0);
        assert_eq!(col.rows().count(), 0);
    }
}
