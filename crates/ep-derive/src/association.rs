//! Fixed-shape jet → track index tables.

/// Value stored in table slots that hold no track.
pub const PAD_INDEX: i32 = -1;

/// Row-major `n_rows × n_cols` table of track indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTable {
    n_rows: usize,
    n_cols: usize,
    data: Vec<i32>,
}

impl IndexTable {
    /// Table with every slot set to [`PAD_INDEX`].
    pub fn padded(n_rows: usize, n_cols: usize) -> Self {
        Self { n_rows, n_cols, data: vec![PAD_INDEX; n_rows * n_cols] }
    }

    /// Number of rows (jets).
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns (track slots per jet).
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Slots of row `row`.
    pub fn row(&self, row: usize) -> &[i32] {
        &self.data[row * self.n_cols..(row + 1) * self.n_cols]
    }

    /// Slot `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.data[row * self.n_cols + col]
    }

    /// Number of filled (non-padding) slots in `row`.
    pub fn filled(&self, row: usize) -> usize {
        self.row(row).iter().filter(|&&v| v != PAD_INDEX).count()
    }

    /// Row-major slot values.
    pub fn as_flat(&self) -> &[i32] {
        &self.data
    }

    /// Rows as owned vectors.
    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        (0..self.n_rows).map(|r| self.row(r).to_vec()).collect()
    }
}

/// Copy each jet's track index list into a `max_jets × max_tracks_per_jet`
/// table.
///
/// Jets beyond `max_jets` and tracks beyond `max_tracks_per_jet` are dropped;
/// unused slots hold [`PAD_INDEX`].
pub fn associate_tracks_to_jets(
    jet_track_idx: &[Vec<i32>],
    max_jets: usize,
    max_tracks_per_jet: usize,
) -> IndexTable {
    let mut table = IndexTable::padded(max_jets, max_tracks_per_jet);
    for (jet, tracks) in jet_track_idx.iter().take(max_jets).enumerate() {
        let n = tracks.len().min(max_tracks_per_jet);
        let start = jet * max_tracks_per_jet;
        table.data[start..start + n].copy_from_slice(&tracks[..n]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_association_pads_and_truncates() {
        let jets = vec![vec![4, 7, 9], vec![], vec![1]];
        let table = associate_tracks_to_jets(&jets, 2, 2);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.to_rows(), vec![vec![4, 7], vec![-1, -1]]);
        assert_eq!(table.filled(0), 2);
        assert_eq!(table.filled(1), 0);
    }

    #[test]
    fn test_association_with_room_to_spare() {
        let table = associate_tracks_to_jets(&[vec![3]], 3, 4);
        assert_eq!(table.row(0), &[3, -1, -1, -1]);
        assert_eq!(table.row(2), &[-1, -1, -1, -1]);
        assert_eq!(table.get(0, 0), 3);
        assert_eq!(table.as_flat().len(), 12);
    }

    #[test]
    fn test_association_zero_sized() {
        let table = associate_tracks_to_jets(&[vec![1, 2]], 0, 5);
        assert_eq!(table.n_rows(), 0);
        assert!(table.as_flat().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn prop_table_shape_and_padding(
            jets in proptest::collection::vec(proptest::collection::vec(0i32..100, 0..12), 0..12),
            max_jets in 0usize..8,
            max_tracks in 0usize..8,
        ) {
            let table = associate_tracks_to_jets(&jets, max_jets, max_tracks);
            prop_assert_eq!(table.n_rows(), max_jets);
            prop_assert_eq!(table.n_cols(), max_tracks);
            prop_assert_eq!(table.as_flat().len(), max_jets * max_tracks);
            for r in 0..max_jets {
                let expected: &[i32] = jets.get(r).map(|t| &t[..t.len().min(max_tracks)]).unwrap_or(&[]);
                for c in 0..max_tracks {
                    let want = expected.get(c).copied().unwrap_or(PAD_INDEX);
                    prop_assert_eq!(table.get(r, c), want);
                }
            }
        }
    }
}
