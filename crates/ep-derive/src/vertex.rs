//! Track-to-vertex association along the beam axis.
//!
//! All distances are longitudinal (`z0` of the track against `z` of the
//! vertex) and optionally divided by the track's `z0` uncertainty. The vertex
//! list of one event holds tens of entries, so every lookup is a plain scan;
//! the first vertex reaching the minimum wins ties.

/// Value reported for a track when no candidate vertex is closer than it.
pub const NO_VERTEX_DISTANCE: f64 = 1e3;

/// Vertex offset reported when the primary vertex is unknown or no candidate
/// vertex is found.
pub const NO_VERTEX_OFFSET: f64 = 1e6;

/// Which vertices take part in a nearest-vertex search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSubset {
    /// Every vertex is a candidate.
    All,
    /// Only the primary (hard-scatter) vertex at this index.
    Only(usize),
    /// Every vertex except the primary one at this index (pile-up vertices).
    Excluding(usize),
}

impl VertexSubset {
    /// Subset built from an optional primary vertex index.
    ///
    /// Without a primary vertex there is nothing to include or exclude, so
    /// every vertex is a candidate.
    pub fn from_primary(primary: Option<usize>, exclude_primary: bool) -> Self {
        match primary {
            None => VertexSubset::All,
            Some(pv) if exclude_primary => VertexSubset::Excluding(pv),
            Some(pv) => VertexSubset::Only(pv),
        }
    }

    /// Whether vertex `index` is a candidate.
    pub fn contains(self, index: usize) -> bool {
        match self {
            VertexSubset::All => true,
            VertexSubset::Only(pv) => index == pv,
            VertexSubset::Excluding(pv) => index != pv,
        }
    }

    /// The primary vertex index this subset was built around, if any.
    pub fn primary(self) -> Option<usize> {
        match self {
            VertexSubset::All => None,
            VertexSubset::Only(pv) | VertexSubset::Excluding(pv) => Some(pv),
        }
    }
}

/// Index of the first vertex flagged as hard-scatter.
pub fn primary_vertex_index(is_hs: &[bool]) -> Option<usize> {
    is_hs.iter().position(|&hs| hs)
}

fn candidates(vertex_z: &[f64], subset: VertexSubset) -> impl Iterator<Item = f64> + '_ {
    vertex_z.iter().enumerate().filter(move |(i, _)| subset.contains(*i)).map(|(_, &z)| z)
}

/// Signed `z0 - z_vtx` to the closest candidate vertex, per track.
pub fn min_delta_z(track_z0: &[f64], vertex_z: &[f64], subset: VertexSubset) -> Vec<f64> {
    if track_z0.is_empty() || vertex_z.is_empty() {
        return Vec::new();
    }

    track_z0
        .iter()
        .map(|&z0| {
            let mut min_dz = NO_VERTEX_DISTANCE;
            let mut signed_min_dz = NO_VERTEX_DISTANCE;
            for z_vtx in candidates(vertex_z, subset) {
                let dz = z0 - z_vtx;
                if dz.abs() < min_dz {
                    min_dz = dz.abs();
                    signed_min_dz = dz;
                }
            }
            signed_min_dz
        })
        .collect()
}

/// Signed `(z0 - z_vtx) / sigma(z0)` with the smallest magnitude, per track.
pub fn min_z0_significance(
    track_z0: &[f64],
    track_var_z0: &[f64],
    vertex_z: &[f64],
    subset: VertexSubset,
) -> Vec<f64> {
    if track_z0.is_empty() || track_var_z0.is_empty() || vertex_z.is_empty() {
        return Vec::new();
    }

    track_z0
        .iter()
        .zip(track_var_z0)
        .map(|(&z0, &var)| {
            let sigma = var.sqrt();
            let mut min_sig = NO_VERTEX_DISTANCE;
            for z_vtx in candidates(vertex_z, subset) {
                let sig = (z0 - z_vtx) / sigma;
                if sig.abs() < min_sig.abs() {
                    min_sig = sig;
                }
            }
            min_sig
        })
        .collect()
}

/// For each track, `z_vtx - z_pv` of the candidate vertex with the smallest
/// `|z0 - z_vtx| / sigma(z0)`.
///
/// The primary vertex is taken from `subset`; with [`VertexSubset::All`] or a
/// primary index outside `vertex_z` every track gets [`NO_VERTEX_OFFSET`].
pub fn min_significance_vertex_offset(
    track_z0: &[f64],
    track_var_z0: &[f64],
    vertex_z: &[f64],
    subset: VertexSubset,
) -> Vec<f64> {
    if track_z0.is_empty() || track_var_z0.is_empty() || vertex_z.is_empty() {
        return Vec::new();
    }

    let z_pv = subset.primary().and_then(|pv| vertex_z.get(pv).copied());

    track_z0
        .iter()
        .zip(track_var_z0)
        .map(|(&z0, &var)| {
            let Some(z_pv) = z_pv else {
                return NO_VERTEX_OFFSET;
            };
            let sigma = var.sqrt();
            let mut min_sig = NO_VERTEX_DISTANCE;
            let mut offset = NO_VERTEX_OFFSET;
            for z_vtx in candidates(vertex_z, subset) {
                let sig = (z0 - z_vtx).abs() / sigma;
                if sig < min_sig {
                    min_sig = sig;
                    offset = z_vtx - z_pv;
                }
            }
            offset
        })
        .collect()
}

/// `offset / sigma(z0)` for the offsets of [`min_significance_vertex_offset`].
pub fn vertex_offset_significance(offsets: &[f64], track_var_z0: &[f64]) -> Vec<f64> {
    if offsets.is_empty() || track_var_z0.is_empty() {
        return Vec::new();
    }
    offsets.iter().zip(track_var_z0).map(|(&dz, &var)| dz / var.sqrt()).collect()
}

/// Number of vertices within `significance_cut` standard deviations of each track.
pub fn n_vertices_within_significance(
    vertex_z: &[f64],
    track_z0: &[f64],
    track_var_z0: &[f64],
    significance_cut: f64,
) -> Vec<i32> {
    if vertex_z.is_empty() || track_z0.is_empty() || track_var_z0.is_empty() {
        return Vec::new();
    }

    track_z0
        .iter()
        .zip(track_var_z0)
        .map(|(&z0, &var)| {
            let sigma = var.sqrt();
            vertex_z.iter().filter(|&&z_vtx| ((z0 - z_vtx) / sigma).abs() < significance_cut).count()
                as i32
        })
        .collect()
}
