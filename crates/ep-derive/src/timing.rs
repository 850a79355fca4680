//! Hard-scatter vertex lookups and cell time-of-flight correction.

/// Speed of light in vacuum in mm/ps.
pub const C_LIGHT_MM_PER_PS: f64 = 0.299792458;

/// Value of the first hard-scatter vertex, or `0.0` if none is flagged.
pub fn hs_vertex_value(values: &[f64], is_hs: &[bool]) -> f64 {
    values.iter().zip(is_hs).find(|(_, hs)| **hs).map(|(&v, _)| v).unwrap_or(0.0)
}

/// Vertex position in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexPosition {
    /// x (mm)
    pub x: f64,
    /// y (mm)
    pub y: f64,
    /// z (mm)
    pub z: f64,
}

impl VertexPosition {
    /// Position from coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position of the first hard-scatter vertex, if one is flagged and all
    /// three coordinates exist for it.
    pub fn hard_scatter(x: &[f64], y: &[f64], z: &[f64], is_hs: &[bool]) -> Option<Self> {
        let i = is_hs.iter().position(|&hs| hs)?;
        Some(Self { x: *x.get(i)?, y: *y.get(i)?, z: *z.get(i)? })
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &VertexPosition) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Distance from the detector origin.
    pub fn norm(&self) -> f64 {
        self.distance_to(&VertexPosition::default())
    }
}

/// Cell time corrected for the flight path from `vertex` instead of from the
/// detector origin.
///
/// `t + (|r_cell| - |r_cell - r_vtx|) / c`, minus `vertex_time` when given.
/// The result covers the common length of the cell arrays.
pub fn cell_time_tof_corrected(
    time: &[f64],
    x: &[f64],
    y: &[f64],
    z: &[f64],
    vertex: VertexPosition,
    vertex_time: Option<f64>,
) -> Vec<f64> {
    let t0 = vertex_time.unwrap_or(0.0);
    time.iter()
        .zip(x)
        .zip(y)
        .zip(z)
        .map(|(((&t, &cx), &cy), &cz)| {
            let cell = VertexPosition::new(cx, cy, cz);
            t + (cell.norm() - cell.distance_to(&vertex)) / C_LIGHT_MM_PER_PS - t0
        })
        .collect()
}
