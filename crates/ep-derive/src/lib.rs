//! # ep-derive
//!
//! Per-event derived quantities for flavour-tagging and timing studies.
//!
//! Every function here takes the index-aligned arrays of one event (tracks,
//! jets, vertices, cells) and returns a new per-object array. They are pure:
//! no state, no logging, no failure modes. Empty inputs yield an empty
//! result and companion arrays shorter than the primary array are never
//! indexed past their end.
//!
//! - [`vertex`]: nearest-vertex distances and significances per track
//! - [`jet`]: enhanced truth labels and constituent categories per jet
//! - [`selection`]: threshold flags for tracks, jets and cells
//! - [`association`]: fixed-shape jet → track index tables
//! - [`timing`]: hard-scatter vertex lookups and cell time-of-flight correction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod association;
pub mod jet;
pub mod selection;
pub mod timing;
pub mod vertex;

pub use association::{IndexTable, PAD_INDEX, associate_tracks_to_jets};
pub use jet::{JetKinematics, constituent_category, delta_r, enhanced_truth_label};
pub use timing::{C_LIGHT_MM_PER_PS, VertexPosition, cell_time_tof_corrected, hs_vertex_value};
pub use vertex::{VertexSubset, primary_vertex_index};
