//! # ep-io
//!
//! Everything around the per-event transforms of `ep-derive`:
//!
//! - [`table`]: Parquet-backed [`EventTable`] with typed per-event column access
//! - [`config`]: YAML run configuration ([`RunConfig`])
//! - [`defines`]: named sets of derived columns ([`DefineSet`])
//! - [`export`]: object / collection datasets written per input file
//! - [`pipeline`]: the file-by-file [`Converter`] driver
//! - [`validate`]: detection and cleanup of incomplete outputs
//! - [`batch`]: Slurm job scripts, one per input file
//! - [`dump`], [`inspect`]: human-readable diagnostics
//!
//! ## Event table layout
//!
//! | Arrow type              | Meaning                                    |
//! |-------------------------|--------------------------------------------|
//! | scalar (`Int*`, `Float*`) | one value per event (`eventNumber`)      |
//! | `List<Float*/Int*/Boolean>` | one value per object (track, jet, cell) |
//! | `List<List<Int32>>`     | per-object index lists (jet → tracks)      |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod defines;
pub mod dump;
pub mod export;
pub mod inspect;
pub mod pipeline;
pub mod table;
pub mod validate;

pub use config::{
    AssociationConfig, BatchConfig, CollectionConfig, InputConfig, ObjectConfig, ObjectLink,
    OutputConfig, RunConfig, SourceFormat,
};
pub use batch::{BatchOptions, BatchSummary, submit_batch};
pub use defines::{DefineSet, apply_defines};
pub use dump::dump_events;
pub use export::write_datasets;
pub use inspect::describe;
pub use pipeline::{ConvertSummary, Converter};
pub use table::EventTable;
pub use validate::{OutputStatus, StatusCounts, check_output_dir, delete_incomplete_outputs};
