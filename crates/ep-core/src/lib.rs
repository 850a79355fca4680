//! # ep-core
//!
//! Shared building blocks for evprep:
//! - the crate-wide [`Error`] / [`Result`] types
//! - [`JaggedCol`], the flat-plus-offsets container used for per-event
//!   object arrays (tracks, jets, vertices, cells)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod jagged;

pub use error::{Error, Result};
pub use jagged::JaggedCol;
