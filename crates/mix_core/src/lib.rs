//! `mix_core`: compost recipe proportion engine.
//!
//! No IO. A `Mix` goes in, a new `Mix` (or a `MixError`) comes out; the
//! catalog is only touched through `MaterialCatalog` when loading or
//! committing.

mod catalog;
mod commands;
mod error;
mod mix;
mod redistribute;
pub mod summary;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use catalog::{
    commit, commit_lines, load_mix, materials_for_owner, CommitReceipt, MaterialCatalog,
};
pub use commands::{apply_command, apply_commands};
pub use error::{CatalogError, MixError};
pub use redistribute::redistribute;
pub use summary::{summarize, CategoryBreakdown, MixSummary, Recommendation, SummaryLine};
pub use types::*;

/// Tolerance for proportion and quantity comparisons.
pub const EPSILON: f64 = 1e-9;
