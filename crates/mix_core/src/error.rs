//! Error types for mix operations and the catalog boundary.

use thiserror::Error;

use crate::MaterialId;

/// Every failure a mix operation or commit can report. A failed operation
/// leaves the input `Mix` untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixError {
    /// A proportion outside `[0, 1]` (or not a finite number).
    #[error("proportion {value} for '{material_id}' is outside 0..=1")]
    OutOfRange { material_id: MaterialId, value: f64 },

    /// The requested share would draw more than the material has left.
    #[error("'{material_id}' needs {requested:.2} but only {available:.2} is available")]
    QuantityExceeded {
        material_id: MaterialId,
        requested: f64,
        available: f64,
    },

    /// A non-limitant request larger than what the limitant leaves over.
    #[error("'{material_id}' asked for {requested:.4} but only {remaining:.4} remains")]
    InsufficientRemainingProportion {
        material_id: MaterialId,
        requested: f64,
        remaining: f64,
    },

    #[error("'{0}' is already in the mix")]
    DuplicateMaterial(MaterialId),

    #[error("'{0}' not found")]
    NotFound(MaterialId),

    /// The entry's proportion is fully derived from the limitant.
    #[error("'{0}' is derived from the limitant and cannot be set directly")]
    Locked(MaterialId),

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),
}

/// Failures raised by a `MaterialCatalog` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),
}

impl From<CatalogError> for MixError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(msg) => MixError::CatalogUnavailable(msg),
            CatalogError::CommitFailed(msg) => MixError::CommitFailed(msg),
        }
    }
}
