//! Longitudinal aggregation over the cell store: per-timepoint snapshots
//! ([`Refset`]), ordered per-subject series ([`LongitudinalRefset`]) and
//! single-column projections ([`Fieldset`]).

mod fieldset;
mod longitudinal;
mod refset;

pub use fieldset::Fieldset;
pub use longitudinal::LongitudinalRefset;
pub use refset::{Refset, SortValue, BASE_ATTRS};

use thiserror::Error;

use crate::registry::RegistryError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RefsetError {
    /// A None field value must mean "no cell", never a malformed snapshot.
    #[error("Invalid snapshot: expected {0}, got an empty value")]
    InvalidSnapshot(&'static str),

    #[error("Attribute '{field}' already exists with a different value. See '{source_name}'")]
    OverlappingField { source_name: String, field: String },

    #[error("Invalid ordering field: '{0}'")]
    InvalidOrdering(String),

    #[error("Unknown field: '{0}'")]
    UnknownField(String),

    #[error("No refsets exist for subject '{0}'")]
    NoRefsetsExist(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
