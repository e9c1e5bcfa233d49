pub mod cell;
pub mod enums;
pub mod filters;

pub use cell::{CellCoordinates, FieldValue, ValueCell};
pub use enums::{Datatype, ValueKind};
pub use filters::CellFilter;
