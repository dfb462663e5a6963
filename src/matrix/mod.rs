pub mod builder;
pub mod cell;
pub mod quant;
pub mod signature;

pub use builder::{estimate_file_bytes, MatrixBuilder};
pub use cell::{Cell, CellKey, CellStatus, FailureCause, SizeClass};
pub use quant::{default_priority, parse_quant_list, QuantLevel, DEFAULT_QUANT_PRIORITY};
pub use signature::matrix_signature;
