pub mod manager;
pub mod state;

pub use manager::{CheckpointLoad, CheckpointStore};
pub use state::{CellState, MatrixCheckpoint, CHECKPOINT_VERSION};
