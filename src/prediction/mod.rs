pub mod predictor;
pub mod preflight;

pub use predictor::{Confidence, EstimationMethod, MemorySample, ResourcePrediction, ResourcePredictor};
pub use preflight::{admit, Admission};
