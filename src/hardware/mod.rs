pub mod detection;
pub mod memory;

pub use detection::detect_size_class;
pub use memory::{process_peak_memory, MemoryInfo, MemoryProbe, SystemMemory, BYTES_PER_GB};
