pub mod events;
pub mod orchestrator;
pub mod summary;

pub use events::EventLog;
pub use orchestrator::{MatrixRunner, PlanEntry, RunOutcome};
pub use summary::{BestConfig, RunSummary, RULE};
