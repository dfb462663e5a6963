pub mod classify;
pub mod directive;
pub mod engine;
pub mod record;

pub use classify::{classify, Classification};
pub use directive::{DirectiveRule, DirectiveScope, TerminationDirective};
pub use engine::TerminationEngine;
pub use record::{Rating, ResultRecord, WorkloadResult, WorkloadStatus};
