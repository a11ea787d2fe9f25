mod invalidate;
mod order;
mod pass;
mod types;
mod walker;

pub use invalidate::{invalidate, InvalidationContext};
pub use pass::run_rebuild_pass_with_builder;
pub use types::{OutcomeState, PackageOutcome, RebuildPlan, RebuildReport};
pub use walker::compute_rebuild_set;
