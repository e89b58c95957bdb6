//! `backstock-production` — cost-of-goods compositions and the production
//! batch allocation planner.

pub mod allocator;
pub mod batch;
pub mod composition;

pub use allocator::{plan, AllocationOutcome, AllocationPlan, IngredientDraw, RejectReason};
pub use batch::BatchRun;
pub use composition::{Composition, CompositionItem};
