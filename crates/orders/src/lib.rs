//! `backstock-orders` — sales orders and the stock reconciliation planner.

pub mod order;
pub mod reconcile;

pub use order::{Order, OrderChannel, OrderLine, OrderNumber, OrderStatus, SubmittedLine};
pub use reconcile::{
    plan_creation, plan_edit, CreationPlan, LineOp, ProductFacts, ReconcilePlan, StockMovement,
};
