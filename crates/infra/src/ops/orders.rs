//! Order checkout and edit reconciliation.

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use backstock_core::{DomainError, InventoryId, OrderId, ProductId, UserId};
use backstock_inventory::InventoryRecord;
use backstock_notify::{Notification, NotificationSink};
use backstock_orders::{
    plan_creation, plan_edit, LineOp, Order, OrderChannel, OrderLine, OrderStatus, ProductFacts,
    StockMovement, SubmittedLine,
};

use crate::storage::{StorageBackend, StorageTx};

use super::{apply_stock_delta, BackofficeOps, OpError};

/// Input for order creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer: String,
    pub channel: OrderChannel,
    pub lines: Vec<(ProductId, i64)>,
}

/// Resolve products and lock their backing inventories (sorted by id so
/// concurrent operations acquire locks in one global order). Returns the
/// planner facts plus the locked records the movements will be applied to.
async fn lock_facts<T: StorageTx>(
    tx: &mut T,
    product_ids: &[ProductId],
) -> Result<
    (
        HashMap<ProductId, ProductFacts>,
        HashMap<InventoryId, InventoryRecord>,
    ),
    OpError,
> {
    let mut products = Vec::new();
    for product_id in product_ids {
        if products.iter().any(|(id, _)| id == product_id) {
            continue;
        }
        let product = tx
            .get_product(*product_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        products.push((*product_id, product));
    }

    let mut inventory_ids: Vec<InventoryId> =
        products.iter().map(|(_, p)| p.inventory_id).collect();
    inventory_ids.sort();
    inventory_ids.dedup();

    let mut locked = HashMap::new();
    for inventory_id in inventory_ids {
        let record = tx
            .lock_inventory(inventory_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        locked.insert(inventory_id, record);
    }

    let mut facts = HashMap::new();
    for (product_id, product) in products {
        let record = locked
            .get(&product.inventory_id)
            .ok_or(DomainError::NotFound)?;
        facts.insert(
            product_id,
            ProductFacts {
                inventory_id: product.inventory_id,
                price: product.price,
                stock: record.stock,
                name: record.name.clone(),
            },
        );
    }
    Ok((facts, locked))
}

/// Apply planned movements to the locked records, one audit entry each.
async fn apply_movements<T: StorageTx>(
    tx: &mut T,
    locked: &mut HashMap<InventoryId, InventoryRecord>,
    movements: &[StockMovement],
    order: &Order,
    actor: Option<UserId>,
    now: chrono::DateTime<Utc>,
) -> Result<(), OpError> {
    for movement in movements {
        let record = locked
            .get_mut(&movement.inventory_id)
            .ok_or(DomainError::NotFound)?;
        let description = if movement.delta < rust_decimal::Decimal::ZERO {
            format!("Order {}: stock deducted", order.number)
        } else {
            format!("Order {}: stock restored", order.number)
        };
        apply_stock_delta(tx, record, movement.delta, description, actor, now).await?;
    }
    Ok(())
}

impl<S, N> BackofficeOps<S, N>
where
    S: StorageBackend,
    N: NotificationSink,
{
    /// Checkout: verify and deduct stock for every line, or create nothing.
    #[instrument(skip(self, new), fields(customer = %new.customer))]
    pub async fn create_order(
        &self,
        new: NewOrder,
        actor: Option<UserId>,
    ) -> Result<Order, OpError> {
        if new.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line").into());
        }
        let now = Utc::now();
        let mut tx = self.store().begin().await?;

        let product_ids: Vec<ProductId> = new.lines.iter().map(|(id, _)| *id).collect();
        let (facts, mut locked) = lock_facts(&mut tx, &product_ids).await?;

        let plan = plan_creation(&new.lines, &facts)?;

        let mut order = Order::new(OrderId::new(), new.customer, new.channel, now)?;
        order.total = plan.total;
        tx.insert_order(&order).await?;

        apply_movements(&mut tx, &mut locked, &plan.movements, &order, actor, now).await?;

        for (product_id, quantity) in &new.lines {
            let line = OrderLine::new(order.id, *product_id, *quantity)?;
            tx.insert_order_line(&line).await?;
        }
        tx.commit().await?;

        self.sink().publish(
            Notification::new(
                "New order",
                format!(
                    "Order {} created with {} line(s), total {}",
                    order.number,
                    new.lines.len(),
                    order.total
                ),
            )
            .for_user(actor)
            .with_link(format!("/orders/{}", order.id)),
        );
        Ok(order)
    }

    /// Edit reconciliation: apply the minimal corrective stock deltas for the
    /// submitted line set, then recompute the total from persisted state.
    /// Any insufficiency aborts the whole edit.
    #[instrument(skip(self, submitted), fields(order_id = %order_id))]
    pub async fn edit_order(
        &self,
        order_id: OrderId,
        submitted: Vec<SubmittedLine>,
        actor: Option<UserId>,
    ) -> Result<Order, OpError> {
        let now = Utc::now();
        let mut tx = self.store().begin().await?;

        let mut order = tx.get_order(order_id).await?.ok_or(DomainError::NotFound)?;
        let existing = tx.order_lines(order_id).await?;

        let mut product_ids: Vec<ProductId> =
            existing.iter().map(|line| line.product_id).collect();
        product_ids.extend(submitted.iter().map(|line| line.product_id));
        let (facts, mut locked) = lock_facts(&mut tx, &product_ids).await?;

        let plan = plan_edit(&existing, &submitted, &facts)?;

        apply_movements(&mut tx, &mut locked, &plan.movements, &order, actor, now).await?;

        for op in &plan.ops {
            match op {
                LineOp::Create {
                    product_id,
                    quantity,
                } => {
                    let line = OrderLine::new(order.id, *product_id, *quantity)?;
                    tx.insert_order_line(&line).await?;
                }
                LineOp::SetQuantity { line_id, quantity } => {
                    tx.set_line_quantity(*line_id, *quantity).await?;
                }
                LineOp::Remove { line_id } => {
                    tx.delete_order_line(*line_id).await?;
                }
            }
        }

        order.total = plan.total;
        order.updated_at = now;
        tx.update_order(&order).await?;
        tx.commit().await?;

        if !plan.is_noop() {
            self.sink().publish(
                Notification::new(
                    "Order updated",
                    format!("Order {}: new total {}", order.number, order.total),
                )
                .for_user(actor)
                .with_link(format!("/orders/{}", order.id)),
            );
        }
        Ok(order)
    }

    /// Status update through the declarative transition guard. No stock
    /// movement: the reconciler owns stock, this owns the state machine.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
        _actor: Option<UserId>,
    ) -> Result<Order, OpError> {
        let now = Utc::now();
        let mut tx = self.store().begin().await?;
        let mut order = tx.get_order(order_id).await?.ok_or(DomainError::NotFound)?;
        order.transition_to(next, now)?;
        tx.update_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }
}
