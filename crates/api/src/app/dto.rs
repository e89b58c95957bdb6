use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use backstock_core::{OrderLineId, ProductId, UserId};
use backstock_infra::{DataExport, ExportKind, Job};
use backstock_inventory::{HistoryEntry, InventoryRecord};
use backstock_notify::Notification;
use backstock_orders::{Order, OrderChannel, OrderLine, OrderStatus, SubmittedLine};
use backstock_production::{BatchRun, Composition};
use backstock_products::Product;

#[derive(Debug, Deserialize)]
pub struct CreateInventoryRequest {
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInventoryRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub stock: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    pub inventory_id: backstock_core::InventoryId,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: String,
    pub channel: OrderChannel,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SubmittedLineRequest {
    pub id: Option<OrderLineId>,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub remove: bool,
}

impl From<SubmittedLineRequest> for SubmittedLine {
    fn from(value: SubmittedLineRequest) -> Self {
        SubmittedLine {
            id: value.id,
            product_id: value.product_id,
            quantity: value.quantity,
            remove: value.remove,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub lines: Vec<SubmittedLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CompositionItemRequest {
    pub ingredient: backstock_core::InventoryId,
    pub category: String,
    pub stock_used: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompositionRequest {
    pub name: String,
    pub finished_good: backstock_core::InventoryId,
    #[serde(default)]
    pub labor_cost: Decimal,
    pub yield_per_batch: i64,
    pub items: Vec<CompositionItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub requested_batch: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateExportRequest {
    pub kind: ExportKind,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub user_id: Option<UserId>,
}

pub fn inventory_to_json(record: &InventoryRecord) -> Value {
    json!({
        "id": record.id,
        "product_id": record.product_id,
        "name": record.name,
        "sku": record.sku,
        "unit": record.unit,
        "price": record.price,
        "stock": record.stock,
        "created_at": record.created_at,
        "updated_at": record.updated_at,
    })
}

pub fn history_to_json(entry: &HistoryEntry) -> Value {
    json!({
        "id": entry.id,
        "inventory_id": entry.inventory_id,
        "actor": entry.actor,
        "title": entry.title,
        "description": entry.description,
        "kind": entry.kind,
        "field": entry.field,
        "previous": entry.previous,
        "new": entry.new,
        "recorded_at": entry.recorded_at,
    })
}

pub fn product_to_json(product: &Product) -> Value {
    json!({
        "id": product.id,
        "name": product.name,
        "price": product.price,
        "inventory_id": product.inventory_id,
        "created_at": product.created_at,
    })
}

pub fn order_to_json(order: &Order, lines: &[OrderLine]) -> Value {
    json!({
        "id": order.id,
        "number": order.number,
        "customer": order.customer,
        "status": order.status,
        "status_label": order.status.label(),
        "channel": order.channel,
        "total": order.total,
        "created_at": order.created_at,
        "updated_at": order.updated_at,
        "lines": lines.iter().map(|line| json!({
            "id": line.id,
            "product_id": line.product_id,
            "quantity": line.quantity,
        })).collect::<Vec<_>>(),
    })
}

pub fn composition_to_json(composition: &Composition) -> Value {
    json!({
        "id": composition.id,
        "name": composition.name,
        "finished_good": composition.finished_good,
        "labor_cost": composition.labor_cost,
        "yield_per_batch": composition.yield_per_batch,
        "batch_cost": composition.batch_cost(),
        "unit_cost": composition.unit_cost(),
        "items": composition.items.iter().map(|item| json!({
            "ingredient": item.ingredient,
            "category": item.category,
            "stock_used": item.stock_used,
            "cost": item.cost,
        })).collect::<Vec<_>>(),
    })
}

pub fn batch_run_to_json(run: &BatchRun) -> Value {
    json!({
        "id": run.id,
        "composition_id": run.composition_id,
        "actor": run.actor,
        "requested_batches": run.requested_batches,
        "processed_batches": run.processed_batches,
        "recorded_at": run.recorded_at,
    })
}

pub fn export_to_json(export: &DataExport) -> Value {
    json!({
        "id": export.id,
        "kind": export.kind,
        "status": export.status,
        "error": export.error,
        "row_count": export.row_count,
        "requested_by": export.requested_by,
        "created_at": export.created_at,
        "completed_at": export.completed_at,
    })
}

pub fn job_to_json(job: &Job) -> Value {
    json!({
        "id": job.id,
        "kind": job.kind,
        "status": job.status,
        "submitted_by": job.submitted_by,
        "created_at": job.created_at,
        "updated_at": job.updated_at,
    })
}

pub fn notification_to_json(notification: &Notification) -> Value {
    json!({
        "user_id": notification.user_id,
        "title": notification.title,
        "description": notification.description,
        "link": notification.link,
        "created_at": notification.created_at,
    })
}
