//! Cross-component scenarios over the in-memory backend: checkout, edit
//! reconciliation, batch production, jobs, and the ledger invariants.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use backstock_core::{DomainError, InventoryId, ProductId};
use backstock_inventory::{HistoryKind, InventoryPatch, InventoryRecord, Sku};
use backstock_notify::InMemorySink;
use backstock_orders::{OrderChannel, OrderStatus, SubmittedLine};
use backstock_products::Product;
use chrono::Utc;

use crate::jobs::{InMemoryJobStore, Job, JobKind, JobStatus, JobStore, JobWorker, JobWorkerConfig};
use crate::ops::{
    BackofficeOps, BatchOutcome, NewComposition, NewCompositionItem, NewInventory, NewOrder,
    OpError,
};
use crate::storage::{InMemoryBackend, StorageBackend, StoreError};
use crate::ExportKind;

type Ops = BackofficeOps<InMemoryBackend, Arc<InMemorySink>>;

fn setup() -> (Arc<Ops>, Arc<InMemorySink>) {
    let sink = Arc::new(InMemorySink::new());
    let ops = Arc::new(BackofficeOps::new(
        InMemoryBackend::new(),
        Arc::clone(&sink),
    ));
    (ops, sink)
}

async fn seed_inventory(ops: &Ops, name: &str, sku: &str, price: i64, stock: i64) -> InventoryRecord {
    ops.create_inventory(NewInventory {
        name: name.to_string(),
        sku: sku.to_string(),
        unit: "pcs".to_string(),
        price: Decimal::from(price),
        stock: Decimal::from(stock),
    })
    .await
    .unwrap()
}

async fn seed_product(ops: &Ops, name: &str, price: i64, inventory_id: InventoryId) -> Product {
    let product = Product::new(
        ProductId::new(),
        name,
        Decimal::from(price),
        inventory_id,
        Utc::now(),
    )
    .unwrap();
    ops.store().insert_product(&product).await.unwrap();
    product
}

async fn stock_of(ops: &Ops, id: InventoryId) -> Decimal {
    ops.store().get_inventory(id).await.unwrap().unwrap().stock
}

async fn history_len(ops: &Ops, id: InventoryId) -> usize {
    ops.store().history_for(id, 1000).await.unwrap().len()
}

#[tokio::test]
async fn checkout_deducts_stock_and_records_audit() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Americano", "AM-1", 5, 10).await;
    let product = seed_product(&ops, "Americano", 5, inv.id).await;

    let order = ops
        .create_order(
            NewOrder {
                customer: "Walk-in".to_string(),
                channel: OrderChannel::PointOfSale,
                lines: vec![(product.id, 3)],
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(order.total, Decimal::from(15));
    assert_eq!(stock_of(&ops, inv.id).await, Decimal::from(7));

    let history = ops.store().history_for(inv.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, HistoryKind::StockAdjustment);
    assert!(history[0].description.contains(order.number.as_str()));

    let lines = ops.store().order_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
}

#[tokio::test]
async fn checkout_aborts_entirely_when_one_line_is_short() {
    let (ops, _) = setup();
    let plenty = seed_inventory(&ops, "Beans", "B-1", 5, 10).await;
    let scarce = seed_inventory(&ops, "Cups", "C-1", 1, 1).await;
    let p1 = seed_product(&ops, "Beans", 5, plenty.id).await;
    let p2 = seed_product(&ops, "Cups", 1, scarce.id).await;

    let err = ops
        .create_order(
            NewOrder {
                customer: "Walk-in".to_string(),
                channel: OrderChannel::Storefront,
                lines: vec![(p1.id, 3), (p2.id, 5)],
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OpError::Domain(DomainError::InsufficientStock { .. })
    ));

    // Nothing moved, nothing was persisted.
    assert_eq!(stock_of(&ops, plenty.id).await, Decimal::from(10));
    assert_eq!(stock_of(&ops, scarce.id).await, Decimal::from(1));
    assert!(ops.store().list_orders().await.unwrap().is_empty());
    assert_eq!(history_len(&ops, plenty.id).await, 0);
}

#[tokio::test]
async fn unchanged_edit_moves_no_stock_and_writes_no_history() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Latte", "L-1", 4, 10).await;
    let product = seed_product(&ops, "Latte", 4, inv.id).await;
    let order = ops
        .create_order(
            NewOrder {
                customer: "Cafe counter".to_string(),
                channel: OrderChannel::PointOfSale,
                lines: vec![(product.id, 4)],
            },
            None,
        )
        .await
        .unwrap();
    let entries_before = history_len(&ops, inv.id).await;
    let line = ops.store().order_lines(order.id).await.unwrap()[0].clone();

    let edited = ops
        .edit_order(
            order.id,
            vec![SubmittedLine {
                id: Some(line.id),
                product_id: product.id,
                quantity: 4,
                remove: false,
            }],
            None,
        )
        .await
        .unwrap();

    assert_eq!(edited.total, order.total);
    assert_eq!(stock_of(&ops, inv.id).await, Decimal::from(6));
    assert_eq!(history_len(&ops, inv.id).await, entries_before);
}

#[tokio::test]
async fn edit_round_trip_returns_stock_with_one_entry_per_change() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Mocha", "M-1", 6, 10).await;
    let product = seed_product(&ops, "Mocha", 6, inv.id).await;
    let order = ops
        .create_order(
            NewOrder {
                customer: "Regular".to_string(),
                channel: OrderChannel::Storefront,
                lines: vec![(product.id, 3)],
            },
            None,
        )
        .await
        .unwrap();
    let line = ops.store().order_lines(order.id).await.unwrap()[0].clone();
    let stock_after_checkout = stock_of(&ops, inv.id).await;
    let entries_after_checkout = history_len(&ops, inv.id).await;

    // Increase by 2, then decrease back by 2.
    ops.edit_order(
        order.id,
        vec![SubmittedLine {
            id: Some(line.id),
            product_id: product.id,
            quantity: 5,
            remove: false,
        }],
        None,
    )
    .await
    .unwrap();
    assert_eq!(stock_of(&ops, inv.id).await, stock_after_checkout - Decimal::from(2));

    let back = ops
        .edit_order(
            order.id,
            vec![SubmittedLine {
                id: Some(line.id),
                product_id: product.id,
                quantity: 3,
                remove: false,
            }],
            None,
        )
        .await
        .unwrap();

    // No drift, one history entry per change.
    assert_eq!(stock_of(&ops, inv.id).await, stock_after_checkout);
    assert_eq!(history_len(&ops, inv.id).await, entries_after_checkout + 2);
    assert_eq!(back.total, Decimal::from(18));
}

#[tokio::test]
async fn edit_insufficiency_aborts_every_line_of_the_request() {
    let (ops, _) = setup();
    let inv_a = seed_inventory(&ops, "Tea", "T-1", 3, 50).await;
    let inv_b = seed_inventory(&ops, "Honey", "H-1", 8, 0).await;
    let p_a = seed_product(&ops, "Tea", 3, inv_a.id).await;
    let p_b = seed_product(&ops, "Honey", 8, inv_b.id).await;

    let order = ops
        .create_order(
            NewOrder {
                customer: "Regular".to_string(),
                channel: OrderChannel::Storefront,
                lines: vec![(p_a.id, 2)],
            },
            None,
        )
        .await
        .unwrap();
    let line = ops.store().order_lines(order.id).await.unwrap()[0].clone();
    let stock_a_before = stock_of(&ops, inv_a.id).await;

    // First line alone would succeed; the second cannot.
    let err = ops
        .edit_order(
            order.id,
            vec![
                SubmittedLine {
                    id: Some(line.id),
                    product_id: p_a.id,
                    quantity: 10,
                    remove: false,
                },
                SubmittedLine {
                    id: None,
                    product_id: p_b.id,
                    quantity: 1,
                    remove: false,
                },
            ],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OpError::Domain(DomainError::InsufficientStock { .. })
    ));

    // Zero net change across all lines.
    assert_eq!(stock_of(&ops, inv_a.id).await, stock_a_before);
    assert_eq!(stock_of(&ops, inv_b.id).await, Decimal::ZERO);
    let lines = ops.store().order_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    let order_after = ops.store().get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order_after.total, order.total);
}

#[tokio::test]
async fn removed_line_restores_stock_and_total() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Scone", "S-1", 2, 10).await;
    let product = seed_product(&ops, "Scone", 2, inv.id).await;
    let order = ops
        .create_order(
            NewOrder {
                customer: "Regular".to_string(),
                channel: OrderChannel::PointOfSale,
                lines: vec![(product.id, 4)],
            },
            None,
        )
        .await
        .unwrap();
    let line = ops.store().order_lines(order.id).await.unwrap()[0].clone();

    let edited = ops
        .edit_order(
            order.id,
            vec![SubmittedLine {
                id: Some(line.id),
                product_id: product.id,
                quantity: 4,
                remove: true,
            }],
            None,
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&ops, inv.id).await, Decimal::from(10));
    assert_eq!(edited.total, Decimal::ZERO);
    assert!(ops.store().order_lines(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_allocation_deducts_min_feasible_and_credits_finished_good() {
    let (ops, sink) = setup();
    let a = seed_inventory(&ops, "Ground coffee", "GC-1", 2, 10).await;
    let b = seed_inventory(&ops, "Bottles", "BT-1", 1, 20).await;
    let finished = seed_inventory(&ops, "Bottled cold brew", "CB-1", 9, 0).await;

    let composition = ops
        .create_composition(NewComposition {
            name: "Cold brew run".to_string(),
            finished_good: finished.id,
            labor_cost: Decimal::from(5),
            yield_per_batch: 1,
            items: vec![
                NewCompositionItem {
                    ingredient: a.id,
                    category: "base".to_string(),
                    stock_used: Decimal::from(3),
                },
                NewCompositionItem {
                    ingredient: b.id,
                    category: "packaging".to_string(),
                    stock_used: Decimal::from(4),
                },
            ],
        })
        .await
        .unwrap();

    let outcome = ops.run_batch(composition.id, 5, None).await.unwrap();
    let run = match outcome {
        BatchOutcome::Processed { run, partial } => {
            assert!(partial);
            run
        }
        other => panic!("expected Processed, got {other:?}"),
    };

    // min(5, floor(10/3)=3, floor(20/4)=5) = 3
    assert_eq!(run.processed_batches, 3);
    assert_eq!(run.requested_batches, 5);
    assert_eq!(stock_of(&ops, a.id).await, Decimal::from(1));
    assert_eq!(stock_of(&ops, b.id).await, Decimal::from(8));
    assert_eq!(stock_of(&ops, finished.id).await, Decimal::from(3));

    // One audit entry per ingredient plus one for the finished good.
    assert_eq!(history_len(&ops, a.id).await, 1);
    assert_eq!(history_len(&ops, b.id).await, 1);
    assert_eq!(history_len(&ops, finished.id).await, 1);

    // One immutable batch run record.
    let runs = ops.store().batch_runs_for(composition.id).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].processed_batches, 3);

    // Two per-ingredient notifications plus a partial-completion summary.
    let notifications = sink.all();
    assert_eq!(
        notifications
            .iter()
            .filter(|n| n.title == "Ingredient consumed")
            .count(),
        2
    );
    let summary = notifications
        .iter()
        .find(|n| n.title == "Production partially completed")
        .expect("partial summary notification");
    assert!(summary.description.contains("3 of 5"));
}

#[tokio::test]
async fn full_completion_emits_completed_summary() {
    let (ops, sink) = setup();
    let a = seed_inventory(&ops, "Syrup", "SY-1", 2, 100).await;
    let finished = seed_inventory(&ops, "Flavored syrup", "FS-1", 4, 0).await;
    let composition = ops
        .create_composition(NewComposition {
            name: "Syrup run".to_string(),
            finished_good: finished.id,
            labor_cost: Decimal::ZERO,
            yield_per_batch: 2,
            items: vec![NewCompositionItem {
                ingredient: a.id,
                category: "base".to_string(),
                stock_used: Decimal::from(1),
            }],
        })
        .await
        .unwrap();

    let outcome = ops.run_batch(composition.id, 5, None).await.unwrap();
    match outcome {
        BatchOutcome::Processed { run, partial } => {
            assert!(!partial);
            assert_eq!(run.processed_batches, 5);
        }
        other => panic!("expected Processed, got {other:?}"),
    }
    // need/batch = 1 × yield 2 = 2; 5 batches consume 10, produce 10 units.
    assert_eq!(stock_of(&ops, a.id).await, Decimal::from(90));
    assert_eq!(stock_of(&ops, finished.id).await, Decimal::from(10));
    assert!(sink
        .all()
        .iter()
        .any(|n| n.title == "Production completed"));
}

#[tokio::test]
async fn infeasible_batch_run_mutates_nothing() {
    let (ops, sink) = setup();
    let a = seed_inventory(&ops, "Matcha", "MA-1", 10, 2).await;
    let finished = seed_inventory(&ops, "Matcha latte kit", "MK-1", 20, 0).await;
    let composition = ops
        .create_composition(NewComposition {
            name: "Matcha kit".to_string(),
            finished_good: finished.id,
            labor_cost: Decimal::ZERO,
            yield_per_batch: 1,
            items: vec![NewCompositionItem {
                ingredient: a.id,
                category: "base".to_string(),
                stock_used: Decimal::from(5),
            }],
        })
        .await
        .unwrap();

    let outcome = ops.run_batch(composition.id, 3, None).await.unwrap();
    assert!(matches!(outcome, BatchOutcome::Infeasible { requested: 3 }));

    assert_eq!(stock_of(&ops, a.id).await, Decimal::from(2));
    assert_eq!(stock_of(&ops, finished.id).await, Decimal::ZERO);
    assert!(ops
        .store()
        .batch_runs_for(composition.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(history_len(&ops, a.id).await, 0);

    let failure = sink
        .all()
        .into_iter()
        .find(|n| n.title == "Production failed")
        .expect("failure notification");
    assert!(failure.description.contains("maximum feasible batches: 0"));
}

#[tokio::test]
async fn malformed_batch_request_short_circuits() {
    let (ops, sink) = setup();
    let a = seed_inventory(&ops, "Beans", "BN-1", 2, 50).await;
    let finished = seed_inventory(&ops, "Roast", "RO-1", 5, 0).await;
    let composition = ops
        .create_composition(NewComposition {
            name: "Roast run".to_string(),
            finished_good: finished.id,
            labor_cost: Decimal::ZERO,
            yield_per_batch: 1,
            items: vec![NewCompositionItem {
                ingredient: a.id,
                category: "base".to_string(),
                stock_used: Decimal::from(1),
            }],
        })
        .await
        .unwrap();

    let outcome = ops.run_batch(composition.id, 0, None).await.unwrap();
    assert!(matches!(outcome, BatchOutcome::Rejected(_)));
    assert_eq!(stock_of(&ops, a.id).await, Decimal::from(50));
    assert!(sink
        .all()
        .iter()
        .any(|n| n.title == "Production not started"));
}

#[tokio::test]
async fn concurrent_adjustments_never_drive_stock_negative() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Limited", "LI-1", 1, 5).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ops = Arc::clone(&ops);
        let id = inv.id;
        handles.push(tokio::spawn(async move {
            ops.adjust_stock(id, Decimal::from(-1), None, None).await
        }));
    }

    let mut successes = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(OpError::Domain(DomainError::InsufficientStock { .. })) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 5);
    assert_eq!(insufficient, 5);
    assert_eq!(stock_of(&ops, inv.id).await, Decimal::ZERO);
    assert_eq!(history_len(&ops, inv.id).await, 5);
}

#[tokio::test]
async fn manual_adjust_below_zero_is_rejected_without_mutation() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Beans", "BN-2", 2, 10).await;

    let err = ops
        .adjust_stock(inv.id, Decimal::from(-20), None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OpError::Domain(DomainError::InsufficientStock { .. })
    ));
    assert_eq!(stock_of(&ops, inv.id).await, Decimal::from(10));
    assert_eq!(history_len(&ops, inv.id).await, 0);
}

#[tokio::test]
async fn tracked_field_update_records_entries_only_for_real_changes() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Beans", "BN-3", 12, 10).await;

    // Proposing the current name changes nothing.
    let unchanged = InventoryPatch {
        name: Some("Beans".to_string()),
        ..Default::default()
    };
    ops.update_inventory(inv.id, unchanged, None).await.unwrap();
    assert_eq!(history_len(&ops, inv.id).await, 0);

    let patch = InventoryPatch {
        price: Some(Decimal::from(15)),
        sku: Some(Sku::new("BN-3-NEW").unwrap()),
        ..Default::default()
    };
    let updated = ops.update_inventory(inv.id, patch, None).await.unwrap();
    assert_eq!(updated.price, Decimal::from(15));
    assert_eq!(history_len(&ops, inv.id).await, 2);
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let (ops, _) = setup();
    seed_inventory(&ops, "First", "DUP-1", 1, 1).await;
    let err = ops
        .create_inventory(NewInventory {
            name: "Second".to_string(),
            sku: "dup-1".to_string(),
            unit: "pcs".to_string(),
            price: Decimal::ONE,
            stock: Decimal::ONE,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OpError::Store(StoreError::Duplicate(_))));
}

#[tokio::test]
async fn status_updates_respect_the_transition_guard() {
    let (ops, _) = setup();
    let inv = seed_inventory(&ops, "Americano", "AM-2", 5, 10).await;
    let product = seed_product(&ops, "Americano", 5, inv.id).await;
    let order = ops
        .create_order(
            NewOrder {
                customer: "Regular".to_string(),
                channel: OrderChannel::Storefront,
                lines: vec![(product.id, 1)],
            },
            None,
        )
        .await
        .unwrap();

    ops.update_order_status(order.id, OrderStatus::Paid, None)
        .await
        .unwrap();
    ops.update_order_status(order.id, OrderStatus::Completed, None)
        .await
        .unwrap();

    let err = ops
        .update_order_status(order.id, OrderStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OpError::Domain(DomainError::InvariantViolation(_))
    ));
}

#[tokio::test]
async fn jobs_drive_batch_production_and_exports() {
    let (ops, sink) = setup();
    let a = seed_inventory(&ops, "Beans", "BN-4", 2, 30).await;
    let finished = seed_inventory(&ops, "Roast", "RO-2", 5, 0).await;
    let composition = ops
        .create_composition(NewComposition {
            name: "Roast run".to_string(),
            finished_good: finished.id,
            labor_cost: Decimal::ZERO,
            yield_per_batch: 1,
            items: vec![NewCompositionItem {
                ingredient: a.id,
                category: "base".to_string(),
                stock_used: Decimal::from(3),
            }],
        })
        .await
        .unwrap();
    let export = ops
        .request_export(ExportKind::Inventories, None)
        .await
        .unwrap();

    let jobs = InMemoryJobStore::arc();
    let worker = JobWorker::spawn(
        Arc::clone(&jobs),
        Arc::clone(&ops),
        JobWorkerConfig::default().with_poll_interval(Duration::from_millis(5)),
    );

    let batch_job = jobs
        .enqueue(Job::new(
            JobKind::BatchProduction {
                composition_id: composition.id,
                requested_batches: 4,
            },
            None,
        ))
        .unwrap();
    let export_job = jobs
        .enqueue(Job::new(
            JobKind::DataExport {
                export_id: export.id,
            },
            None,
        ))
        .unwrap();

    for id in [batch_job, export_job] {
        for attempt in 0.. {
            let job = jobs.get(id).unwrap().unwrap();
            if job.status.is_terminal() {
                assert_eq!(job.status, JobStatus::Success);
                break;
            }
            assert!(attempt < 400, "job {id} never finished");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    worker.shutdown().await;

    // Batch job: 4 requested, 4 feasible (floor(30/3) = 10).
    assert_eq!(stock_of(&ops, a.id).await, Decimal::from(18));
    assert_eq!(stock_of(&ops, finished.id).await, Decimal::from(4));

    // Export job: record reached success with a row count.
    let export = ops.store().get_export(export.id).await.unwrap().unwrap();
    assert_eq!(export.status, crate::ExportStatus::Success);
    assert_eq!(export.row_count, Some(2));
    assert!(sink.all().iter().any(|n| n.title == "Export ready"));
}

#[tokio::test]
async fn batch_run_for_missing_composition_is_not_found() {
    let (ops, _) = setup();
    let err = ops
        .run_batch(backstock_core::CompositionId::new(), 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OpError::Domain(DomainError::NotFound)));
}
