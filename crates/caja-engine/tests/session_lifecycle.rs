//! Session lifecycle: open, live status, withdrawals, close reconciliation.

mod common;

use caja_core::PaymentAllocation;
use caja_engine::{CheckoutRequest, EngineError, ErrorKind};

use common::{cart_line, engine_with_stock, CARD, CASH};

fn checkout_paid_with(method_id: i64, variant: &str, amount_cents: i64) -> CheckoutRequest {
    CheckoutRequest {
        lines: vec![cart_line(variant, 1, amount_cents)],
        total_cents: None,
        allocations: vec![PaymentAllocation::new(method_id, amount_cents)],
        credit_note_code: None,
        notes: None,
        idempotency_key: None,
    }
}

/// Open with a 1000 float, sell 500 cash and 300 card, withdraw 200, count
/// 1300 at close: difference must be zero.
#[tokio::test]
async fn full_shift_reconciles_to_zero() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 10), ("v2", 10)]).await;

    let session = engine.open_session("main", 100_000).await.unwrap();
    assert!(session.is_open());

    engine
        .checkout("main", checkout_paid_with(CASH, "v1", 50_000))
        .await
        .unwrap();
    engine
        .checkout("main", checkout_paid_with(CARD, "v2", 30_000))
        .await
        .unwrap();
    engine
        .record_withdrawal("main", 20_000, Some("proveedor".to_string()))
        .await
        .unwrap();

    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.expected_cash_cents, 130_000);
    assert_eq!(status.gross_sales_cents, 80_000);
    assert_eq!(status.withdrawals.len(), 1);

    let summary = engine.close_session("main", 130_000).await.unwrap();
    assert_eq!(summary.expected_cash_cents, 130_000);
    assert_eq!(summary.counted_cash_cents, 130_000);
    assert_eq!(summary.difference_cents, 0);
    assert_eq!(summary.total_sales_cents, 80_000);

    let cash_total = summary
        .method_totals
        .iter()
        .find(|t| t.method_id == CASH)
        .unwrap();
    assert_eq!(cash_total.total_cents, 30_000); // 50_000 in − 20_000 out
    let card_total = summary
        .method_totals
        .iter()
        .find(|t| t.method_id == CARD)
        .unwrap();
    assert_eq!(card_total.total_cents, 30_000);
}

#[tokio::test]
async fn shortage_is_a_negative_difference() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 10)]).await;

    engine.open_session("main", 100_000).await.unwrap();
    engine
        .checkout("main", checkout_paid_with(CASH, "v1", 50_000))
        .await
        .unwrap();

    let summary = engine.close_session("main", 140_000).await.unwrap();
    assert_eq!(summary.expected_cash_cents, 150_000);
    assert_eq!(summary.difference_cents, -10_000);
}

#[tokio::test]
async fn second_open_on_same_till_conflicts() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    engine.open_session("main", 0).await.unwrap();
    let err = engine.open_session("main", 50_000).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // A different till is unaffected.
    engine.open_session("expo", 0).await.unwrap();
}

#[tokio::test]
async fn double_close_is_invalid_state() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    engine.open_session("main", 100_000).await.unwrap();
    engine.close_session("main", 100_000).await.unwrap();

    let err = engine.close_session("main", 100_000).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn negative_opening_float_rejected() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let err = engine.open_session("main", -1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn withdrawal_cannot_exceed_cash_on_hand() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 10)]).await;

    engine.open_session("main", 100_000).await.unwrap();
    engine
        .checkout("main", checkout_paid_with(CARD, "v1", 50_000))
        .await
        .unwrap();

    // Card money never entered the drawer: only the float is available.
    let err = engine
        .record_withdrawal("main", 120_000, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    engine.record_withdrawal("main", 100_000, None).await.unwrap();
    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.expected_cash_cents, 0);
}

#[tokio::test]
async fn withdrawal_without_session_is_invalid_state() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let err = engine.record_withdrawal("main", 1_000, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn status_of_idle_till_is_empty() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let status = engine.session_status("main").await.unwrap();
    assert!(status.session.is_none());
    assert_eq!(status.expected_cash_cents, 0);
    assert!(status.method_totals.is_empty());
}

#[tokio::test]
async fn closed_sessions_keep_frozen_totals() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 10)]).await;

    engine.open_session("main", 100_000).await.unwrap();
    engine
        .checkout("main", checkout_paid_with(CASH, "v1", 50_000))
        .await
        .unwrap();
    engine.close_session("main", 150_000).await.unwrap();

    // Session math restarts from the new float, untouched by history.
    engine.open_session("main", 20_000).await.unwrap();
    engine.close_session("main", 20_000).await.unwrap();

    let closed = engine.list_closed_sessions("main", 10).await.unwrap();
    assert_eq!(closed.len(), 2);
    // Newest first.
    assert_eq!(closed[0].total_sales_cents, Some(0));
    assert_eq!(closed[1].total_sales_cents, Some(50_000));
    assert_eq!(closed[1].expected_cash_cents, Some(150_000));
    assert_eq!(closed[1].difference_cents, Some(0));
}
