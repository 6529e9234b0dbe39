//! Checkout: mixed payment, stock atomicity, idempotency, inline credit
//! note redemption.

mod common;

use caja_core::PaymentAllocation;
use caja_engine::{CheckoutRequest, EngineError, ErrorKind};

use common::{cart_line, engine_with_stock, CARD, CASH};

fn request(lines: Vec<caja_core::CartLine>, allocations: Vec<PaymentAllocation>) -> CheckoutRequest {
    CheckoutRequest {
        lines,
        total_cents: None,
        allocations,
        credit_note_code: None,
        notes: None,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn mixed_payment_checkout() {
    let (engine, catalog) = engine_with_stock(&[("v1", 5), ("v2", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    let outcome = engine
        .checkout(
            "main",
            request(
                vec![cart_line("v1", 2, 30_000), cart_line("v2", 1, 40_000)],
                vec![
                    PaymentAllocation::new(CASH, 40_000),
                    PaymentAllocation::new(CARD, 60_000),
                ],
            ),
        )
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert_eq!(outcome.sale.total_cents, 100_000);
    assert_eq!(outcome.sale.line_total_cents, 100_000);
    let movement = outcome.movement.unwrap();
    assert_eq!(movement.gross_amount_cents, 100_000);
    assert_eq!(movement.allocations.len(), 2);

    assert_eq!(catalog.available("v1"), 3);
    assert_eq!(catalog.available("v2"), 4);

    // Only the cash allocation reaches the drawer.
    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.expected_cash_cents, 40_000);
    assert_eq!(status.gross_sales_cents, 100_000);
}

#[tokio::test]
async fn operator_override_is_persisted_as_is() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    let outcome = engine
        .checkout(
            "main",
            CheckoutRequest {
                lines: vec![cart_line("v1", 1, 100_000)],
                total_cents: Some(90_000),
                allocations: vec![PaymentAllocation::new(CASH, 90_000)],
                credit_note_code: None,
                notes: Some("descuento".to_string()),
                idempotency_key: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.sale.total_cents, 90_000);
    assert_eq!(outcome.sale.line_total_cents, 100_000);
}

#[tokio::test]
async fn allocation_mismatch_rejected_before_stock() {
    let (engine, catalog) = engine_with_stock(&[("v1", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    let err = engine
        .checkout(
            "main",
            request(
                vec![cart_line("v1", 1, 100_000)],
                vec![PaymentAllocation::new(CASH, 90_000)],
            ),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(catalog.available("v1"), 5);

    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.gross_sales_cents, 0);
}

#[tokio::test]
async fn insufficient_stock_aborts_everything() {
    let (engine, catalog) = engine_with_stock(&[("v1", 5), ("v2", 1)]).await;
    engine.open_session("main", 0).await.unwrap();

    // v1 decrements first, then v2 refuses: v1 must be compensated.
    let err = engine
        .checkout(
            "main",
            request(
                vec![cart_line("v1", 2, 10_000), cart_line("v2", 3, 10_000)],
                vec![PaymentAllocation::new(CASH, 50_000)],
            ),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientStock { .. }));
    assert_eq!(catalog.available("v1"), 5);
    assert_eq!(catalog.available("v2"), 1);

    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.gross_sales_cents, 0);
}

#[tokio::test]
async fn catalog_outage_is_a_dependency_error() {
    let (engine, catalog) = engine_with_stock(&[("v1", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    catalog.set_unavailable(true);
    let err = engine
        .checkout(
            "main",
            request(
                vec![cart_line("v1", 1, 10_000)],
                vec![PaymentAllocation::new(CASH, 10_000)],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);

    catalog.set_unavailable(false);
    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.gross_sales_cents, 0);
    assert_eq!(catalog.available("v1"), 5);
}

#[tokio::test]
async fn checkout_without_session_is_invalid_state() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 5)]).await;

    let err = engine
        .checkout(
            "main",
            request(
                vec![cart_line("v1", 1, 10_000)],
                vec![PaymentAllocation::new(CASH, 10_000)],
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn idempotency_key_replays_the_sale() {
    let (engine, catalog) = engine_with_stock(&[("v1", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    let mut req = request(
        vec![cart_line("v1", 1, 10_000)],
        vec![PaymentAllocation::new(CASH, 10_000)],
    );
    req.idempotency_key = Some("txn-42".to_string());

    let first = engine.checkout("main", req.clone()).await.unwrap();
    let second = engine.checkout("main", req).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.sale.id, second.sale.id);
    assert_eq!(
        second.movement.as_ref().map(|m| m.gross_amount_cents),
        Some(10_000)
    );

    // Charged and destocked exactly once.
    assert_eq!(catalog.available("v1"), 4);
    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.gross_sales_cents, 10_000);
}

#[tokio::test]
async fn credit_note_covers_part_of_the_total() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    let note = engine.issue_credit_note(30_000, None, None).await.unwrap();

    let outcome = engine
        .checkout(
            "main",
            CheckoutRequest {
                lines: vec![cart_line("v1", 1, 100_000)],
                total_cents: None,
                allocations: vec![PaymentAllocation::new(CASH, 70_000)],
                credit_note_code: Some(note.code.clone()),
                notes: None,
                idempotency_key: None,
            },
        )
        .await
        .unwrap();

    let redeemed = outcome.redeemed_credit_note.unwrap();
    assert_eq!(redeemed.code, note.code);
    assert_eq!(redeemed.redeemed_sale_id, Some(outcome.sale.id.clone()));
    assert_eq!(outcome.movement.unwrap().gross_amount_cents, 70_000);

    // Only collected money is drawer money.
    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.expected_cash_cents, 70_000);
}

#[tokio::test]
async fn credit_note_covering_everything_posts_no_movement() {
    let (engine, _catalog) = engine_with_stock(&[("v1", 5)]).await;
    engine.open_session("main", 0).await.unwrap();

    let note = engine.issue_credit_note(30_000, None, None).await.unwrap();

    let outcome = engine
        .checkout(
            "main",
            CheckoutRequest {
                lines: vec![cart_line("v1", 1, 30_000)],
                total_cents: None,
                allocations: vec![],
                credit_note_code: Some(note.code.clone()),
                notes: None,
                idempotency_key: None,
            },
        )
        .await
        .unwrap();

    assert!(outcome.movement.is_none());
    let status = engine.session_status("main").await.unwrap();
    assert_eq!(status.gross_sales_cents, 0);
    assert_eq!(status.expected_cash_cents, 0);

    // The note is spent: a second use must fail.
    let err = engine
        .checkout(
            "main",
            CheckoutRequest {
                lines: vec![cart_line("v1", 1, 30_000)],
                total_cents: None,
                allocations: vec![],
                credit_note_code: Some(note.code),
                notes: None,
                idempotency_key: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn empty_cart_rejected() {
    let (engine, _catalog) = engine_with_stock(&[]).await;
    engine.open_session("main", 0).await.unwrap();

    let err = engine
        .checkout("main", request(vec![], vec![PaymentAllocation::new(CASH, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
