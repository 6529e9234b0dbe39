//! Credit notes: issuance, lookup, single-use redemption.

mod common;

use caja_core::CreditNoteStatus;
use caja_engine::{EngineError, ErrorKind};

use common::engine_with_stock;

#[tokio::test]
async fn issued_notes_have_unique_codes() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let a = engine.issue_credit_note(10_000, None, None).await.unwrap();
    let b = engine
        .issue_credit_note(20_000, Some("devolución remera".to_string()), None)
        .await
        .unwrap();

    assert!(a.code.starts_with("NC-"));
    assert_eq!(a.code.len(), 11);
    assert_ne!(a.code, b.code);
    assert!(a.is_active());
    assert_eq!(b.observations.as_deref(), Some("devolución remera"));
}

#[tokio::test]
async fn non_positive_amounts_rejected() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    assert_eq!(
        engine
            .issue_credit_note(0, None, None)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        engine
            .issue_credit_note(-5_000, None, None)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );
}

#[tokio::test]
async fn redeem_is_single_shot() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let note = engine.issue_credit_note(15_000, None, None).await.unwrap();

    let redeemed = engine.redeem_credit_note(&note.code, None).await.unwrap();
    assert_eq!(redeemed.status, CreditNoteStatus::Redeemed);
    assert!(redeemed.redeemed_at.is_some());

    // Second attempt fails and leaves the note redeemed.
    let err = engine.redeem_credit_note(&note.code, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let looked_up = engine.lookup_credit_note(&note.code).await.unwrap();
    assert_eq!(looked_up.status, CreditNoteStatus::Redeemed);
    assert_eq!(looked_up.amount_cents, 15_000);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let err = engine.lookup_credit_note("NC-DEADBEEF").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = engine
        .redeem_credit_note("NC-DEADBEEF", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn redeeming_against_an_unknown_sale_is_not_found() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let note = engine.issue_credit_note(15_000, None, None).await.unwrap();
    let err = engine
        .redeem_credit_note(&note.code, Some("no-such-sale"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The failed attempt must not consume the note.
    let looked_up = engine.lookup_credit_note(&note.code).await.unwrap();
    assert!(looked_up.is_active());
}

#[tokio::test]
async fn listing_filters_by_status() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let a = engine.issue_credit_note(10_000, None, None).await.unwrap();
    let b = engine.issue_credit_note(20_000, None, None).await.unwrap();
    engine.redeem_credit_note(&a.code, None).await.unwrap();

    let active = engine
        .list_credit_notes(Some(CreditNoteStatus::Active), 10)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].code, b.code);

    let all = engine.list_credit_notes(None, 10).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn issuance_replays_on_idempotency_key() {
    let (engine, _catalog) = engine_with_stock(&[]).await;

    let key = Some("refund-99".to_string());
    let first = engine
        .issue_credit_note(10_000, None, key.clone())
        .await
        .unwrap();
    let second = engine.issue_credit_note(10_000, None, key).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.code, second.code);

    let all = engine.list_credit_notes(None, 10).await.unwrap();
    assert_eq!(all.len(), 1);
}
