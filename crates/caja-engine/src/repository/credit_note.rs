//! # Credit Note Repository
//!
//! Storage for credit notes. The only mutation is redemption, implemented
//! as a conditional UPDATE on `status = 'active'` so a note can never be
//! spent twice even under concurrent redeem attempts.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use caja_core::{CreditNote, CreditNoteStatus};

use crate::error::DbResult;

/// Inserts a freshly issued note. Fails with a UNIQUE violation if the code
/// collides (the engine retries with a new code).
pub async fn insert_credit_note(
    conn: &mut SqliteConnection,
    note: &CreditNote,
    idempotency_key: Option<&str>,
) -> DbResult<()> {
    debug!(id = %note.id, code = %note.code, amount_cents = note.amount_cents, "Issuing credit note");

    sqlx::query(
        r#"
        INSERT INTO credit_notes (id, code, amount_cents, status, observations,
                                  issued_at, idempotency_key)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&note.id)
    .bind(&note.code)
    .bind(note.amount_cents)
    .bind(note.status)
    .bind(&note.observations)
    .bind(note.issued_at)
    .bind(idempotency_key)
    .execute(conn)
    .await?;

    Ok(())
}

/// Looks up a note by its human-enterable code.
pub async fn find_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<Option<CreditNote>> {
    let note = sqlx::query_as::<_, CreditNote>("SELECT * FROM credit_notes WHERE code = ?1")
        .bind(code)
        .fetch_optional(conn)
        .await?;

    Ok(note)
}

/// Gets a note by id.
pub async fn get_credit_note(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<CreditNote>> {
    let note = sqlx::query_as::<_, CreditNote>("SELECT * FROM credit_notes WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(note)
}

/// Looks up a previously issued note by idempotency key (replay path).
pub async fn find_by_idempotency_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> DbResult<Option<CreditNote>> {
    let note =
        sqlx::query_as::<_, CreditNote>("SELECT * FROM credit_notes WHERE idempotency_key = ?1")
            .bind(key)
            .fetch_optional(conn)
            .await?;

    Ok(note)
}

/// Marks an active note redeemed, recording when and against which sale.
///
/// Returns rows affected: 0 means the note was already redeemed (or the id
/// is unknown) and the caller must not honor it.
pub async fn redeem_active(
    conn: &mut SqliteConnection,
    id: &str,
    redeemed_at: DateTime<Utc>,
    redeemed_sale_id: Option<&str>,
) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE credit_notes
        SET status = 'redeemed', redeemed_at = ?2, redeemed_sale_id = ?3
        WHERE id = ?1 AND status = 'active'
        "#,
    )
    .bind(id)
    .bind(redeemed_at)
    .bind(redeemed_sale_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Lists notes, optionally filtered by status, newest first.
pub async fn list_credit_notes(
    conn: &mut SqliteConnection,
    status: Option<CreditNoteStatus>,
    limit: i64,
) -> DbResult<Vec<CreditNote>> {
    let notes = match status {
        Some(status) => {
            sqlx::query_as::<_, CreditNote>(
                "SELECT * FROM credit_notes WHERE status = ?1 ORDER BY issued_at DESC LIMIT ?2",
            )
            .bind(status)
            .bind(limit)
            .fetch_all(conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, CreditNote>(
                "SELECT * FROM credit_notes ORDER BY issued_at DESC LIMIT ?1",
            )
            .bind(limit)
            .fetch_all(conn)
            .await?
        }
    };

    Ok(notes)
}
