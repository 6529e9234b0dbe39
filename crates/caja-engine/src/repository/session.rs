//! # Session & Movement Repository
//!
//! Storage for register sessions and their append-only movement ledger.
//!
//! Movements are write-once: there is deliberately no update or delete here.
//! Session rows are updated exactly once, by `close_open_session`, which is
//! conditional on `status = 'open'` so a racing double-close loses cleanly.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use caja_core::{Movement, MovementKind, PaymentAllocation, RegisterSession};

use crate::error::DbResult;

// =============================================================================
// Sessions
// =============================================================================

/// Inserts a freshly opened session row.
///
/// The partial unique index on `(till_id) WHERE status = 'open'` makes this
/// fail with a UNIQUE violation if the till already has an open session.
pub async fn insert_session(
    conn: &mut SqliteConnection,
    session: &RegisterSession,
) -> DbResult<()> {
    debug!(id = %session.id, till_id = %session.till_id, "Inserting register session");

    sqlx::query(
        r#"
        INSERT INTO register_sessions (id, till_id, status, opening_float_cents, opened_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&session.id)
    .bind(&session.till_id)
    .bind(session.status)
    .bind(session.opening_float_cents)
    .bind(session.opened_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Finds the open session for a till, if any.
pub async fn find_open_session(
    conn: &mut SqliteConnection,
    till_id: &str,
) -> DbResult<Option<RegisterSession>> {
    let session = sqlx::query_as::<_, RegisterSession>(
        "SELECT * FROM register_sessions WHERE till_id = ?1 AND status = 'open'",
    )
    .bind(till_id)
    .fetch_optional(conn)
    .await?;

    Ok(session)
}

/// Gets a session by id.
pub async fn get_session(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<RegisterSession>> {
    let session =
        sqlx::query_as::<_, RegisterSession>("SELECT * FROM register_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

    Ok(session)
}

/// Freezes reconciliation totals onto an open session and closes it.
///
/// Returns the number of rows updated: 0 means the session was not open
/// (already closed or never existed), which the engine maps to InvalidState.
#[allow(clippy::too_many_arguments)]
pub async fn close_open_session(
    conn: &mut SqliteConnection,
    id: &str,
    closed_at: DateTime<Utc>,
    counted_cash_cents: i64,
    expected_cash_cents: i64,
    difference_cents: i64,
    total_sales_cents: i64,
) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE register_sessions
        SET status = 'closed',
            closed_at = ?2,
            counted_cash_cents = ?3,
            expected_cash_cents = ?4,
            difference_cents = ?5,
            total_sales_cents = ?6
        WHERE id = ?1 AND status = 'open'
        "#,
    )
    .bind(id)
    .bind(closed_at)
    .bind(counted_cash_cents)
    .bind(expected_cash_cents)
    .bind(difference_cents)
    .bind(total_sales_cents)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Lists closed sessions for a till, most recently closed first.
pub async fn list_closed_sessions(
    conn: &mut SqliteConnection,
    till_id: &str,
    limit: i64,
) -> DbResult<Vec<RegisterSession>> {
    let sessions = sqlx::query_as::<_, RegisterSession>(
        r#"
        SELECT * FROM register_sessions
        WHERE till_id = ?1 AND status = 'closed'
        ORDER BY closed_at DESC
        LIMIT ?2
        "#,
    )
    .bind(till_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;

    Ok(sessions)
}

// =============================================================================
// Movements
// =============================================================================

/// Row shape for the movements table; allocations live in their own table.
#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: String,
    session_id: String,
    kind: MovementKind,
    gross_amount_cents: i64,
    reference: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

/// Appends a movement and its allocation rows.
pub async fn insert_movement(conn: &mut SqliteConnection, movement: &Movement) -> DbResult<()> {
    debug!(
        id = %movement.id,
        session_id = %movement.session_id,
        kind = ?movement.kind,
        gross_amount_cents = movement.gross_amount_cents,
        "Appending movement"
    );

    sqlx::query(
        r#"
        INSERT INTO movements (id, session_id, kind, gross_amount_cents,
                               reference, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.session_id)
    .bind(movement.kind)
    .bind(movement.gross_amount_cents)
    .bind(&movement.reference)
    .bind(&movement.description)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    for alloc in &movement.allocations {
        sqlx::query(
            r#"
            INSERT INTO movement_allocations (id, movement_id, method_id, amount_cents)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&movement.id)
        .bind(alloc.method_id)
        .bind(alloc.amount_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Assembles a Movement from its row plus its allocation rows.
async fn hydrate_movement(conn: &mut SqliteConnection, row: MovementRow) -> DbResult<Movement> {
    let allocations = sqlx::query_as::<_, PaymentAllocation>(
        "SELECT method_id, amount_cents FROM movement_allocations WHERE movement_id = ?1",
    )
    .bind(&row.id)
    .fetch_all(conn)
    .await?;

    Ok(Movement {
        id: row.id,
        session_id: row.session_id,
        kind: row.kind,
        gross_amount_cents: row.gross_amount_cents,
        reference: row.reference,
        description: row.description,
        created_at: row.created_at,
        allocations,
    })
}

/// Gets a movement by id, with allocations.
pub async fn get_movement(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Movement>> {
    let row = sqlx::query_as::<_, MovementRow>("SELECT * FROM movements WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(hydrate_movement(conn, row).await?)),
        None => Ok(None),
    }
}

/// Finds the movement a sale/reservation/exchange produced, by reference id.
pub async fn find_movement_by_reference(
    conn: &mut SqliteConnection,
    reference: &str,
) -> DbResult<Option<Movement>> {
    let row = sqlx::query_as::<_, MovementRow>("SELECT * FROM movements WHERE reference = ?1")
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(hydrate_movement(conn, row).await?)),
        None => Ok(None),
    }
}

/// Loads a session's full movement ledger in chronological order, with
/// allocations attached.
pub async fn list_movements(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<Vec<Movement>> {
    let rows = sqlx::query_as::<_, MovementRow>(
        "SELECT * FROM movements WHERE session_id = ?1 ORDER BY created_at, id",
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut movements = Vec::with_capacity(rows.len());
    for row in rows {
        movements.push(hydrate_movement(&mut *conn, row).await?);
    }

    Ok(movements)
}
