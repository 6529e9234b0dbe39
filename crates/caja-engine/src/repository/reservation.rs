//! # Reservation Repository
//!
//! Storage for reservations and their held items. Status transitions are
//! conditional UPDATEs on the current status so concurrent pickup/cancel
//! attempts resolve to exactly one winner.

use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use caja_core::{CartLine, Reservation, ReservationItem, ReservationStatus};

use crate::error::DbResult;

/// Inserts a reservation row.
pub async fn insert_reservation(
    conn: &mut SqliteConnection,
    reservation: &Reservation,
) -> DbResult<()> {
    debug!(
        id = %reservation.id,
        client = %reservation.client_name,
        total_cents = reservation.total_cents,
        deposit_cents = reservation.deposit_cents,
        "Inserting reservation"
    );

    sqlx::query(
        r#"
        INSERT INTO reservations (id, client_name, client_phone, total_cents,
                                  deposit_cents, deposit_method_id, status, created_at, due_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&reservation.id)
    .bind(&reservation.client_name)
    .bind(&reservation.client_phone)
    .bind(reservation.total_cents)
    .bind(reservation.deposit_cents)
    .bind(reservation.deposit_method_id)
    .bind(reservation.status)
    .bind(reservation.created_at)
    .bind(reservation.due_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Inserts the held items from the booking cart. Every line must carry a
/// variant id (the engine rejects manual lines before reaching here).
pub async fn insert_reservation_items(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    lines: &[CartLine],
) -> DbResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO reservation_items (id, reservation_id, variant_id, sku_snapshot,
                                           name_snapshot, quantity, unit_price_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(reservation_id)
        .bind(&line.variant_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Gets a reservation by id.
pub async fn get_reservation(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(reservation)
}

/// Lists the items held by a reservation.
pub async fn list_reservation_items(
    conn: &mut SqliteConnection,
    reservation_id: &str,
) -> DbResult<Vec<ReservationItem>> {
    let items = sqlx::query_as::<_, ReservationItem>(
        "SELECT * FROM reservation_items WHERE reservation_id = ?1",
    )
    .bind(reservation_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

/// Lists reservations, optionally filtered by status, newest first.
pub async fn list_reservations(
    conn: &mut SqliteConnection,
    status: Option<ReservationStatus>,
    limit: i64,
) -> DbResult<Vec<Reservation>> {
    let reservations = match status {
        Some(status) => {
            sqlx::query_as::<_, Reservation>(
                "SELECT * FROM reservations WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
            )
            .bind(status)
            .bind(limit)
            .fetch_all(conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, Reservation>(
                "SELECT * FROM reservations ORDER BY created_at DESC LIMIT ?1",
            )
            .bind(limit)
            .fetch_all(conn)
            .await?
        }
    };

    Ok(reservations)
}

/// Transitions a pending reservation to a new status.
///
/// Returns rows affected: 0 means the reservation was not pending, so the
/// caller lost a race or is acting on a finished reservation.
pub async fn transition_pending(
    conn: &mut SqliteConnection,
    id: &str,
    to: ReservationStatus,
) -> DbResult<u64> {
    let result =
        sqlx::query("UPDATE reservations SET status = ?2 WHERE id = ?1 AND status = 'pending'")
            .bind(id)
            .bind(to)
            .execute(conn)
            .await?;

    Ok(result.rows_affected())
}
