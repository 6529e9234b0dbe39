//! # Payment Method Repository
//!
//! Read access to the static payment method registry. Rows are seeded by
//! migration; there is no insert or delete path in the engine.

use std::collections::HashSet;

use sqlx::SqliteConnection;

use caja_core::PaymentMethod;

use crate::error::DbResult;

/// Lists all payment methods, active first, then by id.
pub async fn list_methods(conn: &mut SqliteConnection) -> DbResult<Vec<PaymentMethod>> {
    let methods = sqlx::query_as::<_, PaymentMethod>(
        "SELECT * FROM payment_methods ORDER BY is_active DESC, id",
    )
    .fetch_all(conn)
    .await?;

    Ok(methods)
}

/// Gets a method by id.
pub async fn get_method(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<Option<PaymentMethod>> {
    let method = sqlx::query_as::<_, PaymentMethod>("SELECT * FROM payment_methods WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(method)
}

/// Ids of all cash-kind methods, for drawer math.
pub async fn cash_method_ids(conn: &mut SqliteConnection) -> DbResult<HashSet<i64>> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM payment_methods WHERE kind = 'cash'")
            .fetch_all(conn)
            .await?;

    Ok(ids.into_iter().collect())
}

/// The method withdrawals are posted against: the first active cash method.
pub async fn primary_cash_method(
    conn: &mut SqliteConnection,
) -> DbResult<Option<PaymentMethod>> {
    let method = sqlx::query_as::<_, PaymentMethod>(
        "SELECT * FROM payment_methods WHERE kind = 'cash' AND is_active = 1 ORDER BY id LIMIT 1",
    )
    .fetch_optional(conn)
    .await?;

    Ok(method)
}
