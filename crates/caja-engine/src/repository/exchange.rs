//! # Exchange Repository
//!
//! Storage for exchange transactions and the items that moved through them.
//! Exchanges are created fully resolved in one insert; they are never
//! updated afterwards.

use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use caja_core::{ExchangeDirection, ExchangeItem, ExchangeTransaction};

use crate::error::DbResult;

/// Inserts an exchange row with its resolution already decided.
pub async fn insert_exchange(
    conn: &mut SqliteConnection,
    exchange: &ExchangeTransaction,
    idempotency_key: Option<&str>,
) -> DbResult<()> {
    debug!(
        id = %exchange.id,
        balance_cents = exchange.balance_cents,
        resolution = ?exchange.resolution,
        "Inserting exchange"
    );

    sqlx::query(
        r#"
        INSERT INTO exchanges (id, balance_cents, resolution, movement_id,
                               credit_note_id, idempotency_key, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&exchange.id)
    .bind(exchange.balance_cents)
    .bind(exchange.resolution)
    .bind(&exchange.movement_id)
    .bind(&exchange.credit_note_id)
    .bind(idempotency_key)
    .bind(exchange.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Inserts item snapshots for one direction of an exchange.
pub async fn insert_exchange_items(
    conn: &mut SqliteConnection,
    exchange_id: &str,
    direction: ExchangeDirection,
    items: &[ExchangeItem],
) -> DbResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO exchange_items (id, exchange_id, direction, variant_id,
                                        sku_snapshot, name_snapshot, quantity, unit_price_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(exchange_id)
        .bind(direction)
        .bind(&item.variant_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Gets an exchange by id.
pub async fn get_exchange(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<ExchangeTransaction>> {
    let exchange =
        sqlx::query_as::<_, ExchangeTransaction>("SELECT * FROM exchanges WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

    Ok(exchange)
}

/// Looks up a previously committed exchange by idempotency key (replay path).
pub async fn find_by_idempotency_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> DbResult<Option<ExchangeTransaction>> {
    let exchange = sqlx::query_as::<_, ExchangeTransaction>(
        "SELECT * FROM exchanges WHERE idempotency_key = ?1",
    )
    .bind(key)
    .fetch_optional(conn)
    .await?;

    Ok(exchange)
}
