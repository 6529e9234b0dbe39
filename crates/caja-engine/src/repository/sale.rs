//! # Sale Repository
//!
//! Storage for committed sales and their line items. Sales are inserted
//! fully formed inside the checkout transaction; there is no draft state
//! and no update path.

use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use caja_core::{CartLine, Sale, SaleItem};

use crate::error::DbResult;

/// Inserts a sale row. The idempotency key is stored alongside but is not
/// part of the domain type; NULL keys never collide.
pub async fn insert_sale(
    conn: &mut SqliteConnection,
    sale: &Sale,
    idempotency_key: Option<&str>,
) -> DbResult<()> {
    debug!(id = %sale.id, total_cents = sale.total_cents, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (id, session_id, total_cents, line_total_cents,
                           notes, idempotency_key, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.session_id)
    .bind(sale.total_cents)
    .bind(sale.line_total_cents)
    .bind(&sale.notes)
    .bind(idempotency_key)
    .bind(sale.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Inserts the snapshot items for a sale from the cart it was committed with.
pub async fn insert_sale_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
    lines: &[CartLine],
) -> DbResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO sale_items (id, sale_id, variant_id, sku_snapshot,
                                    name_snapshot, quantity, unit_price_cents, line_total_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(sale_id)
        .bind(&line.variant_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Gets a sale by id.
pub async fn get_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(sale)
}

/// Looks up a previously committed sale by idempotency key (replay path).
pub async fn find_sale_by_idempotency_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE idempotency_key = ?1")
        .bind(key)
        .fetch_optional(conn)
        .await?;

    Ok(sale)
}

/// Lists the line items of a sale.
pub async fn list_sale_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1")
        .bind(sale_id)
        .fetch_all(conn)
        .await?;

    Ok(items)
}
