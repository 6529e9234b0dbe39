//! # Credit Note Ledger
//!
//! Issue, look up, list and redeem single-use store-credit notes.
//!
//! A note is a fixed-amount liability: issued Active, spent exactly once
//! (at checkout, standalone, or never), always at full value. Redemption is
//! a conditional UPDATE so two simultaneous attempts can never both win.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use caja_core::{validation, CreditNote, CreditNoteStatus, CREDIT_NOTE_CODE_PREFIX};

use crate::error::{DbError, EngineError, EngineResult};
use crate::repository::{credit_note as note_repo, sale as sale_repo};

use super::RegisterEngine;

/// Collisions on 8 hex chars are vanishingly rare; a handful of retries is
/// plenty before declaring the code space unusable.
const MAX_CODE_ATTEMPTS: u32 = 5;

/// A fresh human-enterable code: "NC-" + 8 uppercase hex chars.
fn generate_note_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", CREDIT_NOTE_CODE_PREFIX, hex[..8].to_uppercase())
}

/// Inserts a new Active note, regenerating the code on a UNIQUE collision.
pub(super) async fn insert_note_with_unique_code(
    conn: &mut SqliteConnection,
    amount_cents: i64,
    observations: Option<String>,
    idempotency_key: Option<&str>,
) -> EngineResult<CreditNote> {
    for attempt in 0..MAX_CODE_ATTEMPTS {
        let note = CreditNote {
            id: Uuid::new_v4().to_string(),
            code: generate_note_code(),
            amount_cents,
            status: CreditNoteStatus::Active,
            observations: observations.clone(),
            issued_at: Utc::now(),
            redeemed_at: None,
            redeemed_sale_id: None,
        };

        match note_repo::insert_credit_note(&mut *conn, &note, idempotency_key).await {
            Ok(()) => return Ok(note),
            Err(DbError::UniqueViolation { field }) if field.contains("code") => {
                debug!(attempt, code = %note.code, "Credit note code collision, regenerating");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(EngineError::conflict(
        "could not allocate a unique credit note code",
    ))
}

impl RegisterEngine {
    /// Issues a new credit note for a fixed amount.
    ///
    /// ## Errors
    /// - Validation: amount ≤ 0
    pub async fn issue_credit_note(
        &self,
        amount_cents: i64,
        observations: Option<String>,
        idempotency_key: Option<String>,
    ) -> EngineResult<CreditNote> {
        validation::validate_credit_note_amount(amount_cents)?;

        if let Some(key) = idempotency_key.as_deref() {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
            if let Some(note) = note_repo::find_by_idempotency_key(&mut conn, key).await? {
                debug!(key, code = %note.code, "Credit note issuance replayed");
                return Ok(note);
            }
        }

        let mut tx = self.pool().begin().await.map_err(DbError::from)?;
        let note = insert_note_with_unique_code(
            &mut tx,
            amount_cents,
            observations,
            idempotency_key.as_deref(),
        )
        .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(code = %note.code, amount_cents, "Credit note issued");
        Ok(note)
    }

    /// Redeems an active note at full value, optionally recording the sale
    /// it paid for. Checkout-inline redemption goes through
    /// [`RegisterEngine::checkout`] instead, atomically with the sale.
    ///
    /// ## Errors
    /// - NotFound: unknown code, or unknown sale id
    /// - InvalidState: already redeemed (status left untouched)
    pub async fn redeem_credit_note(
        &self,
        code: &str,
        sale_id: Option<&str>,
    ) -> EngineResult<CreditNote> {
        validation::validate_credit_note_code(code)?;
        let code = code.trim();

        let note = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let note = note_repo::find_by_code(&mut conn, code)
                .await?
                .ok_or_else(|| EngineError::not_found("credit note", code))?;

            if let Some(sale_id) = sale_id {
                sale_repo::get_sale(&mut conn, sale_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("sale", sale_id))?;
            }

            note
        };

        let redeemed_at = Utc::now();

        let mut tx = self.pool().begin().await.map_err(DbError::from)?;
        let rows = note_repo::redeem_active(&mut tx, &note.id, redeemed_at, sale_id).await?;
        if rows == 0 {
            return Err(EngineError::invalid_state(format!(
                "credit note {} is already redeemed",
                note.code
            )));
        }
        tx.commit().await.map_err(DbError::from)?;

        info!(code = %note.code, amount_cents = note.amount_cents, "Credit note redeemed");

        Ok(CreditNote {
            status: CreditNoteStatus::Redeemed,
            redeemed_at: Some(redeemed_at),
            redeemed_sale_id: sale_id.map(|s| s.to_string()),
            ..note
        })
    }

    /// Read-only validity check for a code as entered at the register.
    ///
    /// ## Errors
    /// - NotFound: unknown code
    pub async fn lookup_credit_note(&self, code: &str) -> EngineResult<CreditNote> {
        validation::validate_credit_note_code(code)?;

        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        note_repo::find_by_code(&mut conn, code.trim())
            .await?
            .ok_or_else(|| EngineError::not_found("credit note", code.trim()))
    }

    /// Notes newest first, optionally filtered by status.
    pub async fn list_credit_notes(
        &self,
        status: Option<CreditNoteStatus>,
        limit: i64,
    ) -> EngineResult<Vec<CreditNote>> {
        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        Ok(note_repo::list_credit_notes(&mut conn, status, limit.max(1)).await?)
    }
}
