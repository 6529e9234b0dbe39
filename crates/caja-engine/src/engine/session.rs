//! # Session Manager
//!
//! Open, observe, withdraw from and close register sessions.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  open_session(till, float)                                              │
//! │       │  at most one open session per till (lock + partial index)      │
//! │       ▼                                                                 │
//! │  ┌────────┐  checkout / deposits / pickups / exchanges / withdrawals   │
//! │  │  Open  │ ◄───────────── append-only movements ─────────────────     │
//! │  └───┬────┘                                                             │
//! │      │ close_session(till, counted)                                     │
//! │      ▼                                                                  │
//! │  ┌────────┐  expected = float + Σcash in − Σcash withdrawals           │
//! │  │ Closed │  difference = counted − expected                            │
//! │  └────────┘  totals frozen onto the row, immutable afterwards           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every figure here is derived by replaying the movement ledger through
//! `LedgerTotals`; the session row caches results only at close.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use caja_core::{
    expected_cash_cents, validation, LedgerTotals, MethodTotal, Movement, MovementKind,
    PaymentMethod, ReconciliationSummary, RegisterSession, SessionStatus,
};

use crate::error::{DbError, EngineError, EngineResult};
use crate::repository::{payment_method, session as session_repo};

use super::{RegisterEngine, TillStatus};

/// The open session, its replayed ledger and the cash-method set, loaded
/// together because every session command needs all three.
struct OpenLedger {
    session: RegisterSession,
    movements: Vec<Movement>,
    totals: LedgerTotals,
}

async fn load_open_ledger(
    conn: &mut SqliteConnection,
    till_id: &str,
) -> EngineResult<Option<OpenLedger>> {
    let session = match session_repo::find_open_session(conn, till_id).await? {
        Some(session) => session,
        None => return Ok(None),
    };

    let movements = session_repo::list_movements(conn, &session.id).await?;
    let cash_ids = payment_method::cash_method_ids(conn).await?;
    let totals = LedgerTotals::accumulate(&movements, &cash_ids);

    Ok(Some(OpenLedger {
        session,
        movements,
        totals,
    }))
}

/// Per-method totals with display names resolved from the registry.
fn method_totals(totals: &LedgerTotals, registry: &[PaymentMethod]) -> Vec<MethodTotal> {
    let names: HashMap<i64, &str> = registry.iter().map(|m| (m.id, m.name.as_str())).collect();

    totals
        .per_method()
        .map(|(method_id, total_cents)| MethodTotal {
            method_id,
            method_name: names
                .get(&method_id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("method {method_id}")),
            total_cents,
        })
        .collect()
}

impl RegisterEngine {
    /// Opens a session for a till with the given opening float.
    ///
    /// ## Errors
    /// - Validation: negative float, blank till id
    /// - Conflict: the till already has an open session
    pub async fn open_session(
        &self,
        till_id: &str,
        opening_float_cents: i64,
    ) -> EngineResult<RegisterSession> {
        validation::validate_till_id(till_id)?;
        validation::validate_opening_float(opening_float_cents)?;

        let _guard = self.lock_till(till_id).await;

        {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
            if session_repo::find_open_session(&mut conn, till_id)
                .await?
                .is_some()
            {
                return Err(EngineError::conflict(format!(
                    "till '{till_id}' already has an open session"
                )));
            }
        }

        let session = RegisterSession {
            id: Uuid::new_v4().to_string(),
            till_id: till_id.to_string(),
            status: SessionStatus::Open,
            opening_float_cents,
            opened_at: Utc::now(),
            closed_at: None,
            counted_cash_cents: None,
            expected_cash_cents: None,
            difference_cents: None,
            total_sales_cents: None,
        };

        let mut tx = self.pool().begin().await.map_err(DbError::from)?;
        // The partial unique index backstops the check above if another
        // process (not just another task) raced us.
        match session_repo::insert_session(&mut tx, &session).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                return Err(EngineError::conflict(format!(
                    "till '{till_id}' already has an open session"
                )));
            }
            Err(err) => return Err(err.into()),
        }
        tx.commit().await.map_err(DbError::from)?;

        info!(
            session_id = %session.id,
            till_id,
            opening_float_cents,
            "Register session opened"
        );

        Ok(session)
    }

    /// Live status of a till: the open session (if any) with its per-method
    /// totals, expected cash and withdrawal list, all derived by replay.
    pub async fn session_status(&self, till_id: &str) -> EngineResult<TillStatus> {
        validation::validate_till_id(till_id)?;

        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

        let ledger = match load_open_ledger(&mut conn, till_id).await? {
            Some(ledger) => ledger,
            None => {
                return Ok(TillStatus {
                    session: None,
                    method_totals: Vec::new(),
                    expected_cash_cents: 0,
                    gross_sales_cents: 0,
                    withdrawals: Vec::new(),
                })
            }
        };

        let registry = payment_method::list_methods(&mut conn).await?;
        let expected = expected_cash_cents(ledger.session.opening_float_cents, &ledger.totals);
        let withdrawals = ledger
            .movements
            .iter()
            .filter(|m| m.kind == MovementKind::Withdrawal)
            .cloned()
            .collect();

        Ok(TillStatus {
            method_totals: method_totals(&ledger.totals, &registry),
            expected_cash_cents: expected,
            gross_sales_cents: ledger.totals.gross_sales_cents,
            withdrawals,
            session: Some(ledger.session),
        })
    }

    /// Takes cash out of the drawer (expense, bank run).
    ///
    /// Posts a Withdrawal movement carrying a single negative cash
    /// allocation, so ledger replay subtracts it naturally.
    ///
    /// ## Errors
    /// - Validation: amount ≤ 0, or more than the cash currently accounted
    /// - InvalidState: no open session, or no active cash method configured
    pub async fn record_withdrawal(
        &self,
        till_id: &str,
        amount_cents: i64,
        description: Option<String>,
    ) -> EngineResult<Movement> {
        validation::validate_till_id(till_id)?;

        let _guard = self.lock_till(till_id).await;

        let (session_id, cash_method_id) = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let ledger = load_open_ledger(&mut conn, till_id).await?.ok_or_else(|| {
                EngineError::invalid_state(format!("no open session for till '{till_id}'"))
            })?;

            let available =
                expected_cash_cents(ledger.session.opening_float_cents, &ledger.totals);
            validation::validate_withdrawal(amount_cents, available)?;

            let cash_method = payment_method::primary_cash_method(&mut conn)
                .await?
                .ok_or_else(|| {
                    EngineError::invalid_state("no active cash payment method configured")
                })?;

            (ledger.session.id, cash_method.id)
        };

        let movement = Movement {
            id: Uuid::new_v4().to_string(),
            session_id,
            kind: MovementKind::Withdrawal,
            gross_amount_cents: -amount_cents,
            reference: None,
            description,
            created_at: Utc::now(),
            allocations: vec![caja_core::PaymentAllocation::new(
                cash_method_id,
                -amount_cents,
            )],
        };

        let mut tx = self.pool().begin().await.map_err(DbError::from)?;
        session_repo::insert_movement(&mut tx, &movement).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            movement_id = %movement.id,
            till_id,
            amount_cents,
            "Cash withdrawal recorded"
        );

        Ok(movement)
    }

    /// Closes the till's open session against a physical cash count.
    ///
    /// Freezes expected cash, difference and gross sales onto the session
    /// row; the session is immutable afterwards.
    ///
    /// ## Errors
    /// - Validation: negative count
    /// - InvalidState: no open session for the till (includes double close)
    pub async fn close_session(
        &self,
        till_id: &str,
        counted_cash_cents: i64,
    ) -> EngineResult<ReconciliationSummary> {
        validation::validate_till_id(till_id)?;
        if counted_cash_cents < 0 {
            return Err(caja_core::ValidationError::MustBeNonNegative {
                field: "counted_cash".to_string(),
            }
            .into());
        }

        let _guard = self.lock_till(till_id).await;

        let (ledger, registry) = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let ledger = load_open_ledger(&mut conn, till_id).await?.ok_or_else(|| {
                EngineError::invalid_state(format!("no open session for till '{till_id}'"))
            })?;
            let registry = payment_method::list_methods(&mut conn).await?;

            (ledger, registry)
        };

        let expected = expected_cash_cents(ledger.session.opening_float_cents, &ledger.totals);
        let difference = counted_cash_cents - expected;
        let closed_at = Utc::now();

        let mut tx = self.pool().begin().await.map_err(DbError::from)?;
        let updated = session_repo::close_open_session(
            &mut tx,
            &ledger.session.id,
            closed_at,
            counted_cash_cents,
            expected,
            difference,
            ledger.totals.gross_sales_cents,
        )
        .await?;
        if updated == 0 {
            // Lost a race we should have been protected from by the till lock.
            return Err(EngineError::invalid_state(format!(
                "session {} is no longer open",
                ledger.session.id
            )));
        }
        tx.commit().await.map_err(DbError::from)?;

        info!(
            session_id = %ledger.session.id,
            till_id,
            expected_cash_cents = expected,
            counted_cash_cents,
            difference_cents = difference,
            "Register session closed"
        );

        Ok(ReconciliationSummary {
            session_id: ledger.session.id,
            expected_cash_cents: expected,
            counted_cash_cents,
            difference_cents: difference,
            total_sales_cents: ledger.totals.gross_sales_cents,
            method_totals: method_totals(&ledger.totals, &registry),
        })
    }

    /// Recent closed sessions for a till, newest first, with their frozen
    /// reconciliation totals.
    pub async fn list_closed_sessions(
        &self,
        till_id: &str,
        limit: i64,
    ) -> EngineResult<Vec<RegisterSession>> {
        validation::validate_till_id(till_id)?;

        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        let sessions = session_repo::list_closed_sessions(&mut conn, till_id, limit.max(1)).await?;

        debug!(till_id, count = sessions.len(), "Listed closed sessions");
        Ok(sessions)
    }

    /// The payment method registry (seeded by migration, read-only here).
    pub async fn payment_methods(&self) -> EngineResult<Vec<PaymentMethod>> {
        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        Ok(payment_method::list_methods(&mut conn).await?)
    }
}
