//! # Sale / Reservation Processor
//!
//! Checkout and the reservation lifecycle (book with seña, pick up, cancel).
//!
//! ## Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout                                                               │
//! │    validate ─► decrement stock ─► TX[ sale + items + movement          │
//! │                                        + note redemption ] ─► commit    │
//! │    commit fails ─► increment stock back (best effort, logged)           │
//! │                                                                         │
//! │  create_reservation                                                     │
//! │    validate ─► hold stock ─► TX[ reservation + items                    │
//! │                                  + deposit movement ] ─► commit         │
//! │                                                                         │
//! │  pickup_reservation                                                     │
//! │    decrement (consumes holds) ─► TX[ pending→picked_up + balance       │
//! │                                      movement ] ─► commit               │
//! │    commit fails ─► increment + re-hold (best effort, logged)            │
//! │                                                                         │
//! │  cancel_reservation                                                     │
//! │    release holds ─► pending→cancelled (conditional)                     │
//! │    transition lost ─► re-hold (best effort, logged)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use caja_core::{
    cart_lines_total_cents, validation, CreditNote, CreditNoteStatus, Movement, MovementKind,
    PaymentAllocation, Reservation, ReservationStatus, Sale, ValidationError,
};

use crate::error::{DbError, EngineError, EngineResult};
use crate::repository::{
    credit_note as note_repo, payment_method, reservation as reservation_repo, sale as sale_repo,
    session as session_repo,
};

use super::{
    CheckoutOutcome, CheckoutRequest, PickupOutcome, RegisterEngine, ReservationListing,
    ReservationRequest, StockAction, StockOp,
};

impl RegisterEngine {
    /// Commits a sale: stock decrement per line, then the sale, its item
    /// snapshots, the Sale movement and any inline credit note redemption in
    /// one transaction.
    ///
    /// When a credit note is applied, the collected amount is
    /// `max(total − note value, 0)`; allocations must sum to exactly that,
    /// and must be empty when the note covers everything (no movement is
    /// posted then — the note was a liability, not drawer money).
    ///
    /// ## Errors
    /// - Validation: empty cart, allocation mismatch, negative total
    /// - InvalidState: no open session, note already redeemed
    /// - InsufficientStock / Dependency: catalog refused or failed
    pub async fn checkout(
        &self,
        till_id: &str,
        request: CheckoutRequest,
    ) -> EngineResult<CheckoutOutcome> {
        validation::validate_till_id(till_id)?;
        validation::validate_cart(&request.lines)?;

        let _guard = self.lock_till(till_id).await;

        // Replay path: same key, same answer, no second charge.
        if let Some(key) = request.idempotency_key.as_deref() {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
            if let Some(sale) = sale_repo::find_sale_by_idempotency_key(&mut conn, key).await? {
                debug!(key, sale_id = %sale.id, "Checkout replayed from idempotency key");
                let movement =
                    session_repo::find_movement_by_reference(&mut conn, &sale.id).await?;
                return Ok(CheckoutOutcome {
                    sale,
                    movement,
                    redeemed_credit_note: None,
                    replayed: true,
                });
            }
        }

        let (session_id, note) = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let session = session_repo::find_open_session(&mut conn, till_id)
                .await?
                .ok_or_else(|| {
                    EngineError::invalid_state(format!("no open session for till '{till_id}'"))
                })?;

            let note = match request.credit_note_code.as_deref() {
                Some(code) => {
                    validation::validate_credit_note_code(code)?;
                    let note = note_repo::find_by_code(&mut conn, code.trim())
                        .await?
                        .ok_or_else(|| EngineError::not_found("credit note", code.trim()))?;
                    if !note.is_active() {
                        return Err(EngineError::invalid_state(format!(
                            "credit note {} is already redeemed",
                            note.code
                        )));
                    }
                    Some(note)
                }
                None => None,
            };

            (session.id, note)
        };

        let line_total = cart_lines_total_cents(&request.lines);
        let total = request.total_cents.unwrap_or(line_total);
        if total < 0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "total".to_string(),
            }
            .into());
        }

        // Amount actually collected: the note is applied first, never
        // refunded in cash when it exceeds the total.
        let note_value = note.as_ref().map(|n| n.amount_cents).unwrap_or(0);
        let collected = (total - note_value).max(0);

        if collected > 0 {
            validation::validate_allocations(&request.allocations, collected)?;
        } else if !request.allocations.is_empty() {
            return Err(ValidationError::AllocationMismatch {
                expected_cents: 0,
                allocated_cents: request.allocations.iter().map(|a| a.amount_cents).sum(),
            }
            .into());
        }

        // Stock first; a refusal here leaves everything untouched.
        let actions = StockAction::decrements_for_cart(&request.lines);
        self.apply_stock(&actions).await?;

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            total_cents: total,
            line_total_cents: line_total,
            notes: request.notes.clone(),
            created_at: now,
        };
        let movement = (collected > 0).then(|| Movement {
            id: Uuid::new_v4().to_string(),
            session_id,
            kind: MovementKind::Sale,
            gross_amount_cents: collected,
            reference: Some(sale.id.clone()),
            description: None,
            created_at: now,
            allocations: request.allocations.clone(),
        });

        let committed = self
            .commit_checkout(&sale, &request, movement.as_ref(), note.as_ref())
            .await;

        match committed {
            Ok(redeemed_credit_note) => {
                info!(
                    sale_id = %sale.id,
                    total_cents = total,
                    collected_cents = collected,
                    credit_note = redeemed_credit_note.as_ref().map(|n| n.code.as_str()),
                    "Checkout committed"
                );
                Ok(CheckoutOutcome {
                    sale,
                    movement,
                    redeemed_credit_note,
                    replayed: false,
                })
            }
            Err(err) => {
                self.revert_stock(&actions).await;
                Err(err)
            }
        }
    }

    /// The monetary half of checkout, in one transaction.
    async fn commit_checkout(
        &self,
        sale: &Sale,
        request: &CheckoutRequest,
        movement: Option<&Movement>,
        note: Option<&CreditNote>,
    ) -> EngineResult<Option<CreditNote>> {
        let mut tx: Transaction<'_, Sqlite> = self.pool().begin().await.map_err(DbError::from)?;

        sale_repo::insert_sale(&mut tx, sale, request.idempotency_key.as_deref()).await?;
        sale_repo::insert_sale_items(&mut tx, &sale.id, &request.lines).await?;

        if let Some(movement) = movement {
            session_repo::insert_movement(&mut tx, movement).await?;
        }

        let redeemed = match note {
            Some(note) => {
                // Conditional on Active: a racing redemption elsewhere makes
                // this touch zero rows and the whole sale rolls back.
                let rows =
                    note_repo::redeem_active(&mut tx, &note.id, sale.created_at, Some(&sale.id))
                        .await?;
                if rows == 0 {
                    return Err(EngineError::invalid_state(format!(
                        "credit note {} is already redeemed",
                        note.code
                    )));
                }
                Some(CreditNote {
                    status: CreditNoteStatus::Redeemed,
                    redeemed_at: Some(sale.created_at),
                    redeemed_sale_id: Some(sale.id.clone()),
                    ..note.clone()
                })
            }
            None => None,
        };

        tx.commit().await.map_err(DbError::from)?;
        Ok(redeemed)
    }

    /// Books a reservation: holds stock per line, records the deposit (seña)
    /// as a ReservationDeposit movement when one is taken.
    ///
    /// Every line must reference a catalog variant (a reservation with
    /// nothing to hold is meaningless). A zero-deposit booking is a pure
    /// hold and needs no open session; a deposit is drawer money and does.
    pub async fn create_reservation(
        &self,
        till_id: &str,
        request: ReservationRequest,
    ) -> EngineResult<Reservation> {
        validation::validate_till_id(till_id)?;
        validation::validate_client_name(&request.client_name)?;
        validation::validate_cart(&request.lines)?;
        for line in &request.lines {
            if line.variant_id.is_none() {
                return Err(ValidationError::Required {
                    field: "variant_id".to_string(),
                }
                .into());
            }
        }

        let line_total = cart_lines_total_cents(&request.lines);
        let total = request.total_cents.unwrap_or(line_total);
        validation::validate_deposit(request.deposit_cents, total, request.deposit_method_id)?;

        let _guard = self.lock_till(till_id).await;

        let session_id = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            if let Some(method_id) = request.deposit_method_id {
                payment_method::get_method(&mut conn, method_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::not_found("payment method", method_id.to_string())
                    })?;
            }

            if request.deposit_cents > 0 {
                let session = session_repo::find_open_session(&mut conn, till_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::invalid_state(format!(
                            "no open session for till '{till_id}' to take the deposit"
                        ))
                    })?;
                Some(session.id)
            } else {
                None
            }
        };

        let actions: Vec<StockAction> = request
            .lines
            .iter()
            .filter_map(|line| {
                line.variant_id
                    .as_deref()
                    .map(|v| StockAction::new(StockOp::Hold, v, line.quantity))
            })
            .collect();
        self.apply_stock(&actions).await?;

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            client_name: request.client_name.trim().to_string(),
            client_phone: request.client_phone.clone(),
            total_cents: total,
            deposit_cents: request.deposit_cents,
            deposit_method_id: request.deposit_method_id,
            status: ReservationStatus::Pending,
            created_at: now,
            due_at: request.due_at,
        };

        let committed: EngineResult<()> = async {
            let mut tx = self.pool().begin().await.map_err(DbError::from)?;

            reservation_repo::insert_reservation(&mut tx, &reservation).await?;
            reservation_repo::insert_reservation_items(&mut tx, &reservation.id, &request.lines)
                .await?;

            if let (Some(session_id), Some(method_id)) = (session_id, request.deposit_method_id) {
                let movement = Movement {
                    id: Uuid::new_v4().to_string(),
                    session_id,
                    kind: MovementKind::ReservationDeposit,
                    gross_amount_cents: reservation.deposit_cents,
                    reference: Some(reservation.id.clone()),
                    description: None,
                    created_at: now,
                    allocations: vec![PaymentAllocation::new(
                        method_id,
                        reservation.deposit_cents,
                    )],
                };
                session_repo::insert_movement(&mut tx, &movement).await?;
            }

            tx.commit().await.map_err(DbError::from)?;
            Ok(())
        }
        .await;

        if let Err(err) = committed {
            self.revert_stock(&actions).await;
            return Err(err);
        }

        info!(
            reservation_id = %reservation.id,
            client = %reservation.client_name,
            total_cents = total,
            deposit_cents = reservation.deposit_cents,
            "Reservation created"
        );

        Ok(reservation)
    }

    /// Picks up a pending reservation: collects the balance (saldo = total −
    /// deposit), converts the stock holds into decrements and marks it
    /// PickedUp.
    ///
    /// ## Errors
    /// - NotFound: unknown reservation
    /// - InvalidState: reservation not pending; no open session when a
    ///   balance is owed
    /// - Validation: balance > 0 with no method given
    pub async fn pickup_reservation(
        &self,
        till_id: &str,
        reservation_id: &str,
        balance_method_id: Option<i64>,
    ) -> EngineResult<PickupOutcome> {
        validation::validate_till_id(till_id)?;

        let _guard = self.lock_till(till_id).await;

        let (reservation, items, session_id) = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let reservation = reservation_repo::get_reservation(&mut conn, reservation_id)
                .await?
                .ok_or_else(|| EngineError::not_found("reservation", reservation_id))?;

            if reservation.status != ReservationStatus::Pending {
                return Err(EngineError::invalid_state(format!(
                    "reservation {} is not pending",
                    reservation.id
                )));
            }

            let balance = reservation.balance_cents();
            let session_id = if balance > 0 {
                let method_id = balance_method_id.ok_or(ValidationError::PaymentMethodRequired {
                    reason: "a balance is owed at pickup".to_string(),
                })?;
                payment_method::get_method(&mut conn, method_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::not_found("payment method", method_id.to_string())
                    })?;

                let session = session_repo::find_open_session(&mut conn, till_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::invalid_state(format!(
                            "no open session for till '{till_id}' to collect the balance"
                        ))
                    })?;
                Some(session.id)
            } else {
                None
            };

            let items = reservation_repo::list_reservation_items(&mut conn, &reservation.id)
                .await?;

            (reservation, items, session_id)
        };

        // Decrements consume the holds taken at booking.
        let actions: Vec<StockAction> = items
            .iter()
            .map(|item| StockAction::new(StockOp::Decrement, &item.variant_id, item.quantity))
            .collect();
        self.apply_stock(&actions).await?;

        let balance = reservation.balance_cents();
        let now = Utc::now();
        let movement = match (session_id, balance_method_id) {
            (Some(session_id), Some(method_id)) if balance > 0 => Some(Movement {
                id: Uuid::new_v4().to_string(),
                session_id,
                kind: MovementKind::ReservationPickup,
                gross_amount_cents: balance,
                reference: Some(reservation.id.clone()),
                description: None,
                created_at: now,
                allocations: vec![PaymentAllocation::new(method_id, balance)],
            }),
            _ => None,
        };

        let committed: EngineResult<()> = async {
            let mut tx = self.pool().begin().await.map_err(DbError::from)?;

            let rows = reservation_repo::transition_pending(
                &mut tx,
                &reservation.id,
                ReservationStatus::PickedUp,
            )
            .await?;
            if rows == 0 {
                return Err(EngineError::invalid_state(format!(
                    "reservation {} is not pending",
                    reservation.id
                )));
            }

            if let Some(movement) = &movement {
                session_repo::insert_movement(&mut tx, movement).await?;
            }

            tx.commit().await.map_err(DbError::from)?;
            Ok(())
        }
        .await;

        if let Err(err) = committed {
            // A plain increment would return the units to free stock; the
            // reservation is still pending, so restore the hold as well.
            for item in &items {
                if let Err(e) = self
                    .catalog_call(self.catalog.increment_stock(&item.variant_id, item.quantity))
                    .await
                {
                    warn!(variant_id = %item.variant_id, error = %e, "Pickup compensation: increment failed");
                    continue;
                }
                if let Err(e) = self
                    .catalog_call(self.catalog.hold_stock(&item.variant_id, item.quantity))
                    .await
                {
                    warn!(variant_id = %item.variant_id, error = %e, "Pickup compensation: re-hold failed");
                }
            }
            return Err(err);
        }

        info!(
            reservation_id = %reservation.id,
            balance_cents = balance,
            "Reservation picked up"
        );

        Ok(PickupOutcome {
            reservation: Reservation {
                status: ReservationStatus::PickedUp,
                ..reservation
            },
            movement,
        })
    }

    /// Cancels a pending reservation: releases the stock holds and marks it
    /// Cancelled. The deposit is forfeited; no refund movement is posted.
    pub async fn cancel_reservation(&self, reservation_id: &str) -> EngineResult<Reservation> {
        let (reservation, items) = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let reservation = reservation_repo::get_reservation(&mut conn, reservation_id)
                .await?
                .ok_or_else(|| EngineError::not_found("reservation", reservation_id))?;

            if reservation.status != ReservationStatus::Pending {
                return Err(EngineError::invalid_state(format!(
                    "reservation {} is not pending",
                    reservation.id
                )));
            }

            let items = reservation_repo::list_reservation_items(&mut conn, &reservation.id)
                .await?;

            (reservation, items)
        };

        let actions: Vec<StockAction> = items
            .iter()
            .map(|item| StockAction::new(StockOp::ReleaseHold, &item.variant_id, item.quantity))
            .collect();
        self.apply_stock(&actions).await?;

        let committed: EngineResult<()> = async {
            let mut tx = self.pool().begin().await.map_err(DbError::from)?;
            let rows = reservation_repo::transition_pending(
                &mut tx,
                &reservation.id,
                ReservationStatus::Cancelled,
            )
            .await?;
            if rows == 0 {
                // Raced a pickup on another path; the holds we released
                // belong to it now.
                return Err(EngineError::invalid_state(format!(
                    "reservation {} is not pending",
                    reservation.id
                )));
            }
            tx.commit().await.map_err(DbError::from)?;
            Ok(())
        }
        .await;

        if let Err(err) = committed {
            self.revert_stock(&actions).await;
            return Err(err);
        }

        info!(
            reservation_id = %reservation.id,
            forfeited_deposit_cents = reservation.deposit_cents,
            "Reservation cancelled"
        );

        Ok(Reservation {
            status: ReservationStatus::Cancelled,
            ..reservation
        })
    }

    /// Reservations newest first, each with its derived overdue flag
    /// (pending and past due; flagged for the operator, never
    /// auto-cancelled).
    pub async fn list_reservations(
        &self,
        status: Option<ReservationStatus>,
        limit: i64,
    ) -> EngineResult<Vec<ReservationListing>> {
        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        let reservations =
            reservation_repo::list_reservations(&mut conn, status, limit.max(1)).await?;

        let now = Utc::now();
        Ok(reservations
            .into_iter()
            .map(|reservation| ReservationListing {
                overdue: reservation.is_overdue(now),
                reservation,
            })
            .collect())
    }
}
