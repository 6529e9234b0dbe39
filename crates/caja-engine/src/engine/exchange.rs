//! # Exchange Engine
//!
//! Returned merchandise netted against newly taken merchandise, resolved in
//! one atomic operation.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  balance = Σ items_out − Σ items_in                                     │
//! │                                                                         │
//! │  balance > 0   customer owes the store                                  │
//! │                └── ExchangeAdjustment movement for the difference       │
//! │  balance < 0   store owes the customer                                  │
//! │                └── Active credit note minted for −balance (no cash      │
//! │                    refund, no movement)                                 │
//! │  balance == 0  even swap, no monetary effect                            │
//! │                                                                         │
//! │  Exactly one resolution per exchange, decided by the sign alone.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock (restock items_in, destock items_out) and the monetary resolution
//! commit as a unit: a failure anywhere compensates whatever was applied.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use caja_core::{
    exchange_balance_cents, resolution_for_balance, validation, ExchangeDirection, ExchangeItem,
    ExchangeResolution, ExchangeTransaction, Movement, MovementKind, PaymentAllocation,
    ValidationError,
};

use crate::error::{DbError, EngineError, EngineResult};
use crate::repository::{
    credit_note as note_repo, exchange as exchange_repo, payment_method, session as session_repo,
};

use super::credit_note::insert_note_with_unique_code;
use super::{ExchangeOutcome, ExchangeRequest, RegisterEngine, StockAction, StockOp};

fn validate_exchange_items(items: &[ExchangeItem]) -> Result<(), ValidationError> {
    for item in items {
        if item.variant_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "variant_id".to_string(),
            });
        }
        if item.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "item name".to_string(),
            });
        }
        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        if item.unit_price_cents < 0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "unit_price".to_string(),
            });
        }
    }
    Ok(())
}

impl RegisterEngine {
    /// Processes an exchange against the till's open session.
    ///
    /// ## Errors
    /// - Validation: no items at all, bad item fields, positive balance
    ///   without a payment method
    /// - InvalidState: no open session for the till
    /// - NotFound: unknown payment method
    /// - InsufficientStock / Dependency: catalog refused or failed
    pub async fn process_exchange(
        &self,
        till_id: &str,
        request: ExchangeRequest,
    ) -> EngineResult<ExchangeOutcome> {
        validation::validate_till_id(till_id)?;
        if request.items_in.is_empty() && request.items_out.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        validate_exchange_items(&request.items_in)?;
        validate_exchange_items(&request.items_out)?;

        let _guard = self.lock_till(till_id).await;

        // Replay path.
        if let Some(key) = request.idempotency_key.as_deref() {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
            if let Some(exchange) = exchange_repo::find_by_idempotency_key(&mut conn, key).await? {
                debug!(key, exchange_id = %exchange.id, "Exchange replayed from idempotency key");
                let movement = match exchange.movement_id.as_deref() {
                    Some(id) => session_repo::get_movement(&mut conn, id).await?,
                    None => None,
                };
                let credit_note = match exchange.credit_note_id.as_deref() {
                    Some(id) => note_repo::get_credit_note(&mut conn, id).await?,
                    None => None,
                };
                return Ok(ExchangeOutcome {
                    exchange,
                    movement,
                    credit_note,
                    replayed: true,
                });
            }
        }

        let balance = exchange_balance_cents(&request.items_in, &request.items_out);
        let resolution = resolution_for_balance(balance);

        let (session_id, payment_method_id) = {
            let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

            let session = session_repo::find_open_session(&mut conn, till_id)
                .await?
                .ok_or_else(|| {
                    EngineError::invalid_state(format!("no open session for till '{till_id}'"))
                })?;

            let method_id = if resolution == ExchangeResolution::ExtraPayment {
                let method_id =
                    request
                        .payment_method_id
                        .ok_or(ValidationError::PaymentMethodRequired {
                            reason: "the exchange balance is positive".to_string(),
                        })?;
                payment_method::get_method(&mut conn, method_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::not_found("payment method", method_id.to_string())
                    })?;
                Some(method_id)
            } else {
                None
            };

            (session.id, method_id)
        };

        // Stock: restock what came back, destock what goes out, as one unit.
        let mut actions = StockAction::for_exchange_items(StockOp::Increment, &request.items_in);
        actions.extend(StockAction::for_exchange_items(
            StockOp::Decrement,
            &request.items_out,
        ));
        self.apply_stock(&actions).await?;

        let now = Utc::now();
        let exchange_id = Uuid::new_v4().to_string();

        let movement = match payment_method_id {
            Some(method_id) => Some(Movement {
                id: Uuid::new_v4().to_string(),
                session_id,
                kind: MovementKind::ExchangeAdjustment,
                gross_amount_cents: balance,
                reference: Some(exchange_id.clone()),
                description: None,
                created_at: now,
                allocations: vec![PaymentAllocation::new(method_id, balance)],
            }),
            None => None,
        };

        let committed: EngineResult<Option<caja_core::CreditNote>> = async {
            let mut tx = self.pool().begin().await.map_err(DbError::from)?;

            let credit_note = if resolution == ExchangeResolution::CreditNote {
                Some(
                    insert_note_with_unique_code(
                        &mut tx,
                        -balance,
                        request.observations.clone(),
                        None,
                    )
                    .await?,
                )
            } else {
                None
            };

            if let Some(movement) = &movement {
                session_repo::insert_movement(&mut tx, movement).await?;
            }

            let exchange = ExchangeTransaction {
                id: exchange_id.clone(),
                balance_cents: balance,
                resolution,
                movement_id: movement.as_ref().map(|m| m.id.clone()),
                credit_note_id: credit_note.as_ref().map(|n| n.id.clone()),
                created_at: now,
            };
            exchange_repo::insert_exchange(&mut tx, &exchange, request.idempotency_key.as_deref())
                .await?;
            exchange_repo::insert_exchange_items(
                &mut tx,
                &exchange.id,
                ExchangeDirection::In,
                &request.items_in,
            )
            .await?;
            exchange_repo::insert_exchange_items(
                &mut tx,
                &exchange.id,
                ExchangeDirection::Out,
                &request.items_out,
            )
            .await?;

            tx.commit().await.map_err(DbError::from)?;
            Ok(credit_note)
        }
        .await;

        let credit_note = match committed {
            Ok(credit_note) => credit_note,
            Err(err) => {
                self.revert_stock(&actions).await;
                return Err(err);
            }
        };

        info!(
            exchange_id = %exchange_id,
            balance_cents = balance,
            resolution = ?resolution,
            credit_note = credit_note.as_ref().map(|n| n.code.as_str()),
            "Exchange processed"
        );

        Ok(ExchangeOutcome {
            exchange: ExchangeTransaction {
                id: exchange_id,
                balance_cents: balance,
                resolution,
                movement_id: movement.as_ref().map(|m| m.id.clone()),
                credit_note_id: credit_note.as_ref().map(|n| n.id.clone()),
                created_at: now,
            },
            movement,
            credit_note,
            replayed: false,
        })
    }
}
