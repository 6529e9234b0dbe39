//! # RegisterEngine Command Surface
//!
//! The transactional core. One `RegisterEngine` per process owns the pool,
//! the stock collaborator and the per-till locks; commands are grouped by
//! concern across submodules:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RegisterEngine                                   │
//! │                                                                         │
//! │  session.rs      open_session / session_status / record_withdrawal     │
//! │                  close_session / list_closed_sessions                   │
//! │  checkout.rs     checkout / create_reservation / pickup_reservation    │
//! │                  cancel_reservation / list_reservations                 │
//! │  exchange.rs     process_exchange                                       │
//! │  credit_note.rs  issue / redeem / lookup / list credit notes           │
//! │                                                                         │
//! │  Every mutating command:                                                │
//! │    1. validates input (pure, caja-core)                                 │
//! │    2. acquires the till lock                                            │
//! │    3. mutates stock through the catalog (all-or-nothing)                │
//! │    4. commits the monetary effect in ONE SQLite transaction             │
//! │    5. on commit failure, compensates the stock mutations                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads (status, listings, lookups) skip the lock and run on any pool
//! connection.

mod checkout;
mod credit_note;
mod exchange;
mod session;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use caja_core::{
    CartLine, CreditNote, ExchangeItem, ExchangeTransaction, MethodTotal, Movement,
    PaymentAllocation, RegisterSession, Reservation, Sale,
};

use crate::catalog::{CatalogResult, StockCatalog};
use crate::error::{EngineError, EngineResult};
use crate::locks::TillLocks;
use crate::pool::Database;

/// Default ceiling on a single stock catalog call.
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Engine
// =============================================================================

/// The register session & reconciliation engine.
///
/// Cheap to share behind an `Arc`; all state lives in the pool, the catalog
/// and the lock table.
pub struct RegisterEngine {
    db: Database,
    catalog: Arc<dyn StockCatalog>,
    locks: TillLocks,
    catalog_timeout: Duration,
}

impl RegisterEngine {
    pub fn new(db: Database, catalog: Arc<dyn StockCatalog>) -> Self {
        RegisterEngine {
            db,
            catalog,
            locks: TillLocks::new(),
            catalog_timeout: DEFAULT_CATALOG_TIMEOUT,
        }
    }

    /// Overrides the per-call catalog timeout.
    pub fn with_catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = timeout;
        self
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }

    pub(crate) async fn lock_till(&self, till_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.locks.acquire(till_id).await
    }
}

// =============================================================================
// Stock Actions
// =============================================================================

/// One catalog mutation within a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StockOp {
    Decrement,
    Hold,
    ReleaseHold,
    Increment,
}

impl StockOp {
    /// The op that undoes this one.
    fn inverse(self) -> StockOp {
        match self {
            StockOp::Decrement => StockOp::Increment,
            StockOp::Increment => StockOp::Decrement,
            StockOp::Hold => StockOp::ReleaseHold,
            StockOp::ReleaseHold => StockOp::Hold,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StockAction {
    pub variant_id: String,
    pub qty: i64,
    pub op: StockOp,
}

impl StockAction {
    pub fn new(op: StockOp, variant_id: &str, qty: i64) -> Self {
        StockAction {
            variant_id: variant_id.to_string(),
            qty,
            op,
        }
    }

    /// Decrement actions for the stock-bearing lines of a cart.
    pub fn decrements_for_cart(lines: &[CartLine]) -> Vec<StockAction> {
        lines
            .iter()
            .filter_map(|line| {
                line.variant_id
                    .as_deref()
                    .map(|v| StockAction::new(StockOp::Decrement, v, line.quantity))
            })
            .collect()
    }

    /// One action per exchange item, all with the same op.
    pub fn for_exchange_items(op: StockOp, items: &[ExchangeItem]) -> Vec<StockAction> {
        items
            .iter()
            .map(|item| StockAction::new(op, &item.variant_id, item.quantity))
            .collect()
    }
}

impl RegisterEngine {
    /// Dispatches one catalog call under the configured timeout.
    pub(crate) async fn stock_call(&self, action: &StockAction) -> EngineResult<()> {
        let fut = async {
            match action.op {
                StockOp::Decrement => {
                    self.catalog
                        .decrement_stock(&action.variant_id, action.qty)
                        .await
                }
                StockOp::Hold => self.catalog.hold_stock(&action.variant_id, action.qty).await,
                StockOp::ReleaseHold => {
                    self.catalog
                        .release_hold(&action.variant_id, action.qty)
                        .await
                }
                StockOp::Increment => {
                    self.catalog
                        .increment_stock(&action.variant_id, action.qty)
                        .await
                }
            }
        };

        match tokio::time::timeout(self.catalog_timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::dependency("stock catalog call timed out")),
        }
    }

    /// Applies a list of stock actions as a unit.
    ///
    /// If any call fails, the already-applied prefix is reverted (best
    /// effort) and the failure is returned: the catalog ends up unchanged or
    /// fully mutated, never partially.
    pub(crate) async fn apply_stock(&self, actions: &[StockAction]) -> EngineResult<()> {
        for (index, action) in actions.iter().enumerate() {
            if let Err(err) = self.stock_call(action).await {
                self.revert_stock(&actions[..index]).await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Best-effort inverse of already-applied actions, in reverse order.
    ///
    /// Failures here are logged, not returned: the monetary state is already
    /// decided and a stuck catalog must not mask the original error.
    pub(crate) async fn revert_stock(&self, applied: &[StockAction]) {
        for action in applied.iter().rev() {
            let inverse = StockAction::new(action.op.inverse(), &action.variant_id, action.qty);
            if let Err(err) = self.stock_call(&inverse).await {
                warn!(
                    variant_id = %inverse.variant_id,
                    qty = inverse.qty,
                    op = ?inverse.op,
                    error = %err,
                    "Stock compensation failed; catalog needs manual correction"
                );
            }
        }
    }

    /// Raw catalog call used by compensation paths that are not simple
    /// inverses (reservation pickup restores the hold in two steps).
    pub(crate) async fn catalog_call<F>(&self, fut: F) -> EngineResult<()>
    where
        F: std::future::Future<Output = CatalogResult<()>>,
    {
        match tokio::time::timeout(self.catalog_timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::dependency("stock catalog call timed out")),
        }
    }
}

// =============================================================================
// Command Payloads
// =============================================================================

/// Input to [`RegisterEngine::checkout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,

    /// Operator override of the total. `None` charges the naive line sum;
    /// an override is accepted as-is and persisted next to the line sum.
    pub total_cents: Option<i64>,

    /// Payment split for the amount actually collected (total minus any
    /// applied credit note). Must be empty when the note covers everything.
    pub allocations: Vec<PaymentAllocation>,

    /// Credit note to apply, by code.
    pub credit_note_code: Option<String>,

    pub notes: Option<String>,

    /// Caller-supplied replay key. Retrying with the same key returns the
    /// already-committed sale instead of charging twice.
    pub idempotency_key: Option<String>,
}

/// Result of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    pub sale: Sale,
    /// The Sale movement; `None` when an applied credit note covered the
    /// entire total (no money changed hands).
    pub movement: Option<Movement>,
    /// The note consumed by this checkout, in its redeemed state.
    pub redeemed_credit_note: Option<CreditNote>,
    /// True when this response was replayed from the idempotency key.
    pub replayed: bool,
}

/// Input to [`RegisterEngine::create_reservation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub client_name: String,
    pub client_phone: Option<String>,

    /// Lines to hold. Every line must reference a catalog variant.
    pub lines: Vec<CartLine>,

    /// Agreed total. `None` uses the naive line sum.
    pub total_cents: Option<i64>,

    /// Deposit (seña) taken now. Zero makes a pure hold.
    pub deposit_cents: i64,
    pub deposit_method_id: Option<i64>,

    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A reservation plus its derived overdue flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationListing {
    pub reservation: Reservation,
    pub overdue: bool,
}

/// Result of a reservation pickup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupOutcome {
    pub reservation: Reservation,
    /// The ReservationPickup movement; `None` when the deposit already
    /// covered the full total.
    pub movement: Option<Movement>,
}

/// Input to [`RegisterEngine::process_exchange`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Returned by the customer, priced at their original sale price.
    pub items_in: Vec<ExchangeItem>,
    /// Taken by the customer, priced at current catalog price.
    pub items_out: Vec<ExchangeItem>,

    /// Method for the extra payment when the balance is positive.
    pub payment_method_id: Option<i64>,

    pub observations: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Result of an exchange: exactly one of `movement` / `credit_note` is set,
/// or neither when the exchange was even.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    pub exchange: ExchangeTransaction,
    pub movement: Option<Movement>,
    pub credit_note: Option<CreditNote>,
    pub replayed: bool,
}

/// Live view of a till, derived entirely by ledger replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TillStatus {
    /// The open session, if any. All remaining fields are zero/empty when
    /// this is `None`.
    pub session: Option<RegisterSession>,
    pub method_totals: Vec<MethodTotal>,
    /// Cash that should be in the drawer right now.
    pub expected_cash_cents: i64,
    /// Gross of all money-in movements so far.
    pub gross_sales_cents: i64,
    /// Withdrawal movements posted this session.
    pub withdrawals: Vec<Movement>,
}
