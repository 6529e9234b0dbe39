//! # Domain Types
//!
//! Core domain types used throughout the Caja register engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ RegisterSession │   │    Movement     │   │PaymentAllocation│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  method_id      │       │
//! │  │  till_id        │   │  session_id(FK) │   │  amount_cents   │       │
//! │  │  status         │   │  kind           │   └─────────────────┘       │
//! │  │  opening_float  │   │  allocations    │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Reservation   │   │ExchangeTransact.│   │   CreditNote    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  client, items  │   │  balance_cents  │   │  code (unique)  │       │
//! │  │  deposit (seña) │   │  resolution     │   │  amount, status │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business key where one exists (credit note `code`, till id)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Payment Methods
// =============================================================================

/// Broad classification of a payment method.
///
/// The engine only ever branches on `Cash` (drawer reconciliation); the
/// remaining kinds exist so reports can group methods without string
/// matching on names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Physical cash. The only kind that affects the drawer count.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Bank transfer.
    Transfer,
    /// Marketplace settlement (e.g. the store's online channel).
    Marketplace,
    /// Anything else (gift arrangements, barters, ...).
    Other,
}

/// An accepted payment method, referenced by id from allocations.
///
/// The registry is static per deployment: rows are seeded by migration and
/// toggled with `is_active`, never deleted (movements reference them).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethod {
    pub id: i64,
    /// Display name, e.g. "Efectivo", "Tarjeta".
    pub name: String,
    pub kind: MethodKind,
    pub is_active: bool,
}

impl PaymentMethod {
    /// Whether allocations to this method move physical cash.
    #[inline]
    pub fn is_cash(&self) -> bool {
        self.kind == MethodKind::Cash
    }
}

// =============================================================================
// Payment Allocation
// =============================================================================

/// A (payment method, amount) pair within a Movement.
///
/// ## Invariants
/// - `amount_cents > 0` for money-in movements
/// - a withdrawal carries exactly one cash allocation with a negative amount
/// - each method appears at most once per movement (mixed payment is a set,
///   not a list of repeats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentAllocation {
    pub method_id: i64,
    pub amount_cents: i64,
}

impl PaymentAllocation {
    pub fn new(method_id: i64, amount_cents: i64) -> Self {
        PaymentAllocation {
            method_id,
            amount_cents,
        }
    }

    /// Returns the allocated amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Register Session
// =============================================================================

/// The lifecycle state of a register session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting movements. At most one open session per till.
    Open,
    /// Closed and reconciled. Terminal, immutable.
    Closed,
}

/// One accounting period for a single till.
///
/// Created by `open`, mutated only by appending movements, terminated by
/// `close` which freezes the computed totals onto the row. The reconciliation
/// columns (`counted_cash_cents` and friends) are NULL while the session is
/// open.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RegisterSession {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Physical till this session belongs to.
    pub till_id: String,

    pub status: SessionStatus,

    /// Cash placed in the drawer at open.
    pub opening_float_cents: i64,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Physical cash count entered at close.
    pub counted_cash_cents: Option<i64>,

    /// opening_float + Σcash in − Σcash withdrawals, frozen at close.
    pub expected_cash_cents: Option<i64>,

    /// counted − expected, frozen at close. Negative means the drawer is short.
    pub difference_cents: Option<i64>,

    /// Gross amount of all money-in movements, frozen at close.
    pub total_sales_cents: Option<i64>,
}

impl RegisterSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Returns the opening float as Money.
    #[inline]
    pub fn opening_float(&self) -> Money {
        Money::from_cents(self.opening_float_cents)
    }
}

// =============================================================================
// Movements
// =============================================================================

/// What kind of money-moving event a Movement records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// A committed checkout.
    Sale,
    /// Partial payment (seña) taken when booking a reservation.
    ReservationDeposit,
    /// Remaining balance paid when a reservation is picked up.
    ReservationPickup,
    /// Cash taken out of the drawer (expense, bank run).
    Withdrawal,
    /// Extra payment collected when an exchange balance is positive.
    ExchangeAdjustment,
}

impl MovementKind {
    /// Whether this kind brings money into the session.
    ///
    /// Withdrawals are the only money-out kind; they carry a single negative
    /// cash allocation instead.
    #[inline]
    pub fn is_money_in(&self) -> bool {
        !matches!(self, MovementKind::Withdrawal)
    }
}

/// An immutable, append-only monetary event posted to a session.
///
/// Movements are created only by the checkout/reservation/exchange
/// processors and the withdrawal command. They are never edited, so session
/// state is always derivable by replay (see [`crate::ledger`]).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Movement {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub session_id: String,

    pub kind: MovementKind,

    /// Total monetary effect. Equals the allocation sum for money-in kinds;
    /// negative for withdrawals.
    pub gross_amount_cents: i64,

    /// Id of the sale / reservation / exchange that produced this movement.
    pub reference: Option<String>,

    /// Operator-entered note (withdrawals: what the cash left for).
    pub description: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// How the gross amount splits across payment methods.
    pub allocations: Vec<PaymentAllocation>,
}

impl Movement {
    /// Returns the gross amount as Money.
    #[inline]
    pub fn gross_amount(&self) -> Money {
        Money::from_cents(self.gross_amount_cents)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A line in a checkout or reservation cart.
///
/// Prices are snapshots taken by the caller at the moment of the operation;
/// the engine never re-reads catalog prices.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Catalog variant this line sells. `None` for manual/custom items that
    /// carry no stock.
    pub variant_id: Option<String>,
    /// SKU at time of operation (frozen).
    pub sku: Option<String>,
    /// Display name at time of operation (frozen).
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl CartLine {
    /// unit price × quantity.
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents())
    }
}

/// Sum of naive line totals, before any operator override of the total.
pub fn cart_lines_total_cents(lines: &[CartLine]) -> i64 {
    lines.iter().map(|l| l.line_total_cents()).sum()
}

// =============================================================================
// Sales
// =============================================================================

/// A committed sale. The monetary effect lives in the Sale movement that
/// references this record; this is the receipt-facing snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub session_id: String,
    /// Total actually charged. May differ from `line_total_cents` when the
    /// operator overrode the total (manual discount); the override is
    /// accepted as-is, never recomputed.
    pub total_cents: i64,
    /// Naive sum of line subtotals at commit time.
    pub line_total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line item in a committed sale (snapshot pattern: product details are
/// frozen at time of sale).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub variant_id: Option<String>,
    pub sku_snapshot: Option<String>,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Reservations
// =============================================================================

/// The lifecycle state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Stock is held, waiting for pickup.
    Pending,
    /// Balance paid, stock converted to a sale.
    PickedUp,
    /// Hold released. The deposit is forfeited (business policy).
    Cancelled,
}

/// A stock hold plus partial payment (seña) against a future pickup.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Reservation {
    pub id: String,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub total_cents: i64,
    /// Deposit taken at booking. Zero is allowed (pure hold).
    pub deposit_cents: i64,
    /// Method the deposit was paid with; `None` when deposit is zero.
    pub deposit_method_id: Option<i64>,
    pub status: ReservationStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub due_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Remaining balance owed at pickup (saldo).
    #[inline]
    pub fn balance_cents(&self) -> i64 {
        self.total_cents - self.deposit_cents
    }

    /// Derived, non-persistent flag: pending and past its due date.
    ///
    /// Overdue reservations are flagged for the operator, never
    /// auto-cancelled.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending
            && self.due_at.map(|due| now > due).unwrap_or(false)
    }
}

/// An item held by a reservation (snapshot of sku/qty/price at booking).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReservationItem {
    pub id: String,
    pub reservation_id: String,
    pub variant_id: String,
    pub sku_snapshot: Option<String>,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

// =============================================================================
// Exchanges
// =============================================================================

/// Which way an exchange item moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeDirection {
    /// Returned by the customer; restocked.
    In,
    /// Taken by the customer; destocked.
    Out,
}

/// How an exchange balance was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeResolution {
    /// balance < 0: the store owes the customer; a credit note was minted.
    CreditNote,
    /// balance > 0: the customer paid the difference.
    ExtraPayment,
    /// balance == 0: nothing owed either way.
    Even,
}

/// One item moving through an exchange.
///
/// Items in are priced at their original sale price (supplied by the
/// caller); items out at current catalog price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeItem {
    pub variant_id: String,
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl ExchangeItem {
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

/// A committed exchange: returned merchandise netted against newly taken
/// merchandise, created and resolved in one atomic step.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExchangeTransaction {
    pub id: String,
    /// Σitems_out − Σitems_in. Sign decides the resolution.
    pub balance_cents: i64,
    pub resolution: ExchangeResolution,
    /// Movement posted when resolution is ExtraPayment.
    pub movement_id: Option<String>,
    /// Credit note minted when resolution is CreditNote.
    pub credit_note_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Computes the signed exchange balance: Σitems_out − Σitems_in.
pub fn exchange_balance_cents(items_in: &[ExchangeItem], items_out: &[ExchangeItem]) -> i64 {
    let total_in: i64 = items_in.iter().map(|i| i.line_total_cents()).sum();
    let total_out: i64 = items_out.iter().map(|i| i.line_total_cents()).sum();
    total_out - total_in
}

/// Maps a balance sign to its resolution.
pub fn resolution_for_balance(balance_cents: i64) -> ExchangeResolution {
    match balance_cents {
        b if b > 0 => ExchangeResolution::ExtraPayment,
        b if b < 0 => ExchangeResolution::CreditNote,
        _ => ExchangeResolution::Even,
    }
}

// =============================================================================
// Credit Notes
// =============================================================================

/// The lifecycle state of a credit note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    /// Issued and spendable.
    Active,
    /// Consumed by a sale. Terminal.
    Redeemed,
}

/// A single-use, fixed-amount store-credit instrument.
///
/// ## Invariants
/// - `code` is globally unique and immutable
/// - `amount_cents` is fixed at issuance
/// - status transitions only Active → Redeemed, once, atomically with the
///   redeeming sale
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditNote {
    pub id: String,
    /// Human-enterable code, e.g. "NC-7F3A21B9".
    pub code: String,
    pub amount_cents: i64,
    pub status: CreditNoteStatus,
    pub observations: Option<String>,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub redeemed_at: Option<DateTime<Utc>>,
    /// Sale the note was applied to, set on redemption.
    pub redeemed_sale_id: Option<String>,
}

impl CreditNote {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == CreditNoteStatus::Active
    }

    /// Returns the fixed note value as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Net total accumulated for one payment method within a session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method_id: i64,
    pub method_name: String,
    pub total_cents: i64,
}

/// The close-time comparison of expected vs physically counted cash.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationSummary {
    pub session_id: String,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: i64,
    /// counted − expected. Negative means the drawer is short.
    pub difference_cents: i64,
    /// Gross of all money-in movements across all methods.
    pub total_sales_cents: i64,
    pub method_totals: Vec<MethodTotal>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cart_line_total() {
        let line = CartLine {
            variant_id: Some("v1".to_string()),
            sku: Some("REMERA-M".to_string()),
            name: "Remera Negra M".to_string(),
            quantity: 3,
            unit_price_cents: 250000,
        };
        assert_eq!(line.line_total_cents(), 750000);
    }

    #[test]
    fn test_reservation_balance_and_overdue() {
        let now = Utc::now();
        let res = Reservation {
            id: "r1".to_string(),
            client_name: "Ana".to_string(),
            client_phone: None,
            total_cents: 100000,
            deposit_cents: 30000,
            deposit_method_id: Some(1),
            status: ReservationStatus::Pending,
            created_at: now,
            due_at: Some(now - Duration::days(1)),
        };
        assert_eq!(res.balance_cents(), 70000);
        assert!(res.is_overdue(now));

        let picked_up = Reservation {
            status: ReservationStatus::PickedUp,
            ..res.clone()
        };
        assert!(!picked_up.is_overdue(now));

        let no_due = Reservation {
            due_at: None,
            ..res
        };
        assert!(!no_due.is_overdue(now));
    }

    #[test]
    fn test_exchange_balance_sign() {
        let item = |price: i64| ExchangeItem {
            variant_id: "v".to_string(),
            sku: None,
            name: "item".to_string(),
            quantity: 1,
            unit_price_cents: price,
        };

        // Customer returns more value than they take: store owes them.
        let balance = exchange_balance_cents(&[item(80000)], &[item(50000)]);
        assert_eq!(balance, -30000);
        assert_eq!(resolution_for_balance(balance), ExchangeResolution::CreditNote);

        // Customer takes more value: they pay the difference.
        let balance = exchange_balance_cents(&[item(50000)], &[item(80000)]);
        assert_eq!(balance, 30000);
        assert_eq!(
            resolution_for_balance(balance),
            ExchangeResolution::ExtraPayment
        );

        assert_eq!(resolution_for_balance(0), ExchangeResolution::Even);
    }

    #[test]
    fn test_movement_kind_money_direction() {
        assert!(MovementKind::Sale.is_money_in());
        assert!(MovementKind::ReservationDeposit.is_money_in());
        assert!(MovementKind::ReservationPickup.is_money_in());
        assert!(MovementKind::ExchangeAdjustment.is_money_in());
        assert!(!MovementKind::Withdrawal.is_money_in());
    }
}
