//! # Ledger Accumulation
//!
//! Pure replay of a session's movements into per-method totals and the
//! expected cash-on-hand figure.
//!
//! ## Single Source of Truth
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Movements are append-only, so session state is always derivable:      │
//! │                                                                         │
//! │  [sale cash 500] [sale card 300] [withdrawal cash -200]                 │
//! │        │               │                │                               │
//! │        └───────────────┴────────────────┘                               │
//! │                        │                                                 │
//! │                        ▼                                                 │
//! │              LedgerTotals::accumulate()                                 │
//! │                        │                                                 │
//! │        ┌───────────────┼────────────────┐                               │
//! │        ▼               ▼                ▼                               │
//! │  per-method net   cash net (+300)  gross sales (800)                    │
//! │                                                                         │
//! │  expected cash = opening float + cash net                               │
//! │                                                                         │
//! │  Every consumer (status query, close reconciliation, withdrawal        │
//! │  guard) reads THIS aggregation. Nothing re-derives its own sums.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Integer sums commute, so the result is independent of movement order.

use std::collections::{BTreeMap, HashSet};

use crate::types::Movement;

// =============================================================================
// Ledger Totals
// =============================================================================

/// Accumulated per-method totals for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    /// Net cents per payment method id. Withdrawals carry negative cash
    /// allocations, so they subtract naturally.
    per_method_cents: BTreeMap<i64, i64>,

    /// Net cash across all movements: Σcash allocations (withdrawals
    /// included with their negative sign).
    pub cash_net_cents: i64,

    /// Gross amount of all money-in movements, across every method.
    pub gross_sales_cents: i64,

    /// Absolute total taken out by withdrawals.
    pub withdrawals_cents: i64,
}

impl LedgerTotals {
    /// Replays movements into totals.
    ///
    /// `cash_method_ids` comes from the payment method registry (methods
    /// whose kind is Cash); only those allocations affect the drawer.
    pub fn accumulate<'a, I>(movements: I, cash_method_ids: &HashSet<i64>) -> Self
    where
        I: IntoIterator<Item = &'a Movement>,
    {
        let mut totals = LedgerTotals::default();

        for movement in movements {
            if movement.kind.is_money_in() {
                totals.gross_sales_cents += movement.gross_amount_cents;
            } else {
                // Withdrawal gross is negative by convention.
                totals.withdrawals_cents += -movement.gross_amount_cents;
            }

            for allocation in &movement.allocations {
                *totals
                    .per_method_cents
                    .entry(allocation.method_id)
                    .or_insert(0) += allocation.amount_cents;

                if cash_method_ids.contains(&allocation.method_id) {
                    totals.cash_net_cents += allocation.amount_cents;
                }
            }
        }

        totals
    }

    /// Net total for one method (zero if the method never appeared).
    pub fn method_total_cents(&self, method_id: i64) -> i64 {
        self.per_method_cents.get(&method_id).copied().unwrap_or(0)
    }

    /// Iterates (method_id, net cents) in ascending method id order.
    pub fn per_method(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.per_method_cents.iter().map(|(id, cents)| (*id, *cents))
    }
}

/// Expected cash-on-hand: opening float + Σcash in − Σcash withdrawals.
///
/// This is the figure the physical count is reconciled against at close.
pub fn expected_cash_cents(opening_float_cents: i64, totals: &LedgerTotals) -> i64 {
    opening_float_cents + totals.cash_net_cents
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Movement, MovementKind, PaymentAllocation};
    use chrono::Utc;

    const CASH: i64 = 1;
    const CARD: i64 = 2;

    fn movement(kind: MovementKind, gross: i64, allocations: Vec<(i64, i64)>) -> Movement {
        Movement {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "s1".to_string(),
            kind,
            gross_amount_cents: gross,
            reference: None,
            description: None,
            created_at: Utc::now(),
            allocations: allocations
                .into_iter()
                .map(|(m, a)| PaymentAllocation::new(m, a))
                .collect(),
        }
    }

    fn cash_ids() -> HashSet<i64> {
        [CASH].into_iter().collect()
    }

    /// Open with float 1000, sale cash 500, sale card 300, withdraw 200:
    /// expected = 1000 + 500 − 200 = 1300.
    #[test]
    fn test_scenario_reconciliation() {
        let movements = vec![
            movement(MovementKind::Sale, 50000, vec![(CASH, 50000)]),
            movement(MovementKind::Sale, 30000, vec![(CARD, 30000)]),
            movement(MovementKind::Withdrawal, -20000, vec![(CASH, -20000)]),
        ];

        let totals = LedgerTotals::accumulate(&movements, &cash_ids());
        assert_eq!(totals.gross_sales_cents, 80000);
        assert_eq!(totals.withdrawals_cents, 20000);
        assert_eq!(totals.cash_net_cents, 30000);
        assert_eq!(totals.method_total_cents(CASH), 30000);
        assert_eq!(totals.method_total_cents(CARD), 30000);

        assert_eq!(expected_cash_cents(100000, &totals), 130000);
    }

    /// Expected cash is independent of movement ordering.
    #[test]
    fn test_order_independence() {
        let mut movements = vec![
            movement(MovementKind::Sale, 50000, vec![(CASH, 50000)]),
            movement(MovementKind::Withdrawal, -20000, vec![(CASH, -20000)]),
            movement(MovementKind::ReservationDeposit, 30000, vec![(CASH, 30000)]),
            movement(MovementKind::ExchangeAdjustment, 10000, vec![(CARD, 10000)]),
        ];

        let forward = LedgerTotals::accumulate(&movements, &cash_ids());
        movements.reverse();
        let backward = LedgerTotals::accumulate(&movements, &cash_ids());

        assert_eq!(forward, backward);
        assert_eq!(
            expected_cash_cents(100000, &forward),
            expected_cash_cents(100000, &backward)
        );
    }

    /// Mixed payment: each allocation lands on its own method; only the
    /// cash part affects the drawer.
    #[test]
    fn test_mixed_payment_split() {
        let movements = vec![movement(
            MovementKind::Sale,
            100000,
            vec![(CASH, 40000), (CARD, 60000)],
        )];

        let totals = LedgerTotals::accumulate(&movements, &cash_ids());
        assert_eq!(totals.method_total_cents(CASH), 40000);
        assert_eq!(totals.method_total_cents(CARD), 60000);
        assert_eq!(totals.cash_net_cents, 40000);
        assert_eq!(totals.gross_sales_cents, 100000);
    }

    #[test]
    fn test_empty_session() {
        let empty: Vec<Movement> = Vec::new();
        let totals = LedgerTotals::accumulate(&empty, &cash_ids());
        assert_eq!(expected_cash_cents(100000, &totals), 100000);
        assert_eq!(totals.gross_sales_cents, 0);
    }
}
