//! # Validation Module
//!
//! Business rule validation for the register engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI / API)                                             │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine entry point (Rust)                                    │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (credit note code, one open session per till)  │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Every check here runs BEFORE any stock or monetary mutation, so a     │
//! │  rejected request leaves state exactly as it was.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::{ValidationError, ValidationResult};
use crate::types::{CartLine, PaymentAllocation};
use crate::MAX_CART_LINES;

// =============================================================================
// Money Validators
// =============================================================================

/// Validates an opening float.
///
/// ## Rules
/// - Must be zero or greater (an empty drawer is a legal open)
pub fn validate_opening_float(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "opening_float".to_string(),
        });
    }

    Ok(())
}

/// Validates a withdrawal against the cash currently accounted for.
///
/// ## Rules
/// - Amount must be positive
/// - Amount must not exceed cash on hand (no negative-cash drawer)
pub fn validate_withdrawal(amount_cents: i64, available_cash_cents: i64) -> ValidationResult<()> {
    if amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "withdrawal amount".to_string(),
        });
    }

    if amount_cents > available_cash_cents {
        return Err(ValidationError::WithdrawalExceedsCash {
            requested_cents: amount_cents,
            available_cents: available_cash_cents,
        });
    }

    Ok(())
}

/// Validates a credit note amount.
pub fn validate_credit_note_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "credit note amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a reservation deposit against the reservation total.
///
/// ## Rules
/// - 0 ≤ deposit ≤ total
/// - deposit > 0 requires a payment method
pub fn validate_deposit(
    deposit_cents: i64,
    total_cents: i64,
    deposit_method_id: Option<i64>,
) -> ValidationResult<()> {
    if deposit_cents < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "deposit".to_string(),
        });
    }

    if deposit_cents > total_cents {
        return Err(ValidationError::DepositExceedsTotal {
            deposit_cents,
            total_cents,
        });
    }

    if deposit_cents > 0 && deposit_method_id.is_none() {
        return Err(ValidationError::PaymentMethodRequired {
            reason: "deposit is greater than zero".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Allocation Validators
// =============================================================================

/// Validates the payment split of a money-in movement.
///
/// ## Rules
/// - At least one allocation
/// - Every amount strictly positive
/// - Each method at most once
/// - Σamounts == expected total (the operator-submitted total, which may be
///   an override of the naive line sum — it is accepted as-is)
///
/// ## Example
/// ```rust
/// use caja_core::types::PaymentAllocation;
/// use caja_core::validation::validate_allocations;
///
/// let split = vec![
///     PaymentAllocation::new(1, 40000),
///     PaymentAllocation::new(2, 60000),
/// ];
/// assert!(validate_allocations(&split, 100000).is_ok());
/// assert!(validate_allocations(&split, 90000).is_err());
/// ```
pub fn validate_allocations(
    allocations: &[PaymentAllocation],
    expected_total_cents: i64,
) -> ValidationResult<()> {
    if allocations.is_empty() {
        return Err(ValidationError::NoAllocations);
    }

    let mut seen: HashSet<i64> = HashSet::with_capacity(allocations.len());
    let mut sum: i64 = 0;

    for allocation in allocations {
        if allocation.amount_cents <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "allocation amount".to_string(),
            });
        }

        if !seen.insert(allocation.method_id) {
            return Err(ValidationError::DuplicateMethod {
                method_id: allocation.method_id,
            });
        }

        sum += allocation.amount_cents;
    }

    if sum != expected_total_cents {
        return Err(ValidationError::AllocationMismatch {
            expected_cents: expected_total_cents,
            allocated_cents: sum,
        });
    }

    Ok(())
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates a checkout/reservation cart.
///
/// ## Rules
/// - Must not be empty
/// - Must not exceed MAX_CART_LINES
/// - Every quantity positive, every unit price non-negative
/// - Line names present
pub fn validate_cart(lines: &[CartLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    if lines.len() > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    for line in lines {
        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }

        if line.unit_price_cents < 0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "unit_price".to_string(),
            });
        }

        if line.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "line name".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a till identifier.
pub fn validate_till_id(till_id: &str) -> ValidationResult<()> {
    let till_id = till_id.trim();

    if till_id.is_empty() {
        return Err(ValidationError::Required {
            field: "till_id".to_string(),
        });
    }

    if till_id.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "till_id".to_string(),
            max: 50,
        });
    }

    Ok(())
}

/// Validates a reservation client name.
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "client_name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "client_name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a credit note code as entered by an operator.
///
/// ## Rules
/// - Non-empty after trimming
/// - At most 32 characters (issued codes are "NC-" + 8 hex chars)
pub fn validate_credit_note_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > 32 {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "credit note codes are at most 32 characters".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64) -> CartLine {
        CartLine {
            variant_id: Some("v1".to_string()),
            sku: Some("SKU-1".to_string()),
            name: "Remera".to_string(),
            quantity: qty,
            unit_price_cents: price,
        }
    }

    #[test]
    fn test_validate_opening_float() {
        assert!(validate_opening_float(0).is_ok());
        assert!(validate_opening_float(100000).is_ok());
        assert!(validate_opening_float(-1).is_err());
    }

    #[test]
    fn test_validate_withdrawal() {
        assert!(validate_withdrawal(20000, 130000).is_ok());
        assert!(validate_withdrawal(0, 130000).is_err());
        assert!(validate_withdrawal(-500, 130000).is_err());

        let err = validate_withdrawal(200000, 130000).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WithdrawalExceedsCash {
                requested_cents: 200000,
                available_cents: 130000,
            }
        );
    }

    #[test]
    fn test_validate_allocations() {
        let split = vec![
            PaymentAllocation::new(1, 40000),
            PaymentAllocation::new(2, 60000),
        ];
        assert!(validate_allocations(&split, 100000).is_ok());

        // Sum mismatch
        assert!(matches!(
            validate_allocations(&split, 90000),
            Err(ValidationError::AllocationMismatch { .. })
        ));

        // Duplicate method
        let dup = vec![
            PaymentAllocation::new(1, 40000),
            PaymentAllocation::new(1, 60000),
        ];
        assert!(matches!(
            validate_allocations(&dup, 100000),
            Err(ValidationError::DuplicateMethod { method_id: 1 })
        ));

        // Zero amount
        let zero = vec![PaymentAllocation::new(1, 0)];
        assert!(validate_allocations(&zero, 0).is_err());

        // Empty
        assert!(matches!(
            validate_allocations(&[], 0),
            Err(ValidationError::NoAllocations)
        ));
    }

    #[test]
    fn test_validate_deposit() {
        assert!(validate_deposit(0, 100000, None).is_ok());
        assert!(validate_deposit(30000, 100000, Some(1)).is_ok());
        assert!(validate_deposit(100000, 100000, Some(1)).is_ok());

        // deposit > total
        assert!(validate_deposit(110000, 100000, Some(1)).is_err());
        // negative
        assert!(validate_deposit(-1, 100000, Some(1)).is_err());
        // positive deposit without method
        assert!(matches!(
            validate_deposit(30000, 100000, None),
            Err(ValidationError::PaymentMethodRequired { .. })
        ));
    }

    #[test]
    fn test_validate_cart() {
        assert!(validate_cart(&[line(1, 250000)]).is_ok());
        assert!(validate_cart(&[]).is_err());
        assert!(validate_cart(&[line(0, 250000)]).is_err());
        assert!(validate_cart(&[line(1, -5)]).is_err());

        let unnamed = CartLine {
            name: "  ".to_string(),
            ..line(1, 100)
        };
        assert!(validate_cart(&[unnamed]).is_err());
    }

    #[test]
    fn test_validate_till_id() {
        assert!(validate_till_id("main").is_ok());
        assert!(validate_till_id("").is_err());
        assert!(validate_till_id(&"t".repeat(60)).is_err());
    }

    #[test]
    fn test_validate_credit_note_code() {
        assert!(validate_credit_note_code("NC-7F3A21B9").is_ok());
        assert!(validate_credit_note_code("").is_err());
        assert!(validate_credit_note_code(&"X".repeat(40)).is_err());
    }
}
