//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  └── ValidationError  - input / business-rule violations               │
//! │                                                                         │
//! │  caja-engine errors (separate crate)                                   │
//! │  ├── DbError          - database operation failures                    │
//! │  ├── CatalogError     - stock collaborator failures                    │
//! │  └── EngineError      - the typed taxonomy callers see                 │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError → transport layer → operator      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (amounts, method ids, ...)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input and business-rule validation errors.
///
/// Every variant is terminal for the triggering request: the engine aborts
/// before any stock or monetary mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed UUID or credit note code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The allocation sum does not match the submitted total.
    ///
    /// ## When This Occurs
    /// - Mixed payment entered in the UI doesn't add up to the cart total
    /// - A caller recomputed the total but not the split
    #[error("allocations sum to {allocated_cents} but the total is {expected_cents}")]
    AllocationMismatch {
        expected_cents: i64,
        allocated_cents: i64,
    },

    /// The same payment method appears more than once in one movement.
    #[error("payment method {method_id} appears more than once")]
    DuplicateMethod { method_id: i64 },

    /// A money-in movement needs at least one allocation.
    #[error("at least one payment allocation is required")]
    NoAllocations,

    /// Checkout or reservation submitted with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Reservation deposit larger than the reservation total.
    #[error("deposit {deposit_cents} exceeds reservation total {total_cents}")]
    DepositExceedsTotal {
        deposit_cents: i64,
        total_cents: i64,
    },

    /// Withdrawal would leave the drawer negative.
    ///
    /// ## User Workflow
    /// ```text
    /// Withdraw $500
    ///      │
    ///      ▼
    /// Drawer accounts for $320
    ///      │
    ///      ▼
    /// WithdrawalExceedsCash { requested: 50000, available: 32000 }
    ///      │
    ///      ▼
    /// UI shows: "Only $320.00 in the drawer"
    /// ```
    #[error("withdrawal of {requested_cents} exceeds cash on hand {available_cents}")]
    WithdrawalExceedsCash {
        requested_cents: i64,
        available_cents: i64,
    },

    /// A payment method is required for this operation (e.g. positive
    /// exchange balance, reservation balance > 0).
    #[error("a payment method is required: {reason}")]
    PaymentMethodRequired { reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with ValidationError.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ValidationError::AllocationMismatch {
            expected_cents: 100000,
            allocated_cents: 80000,
        };
        assert_eq!(
            err.to_string(),
            "allocations sum to 80000 but the total is 100000"
        );

        let err = ValidationError::WithdrawalExceedsCash {
            requested_cents: 50000,
            available_cents: 32000,
        };
        assert_eq!(
            err.to_string(),
            "withdrawal of 50000 exceeds cash on hand 32000"
        );
    }

    #[test]
    fn test_required_message() {
        let err = ValidationError::Required {
            field: "client_name".to_string(),
        };
        assert_eq!(err.to_string(), "client_name is required");
    }
}
