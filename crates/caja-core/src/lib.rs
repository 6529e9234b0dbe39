//! # caja-core: Pure Business Logic for the Caja Register Engine
//!
//! This crate is the **heart** of the register session & reconciliation
//! engine. It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Caller (POS UI / HTTP API)                     │   │
//! │  │   open session ──► checkout ──► exchange ──► close & reconcile │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caja-engine (command surface)                │   │
//! │  │    open_session, checkout, process_exchange, close_session ... │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ validation│  │   │
//! │  │   │  Session  │  │   Money   │  │  replay   │  │   rules   │  │   │
//! │  │   │  Movement │  │  (cents)  │  │  totals   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (RegisterSession, Movement, Reservation, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - Pure replay of movements into per-method totals
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::money::Money;
//! use caja_core::types::PaymentAllocation;
//! use caja_core::validation::validate_allocations;
//!
//! // Mixed payment: $400 cash + $600 card against a $1000 total
//! let split = vec![
//!     PaymentAllocation::new(1, 40000),
//!     PaymentAllocation::new(2, 60000),
//! ];
//! assert!(validate_allocations(&split, 100000).is_ok());
//!
//! let total: Money = split.iter().map(|a| a.amount()).sum();
//! assert_eq!(total.cents(), 100000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use caja_core::Money` instead of
// `use caja_core::money::Money`

pub use error::ValidationError;
pub use ledger::{expected_cash_cents, LedgerTotals};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default till ID for single-till deployments.
///
/// ## Why a constant?
/// The original store runs one physical register. The schema and engine are
/// keyed by till id throughout, so multi-till deployments just pass their
/// own ids; single-till callers use this.
pub const DEFAULT_TILL_ID: &str = "main";

/// Maximum lines allowed in a single cart
///
/// ## Business Reason
/// Prevents runaway carts and ensures reasonable transaction sizes.
pub const MAX_CART_LINES: usize = 100;

/// Prefix for issued credit note codes ("NC" = nota de crédito).
pub const CREDIT_NOTE_CODE_PREFIX: &str = "NC-";
