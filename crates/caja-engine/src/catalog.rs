//! # Stock Catalog Collaborator
//!
//! The engine never stores stock. Every stock-affecting operation is
//! delegated to an implementation of [`StockCatalog`], supplied by the
//! surrounding application (local product database, marketplace sync
//! façade, ...).
//!
//! ## Ordering Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock mutation FIRST, monetary commit SECOND.                          │
//! │                                                                         │
//! │  checkout:    decrement each line ──► commit sale + movement            │
//! │  reservation: hold each line      ──► commit reservation (+ deposit)    │
//! │  pickup:      decrement (consumes ──► commit pickup movement            │
//! │               the hold)                                                 │
//! │  exchange:    increment items_in, ──► commit exchange + resolution      │
//! │               decrement items_out                                       │
//! │                                                                         │
//! │  If the monetary commit fails, the engine issues the inverse stock     │
//! │  calls (compensating rollback). If a stock call fails mid-way, the     │
//! │  already-applied calls are reversed and nothing is committed.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Hold Semantics
//! A hold reserves quantity without selling it. A later `decrement_stock`
//! for the same variant consumes outstanding holds before touching free
//! stock, so "convert the hold" at reservation pickup is a plain decrement.
//! `release_hold` returns held quantity to free stock.
//!
//! Implementations must be atomic per variant and report per-call
//! success/failure; the engine wraps every call in a timeout and surfaces
//! expiry as a dependency error.

use async_trait::async_trait;
use thiserror::Error;

// =============================================================================
// Catalog Error
// =============================================================================

/// Failures reported by the stock collaborator.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Not enough free stock to satisfy a decrement or hold.
    #[error("insufficient stock for {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// The variant id does not exist in the catalog.
    #[error("unknown variant: {variant_id}")]
    UnknownVariant { variant_id: String },

    /// The catalog service itself failed (connection refused, 5xx, ...).
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// =============================================================================
// StockCatalog Trait
// =============================================================================

/// The stock interface this engine consumes.
#[async_trait]
pub trait StockCatalog: Send + Sync {
    /// Permanently removes `qty` units of a variant (a sale). Consumes
    /// outstanding holds for the variant first.
    async fn decrement_stock(&self, variant_id: &str, qty: i64) -> CatalogResult<()>;

    /// Reserves `qty` units without selling them (reservation booking).
    async fn hold_stock(&self, variant_id: &str, qty: i64) -> CatalogResult<()>;

    /// Returns `qty` held units to free stock (reservation cancelled).
    async fn release_hold(&self, variant_id: &str, qty: i64) -> CatalogResult<()>;

    /// Adds `qty` units back to free stock (merchandise returned).
    async fn increment_stock(&self, variant_id: &str, qty: i64) -> CatalogResult<()>;
}
