//! # caja-engine: Transactional Register Engine over SQLite
//!
//! The persistence and command layer of the Caja register system.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         caja-engine                                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    RegisterEngine                                │   │
//! │  │  open / status / withdraw / close        (engine/session.rs)    │   │
//! │  │  checkout / reservations                 (engine/checkout.rs)   │   │
//! │  │  exchanges                               (engine/exchange.rs)   │   │
//! │  │  credit notes                            (engine/credit_note.rs)│   │
//! │  └───────┬──────────────────┬──────────────────────┬───────────────┘   │
//! │          │                  │                      │                    │
//! │          ▼                  ▼                      ▼                    │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐       │
//! │  │  repository  │   │  TillLocks   │   │  StockCatalog trait  │       │
//! │  │  (SQL only)  │   │  (per-till   │   │  (stock lives        │       │
//! │  │              │   │   mutex)     │   │   elsewhere)         │       │
//! │  └──────┬───────┘   └──────────────┘   └──────────────────────┘       │
//! │         ▼                                                               │
//! │  ┌──────────────┐                                                      │
//! │  │  SqlitePool  │  WAL, foreign keys, embedded migrations              │
//! │  └──────────────┘                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business math and validation live in `caja-core`; this crate wires them
//! to storage, stock and concurrency control.
//!
//! ## Example
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("./caja.db")).await?;
//! let engine = RegisterEngine::new(db, Arc::new(MyCatalog::connect()?));
//!
//! engine.open_session("main", 100_000).await?;
//! let outcome = engine.checkout("main", request).await?;
//! let summary = engine.close_session("main", 130_000).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod engine;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{CatalogError, CatalogResult, StockCatalog};
pub use engine::{
    CheckoutOutcome, CheckoutRequest, ExchangeOutcome, ExchangeRequest, PickupOutcome,
    RegisterEngine, ReservationListing, ReservationRequest, TillStatus,
};
pub use error::{DbError, DbResult, EngineError, EngineResult, ErrorKind};
pub use pool::{Database, DbConfig};
