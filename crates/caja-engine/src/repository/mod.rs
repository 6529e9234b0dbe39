//! # Repository Layer
//!
//! SQL for each aggregate, written as free async functions over a
//! `&mut SqliteConnection` instead of pool-holding structs.
//!
//! ## Why connection-scoped functions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every engine command spans several tables in ONE transaction:          │
//! │                                                                         │
//! │    checkout  = sales + sale_items + movements + movement_allocations   │
//! │                (+ credit_notes when a note is applied)                  │
//! │    exchange  = exchanges + exchange_items + (movements | credit_notes) │
//! │    close     = movements replay + register_sessions update             │
//! │                                                                         │
//! │  A function taking &mut SqliteConnection composes inside the engine's  │
//! │  transaction (`&mut *tx`) and equally runs standalone on a pool        │
//! │  connection for reads. A struct holding its own pool cannot.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories do storage only: no business rules, no validation, no
//! transaction management. The engine owns all of those.

pub mod credit_note;
pub mod exchange;
pub mod payment_method;
pub mod reservation;
pub mod sale;
pub mod session;
