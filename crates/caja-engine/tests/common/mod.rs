//! Shared test harness: in-memory database + in-memory stock catalog.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use caja_engine::catalog::{CatalogError, CatalogResult, StockCatalog};
use caja_engine::{Database, DbConfig, RegisterEngine};

#[derive(Debug, Default, Clone, Copy)]
struct Stock {
    available: i64,
    held: i64,
}

/// In-memory StockCatalog honoring the hold-consumption contract: a
/// decrement consumes held units before free ones.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    stock: Mutex<HashMap<String, Stock>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalog {
    pub fn with_stock(entries: &[(&str, i64)]) -> Self {
        let stock = entries
            .iter()
            .map(|(variant, qty)| {
                (
                    variant.to_string(),
                    Stock {
                        available: *qty,
                        held: 0,
                    },
                )
            })
            .collect();
        InMemoryCatalog {
            stock: Mutex::new(stock),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn available(&self, variant_id: &str) -> i64 {
        self.stock
            .lock()
            .unwrap()
            .get(variant_id)
            .map(|s| s.available)
            .unwrap_or(0)
    }

    pub fn held(&self, variant_id: &str) -> i64 {
        self.stock
            .lock()
            .unwrap()
            .get(variant_id)
            .map(|s| s.held)
            .unwrap_or(0)
    }

    fn check_up(&self) -> CatalogResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CatalogError::Unavailable("catalog offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StockCatalog for InMemoryCatalog {
    async fn decrement_stock(&self, variant_id: &str, qty: i64) -> CatalogResult<()> {
        self.check_up()?;
        let mut stock = self.stock.lock().unwrap();
        let entry = stock
            .get_mut(variant_id)
            .ok_or_else(|| CatalogError::UnknownVariant {
                variant_id: variant_id.to_string(),
            })?;

        if entry.available + entry.held < qty {
            return Err(CatalogError::InsufficientStock {
                variant_id: variant_id.to_string(),
                available: entry.available + entry.held,
                requested: qty,
            });
        }

        // Holds are consumed first.
        let from_held = entry.held.min(qty);
        entry.held -= from_held;
        entry.available -= qty - from_held;
        Ok(())
    }

    async fn hold_stock(&self, variant_id: &str, qty: i64) -> CatalogResult<()> {
        self.check_up()?;
        let mut stock = self.stock.lock().unwrap();
        let entry = stock
            .get_mut(variant_id)
            .ok_or_else(|| CatalogError::UnknownVariant {
                variant_id: variant_id.to_string(),
            })?;

        if entry.available < qty {
            return Err(CatalogError::InsufficientStock {
                variant_id: variant_id.to_string(),
                available: entry.available,
                requested: qty,
            });
        }

        entry.available -= qty;
        entry.held += qty;
        Ok(())
    }

    async fn release_hold(&self, variant_id: &str, qty: i64) -> CatalogResult<()> {
        self.check_up()?;
        let mut stock = self.stock.lock().unwrap();
        let entry = stock
            .get_mut(variant_id)
            .ok_or_else(|| CatalogError::UnknownVariant {
                variant_id: variant_id.to_string(),
            })?;

        if entry.held < qty {
            return Err(CatalogError::Unavailable(format!(
                "release of {qty} exceeds held {} for {variant_id}",
                entry.held
            )));
        }

        entry.held -= qty;
        entry.available += qty;
        Ok(())
    }

    async fn increment_stock(&self, variant_id: &str, qty: i64) -> CatalogResult<()> {
        self.check_up()?;
        let mut stock = self.stock.lock().unwrap();
        // Returned merchandise may re-enter the catalog as a new variant.
        stock.entry(variant_id.to_string()).or_default().available += qty;
        Ok(())
    }
}

/// Seeded method ids from the initial migration.
pub const CASH: i64 = 1;
pub const CARD: i64 = 2;

/// Fresh engine over an in-memory database and catalog.
pub async fn engine_with_stock(entries: &[(&str, i64)]) -> (RegisterEngine, Arc<InMemoryCatalog>) {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    let catalog = Arc::new(InMemoryCatalog::with_stock(entries));
    let engine = RegisterEngine::new(db, catalog.clone());
    (engine, catalog)
}

/// A one-line cart for a catalog variant.
pub fn cart_line(variant_id: &str, qty: i64, unit_price_cents: i64) -> caja_core::CartLine {
    caja_core::CartLine {
        variant_id: Some(variant_id.to_string()),
        sku: Some(format!("SKU-{variant_id}")),
        name: format!("Item {variant_id}"),
        quantity: qty,
        unit_price_cents,
    }
}

/// An exchange item for a catalog variant.
pub fn exchange_item(variant_id: &str, qty: i64, unit_price_cents: i64) -> caja_core::ExchangeItem {
    caja_core::ExchangeItem {
        variant_id: variant_id.to_string(),
        sku: Some(format!("SKU-{variant_id}")),
        name: format!("Item {variant_id}"),
        quantity: qty,
        unit_price_cents,
    }
}
