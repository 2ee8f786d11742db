use std::sync::{Arc, Mutex};

use gamed_types::Quantities;
use thiserror::Error;

use crate::lock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("not enough {0}")]
    InsufficientResource(String),
    #[error("reservation already rolled back")]
    AlreadyRolledBack,
}

/// Per-grain resource quantities with all-or-nothing reservation.
///
/// Clones share the same underlying quantities.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    quantities: Arc<Mutex<Quantities>>,
}

impl ResourceLedger {
    pub fn new(seed: Quantities) -> Self {
        Self {
            quantities: Arc::new(Mutex::new(seed)),
        }
    }

    /// Deduct every amount in `cost`, or nothing at all.
    ///
    /// Fails with the first kind (in key order) that is missing or short. The check
    /// and the deduction happen under one lock, so concurrent reservations can never
    /// jointly overdraw a kind.
    pub fn reserve(&self, cost: &Quantities) -> Result<Reservation, LedgerError> {
        let mut quantities = lock(&self.quantities);
        for (kind, amount) in cost {
            match quantities.get(kind) {
                Some(available) if available >= amount => {}
                _ => return Err(LedgerError::InsufficientResource(kind.clone())),
            }
        }
        for (kind, amount) in cost {
            if let Some(available) = quantities.get_mut(kind) {
                *available -= amount;
            }
        }
        Ok(Reservation {
            quantities: Arc::clone(&self.quantities),
            deducted: Some(cost.clone()),
        })
    }

    /// Copy of the current quantities.
    pub fn quantities(&self) -> Quantities {
        lock(&self.quantities).clone()
    }

    pub fn amount(&self, kind: &str) -> u64 {
        lock(&self.quantities).get(kind).copied().unwrap_or(0)
    }

    /// Replace the whole ledger, used when restoring persisted state.
    pub(crate) fn reset(&self, quantities: Quantities) {
        *lock(&self.quantities) = quantities;
    }
}

/// A successful deduction that can be undone once.
///
/// Dropping or committing it keeps the deduction.
#[derive(Debug)]
#[must_use = "a reservation is either committed or rolled back"]
pub struct Reservation {
    quantities: Arc<Mutex<Quantities>>,
    deducted: Option<Quantities>,
}

impl Reservation {
    /// Amounts this reservation deducted, or `None` once rolled back.
    pub fn amounts(&self) -> Option<&Quantities> {
        self.deducted.as_ref()
    }

    /// Re-credit exactly what was deducted. A second call fails with
    /// [`LedgerError::AlreadyRolledBack`] and changes nothing.
    pub fn rollback(&mut self) -> Result<(), LedgerError> {
        let deducted = self.deducted.take().ok_or(LedgerError::AlreadyRolledBack)?;
        let mut quantities = lock(&self.quantities);
        for (kind, amount) in deducted {
            let entry = quantities.entry(kind).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
        Ok(())
    }

    pub fn commit(self) {}
}
