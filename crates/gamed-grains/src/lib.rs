//! Grain state machines: the inventory (resource ledger + construction store) and
//! the scheduler (timer store + expiry notifier).
//!
//! Each grain is driven by a host that delivers `init` once, then one message at a
//! time, then `terminate` once. The stores inside a grain carry their own locks
//! because timer watchers and the expiry consumer touch them from background tasks.

pub mod construction;
pub mod error;
pub mod grain;
pub mod inventory;
pub mod ledger;
pub mod notifier;
pub mod scheduler;
pub mod timer_store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use construction::ConstructionStore;
pub use error::GrainError;
pub use grain::{Envelope, Grain};
pub use inventory::{InventoryError, InventoryGrain, InventoryMsg, InventorySnapshot};
pub use ledger::{LedgerError, Reservation, ResourceLedger};
pub use notifier::{ChannelSink, ExpiryNotifier, LogSink, Notification, NotificationSink};
pub use scheduler::{ScheduleError, SchedulerGrain, SchedulerMsg};
pub use timer_store::{Countdown, PersistedTimer, Timer, TimerStore};

/// Every critical section leaves its map consistent before it can panic, so a
/// poisoned lock is still safe to reuse.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
