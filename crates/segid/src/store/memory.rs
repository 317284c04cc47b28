use std::collections::HashMap;
use std::sync::Arc;

use futures::lock::{Mutex, OwnedMutexGuard};
use parking_lot::RwLock;
use portable_atomic::{AtomicU64, Ordering};

use crate::store::{CounterRow, CounterTransaction, StoreError, TransactionalStore};

type Row = Arc<Mutex<CounterRow>>;
type Table = Arc<RwLock<HashMap<String, Row>>>;

/// An in-process [`TransactionalStore`].
///
/// Each row sits behind its own async mutex which a transaction holds from
/// `select_for_update` until commit or rollback, mirroring a row-exclusive
/// lock. Clones share the same table, so several allocators (or tasks acting
/// as separate processes) can contend on one counter.
///
/// Failures can be injected with [`MemoryCounterStore::fail_next`] to exercise
/// the retry path.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    table: Table,
    injected_failures: Arc<AtomicU64>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Self::register`].
    #[must_use]
    pub fn with_counter(self, business: impl Into<String>, max_value: i64, step: i64) -> Self {
        self.register(business, max_value, step);
        self
    }

    /// Creates the counter row for `business`.
    ///
    /// Returns `false` and leaves the existing row untouched if one is already
    /// registered.
    pub fn register(&self, business: impl Into<String>, max_value: i64, step: i64) -> bool {
        let mut table = self.table.write();
        let business = business.into();
        if table.contains_key(&business) {
            return false;
        }
        table.insert(
            business,
            Arc::new(Mutex::new(CounterRow::new(max_value, step))),
        );
        true
    }

    /// Drops the counter row for `business`, returning whether it existed.
    ///
    /// A transaction already holding the row keeps its lock, but its commit
    /// no longer reaches the table.
    pub fn remove(&self, business: &str) -> bool {
        self.table.write().remove(business).is_some()
    }

    /// Reads the current row for `business`, waiting for any open transaction
    /// on it to finish.
    pub async fn get(&self, business: &str) -> Option<CounterRow> {
        let row = self.table.read().get(business).cloned()?;
        let current = *row.lock().await;
        Some(current)
    }

    /// Makes the next `n` calls to `begin` fail with
    /// [`StoreError::Unavailable`].
    pub fn fail_next(&self, n: u64) {
        self.injected_failures.store(n, Ordering::Release);
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl TransactionalStore for MemoryCounterStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        if self.take_injected_failure() {
            return Err(StoreError::Unavailable {
                context: "injected failure".to_owned(),
            });
        }
        Ok(MemoryTransaction {
            table: Arc::clone(&self.table),
            locked: None,
        })
    }
}

/// An open transaction on a [`MemoryCounterStore`].
pub struct MemoryTransaction {
    table: Table,
    locked: Option<LockedRow>,
}

struct LockedRow {
    business: String,
    guard: OwnedMutexGuard<CounterRow>,
    staged: Option<i64>,
}

impl core::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("locked", &self.locked.as_ref().map(|l| l.business.as_str()))
            .field("staged", &self.locked.as_ref().and_then(|l| l.staged))
            .finish()
    }
}

impl MemoryTransaction {
    fn locked_row(&mut self, business: &str) -> Result<&mut LockedRow, StoreError> {
        match self.locked.as_mut() {
            Some(locked) if locked.business == business => Ok(locked),
            Some(locked) => Err(StoreError::Conflict {
                context: format!(
                    "transaction holds `{}`, not `{business}`",
                    locked.business
                ),
            }),
            None => Err(StoreError::Conflict {
                context: format!("row `{business}` was not selected for update"),
            }),
        }
    }
}

impl CounterTransaction for MemoryTransaction {
    async fn select_for_update(&mut self, business: &str) -> Result<CounterRow, StoreError> {
        if let Some(locked) = &self.locked {
            if locked.business == business {
                return Ok(*locked.guard);
            }
            return Err(StoreError::Conflict {
                context: format!(
                    "transaction already holds `{}`, cannot lock `{business}`",
                    locked.business
                ),
            });
        }

        let row = self
            .table
            .read()
            .get(business)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                business: business.to_owned(),
            })?;
        let guard = row.lock_owned().await;
        let current = *guard;
        self.locked = Some(LockedRow {
            business: business.to_owned(),
            guard,
            staged: None,
        });
        Ok(current)
    }

    async fn update_max_value(&mut self, business: &str, max_value: i64) -> Result<(), StoreError> {
        let locked = self.locked_row(business)?;
        if max_value < locked.guard.max_value {
            return Err(StoreError::Conflict {
                context: format!(
                    "high-water mark for `{business}` cannot move back from {} to {max_value}",
                    locked.guard.max_value
                ),
            });
        }
        locked.staged = Some(max_value);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if let Some(mut locked) = self.locked.take() {
            if let Some(max_value) = locked.staged {
                locked.guard.max_value = max_value;
            }
        }
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.locked = None;
        Ok(())
    }
}
