use core::future::Future;

use crate::store::StoreError;

/// A segment granted by one reserve-and-advance on the counter store.
///
/// `min` is the high-water mark read before the update and `max` is
/// `min + step`, the value written back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reservation {
    pub business: String,
    pub min: i64,
    pub max: i64,
}

impl Reservation {
    /// Number of identifiers covered by this reservation.
    ///
    /// Zero or negative for an empty or inverted range, saturating at the
    /// `i64` bounds.
    pub const fn len(&self) -> i64 {
        self.max.saturating_sub(self.min)
    }

    pub const fn is_empty(&self) -> bool {
        self.max <= self.min
    }
}

/// One row of the `business_counter` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterRow {
    /// The high-water mark already granted to some segment.
    pub max_value: i64,
    /// How far each reservation advances the high-water mark.
    pub step: i64,
}

impl CounterRow {
    pub const fn new(max_value: i64, step: i64) -> Self {
        Self { max_value, step }
    }

    /// Computes the reservation that advancing this row by one step grants.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidStep`] if `step <= 0`.
    /// - [`StoreError::Overflow`] if `max_value + step` does not fit in an
    ///   `i64`.
    pub fn advance(&self, business: &str) -> Result<Reservation, StoreError> {
        if self.step <= 0 {
            return Err(StoreError::InvalidStep {
                business: business.to_owned(),
                step: self.step,
            });
        }
        let max = self
            .max_value
            .checked_add(self.step)
            .ok_or_else(|| StoreError::Overflow {
                business: business.to_owned(),
                max_value: self.max_value,
                step: self.step,
            })?;
        Ok(Reservation {
            business: business.to_owned(),
            min: self.max_value,
            max,
        })
    }
}

/// A shared persistent counter that hands out segments per business key.
///
/// Implementations must make [`CounterStore::reserve`] atomic across every
/// process sharing the store: two concurrent reservations for the same key
/// never receive overlapping ranges, and the high-water mark never decreases.
///
/// Stores that expose row-level transactions should implement
/// [`TransactionalStore`] instead and get this trait for free.
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically reads the high-water mark for `business`, advances it by the
    /// configured step and returns the granted range.
    fn reserve(&self, business: &str) -> impl Future<Output = Result<Reservation, StoreError>> + Send;
}

/// A single isolated transaction against the `business_counter` table.
///
/// Dropping a transaction without committing must discard staged writes and
/// release the row lock.
pub trait CounterTransaction: Send {
    /// `SELECT max_value, step FROM business_counter WHERE business = ? FOR UPDATE`
    fn select_for_update(
        &mut self,
        business: &str,
    ) -> impl Future<Output = Result<CounterRow, StoreError>> + Send;

    /// `UPDATE business_counter SET max_value = ? WHERE business = ?`
    fn update_max_value(
        &mut self,
        business: &str,
        max_value: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A counter store that can open [`CounterTransaction`]s.
pub trait TransactionalStore: Send + Sync + 'static {
    type Transaction: CounterTransaction;

    /// `BEGIN`
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, StoreError>> + Send;
}

impl<S> CounterStore for S
where
    S: TransactionalStore,
{
    fn reserve(&self, business: &str) -> impl Future<Output = Result<Reservation, StoreError>> + Send {
        async move {
            let mut tx = self.begin().await?;
            match reserve_in(&mut tx, business).await {
                Ok(reservation) => {
                    tx.commit().await?;
                    Ok(reservation)
                }
                Err(err) => {
                    if let Err(_rollback) = tx.rollback().await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(business, error = %_rollback, "rollback failed");
                    }
                    Err(err)
                }
            }
        }
    }
}

async fn reserve_in<T>(tx: &mut T, business: &str) -> Result<Reservation, StoreError>
where
    T: CounterTransaction,
{
    let row = tx.select_for_update(business).await?;
    let reservation = row.advance(business)?;
    tx.update_max_value(business, reservation.max).await?;
    Ok(reservation)
}
