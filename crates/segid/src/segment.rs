use crate::store::Reservation;

/// An in-memory range of identifiers reserved from the counter store.
///
/// `min` is the last offset handed out and `max` is the upper bound granted by
/// the store, so a segment built from a reservation of `(prior, prior + step)`
/// yields `prior + 1 ..= prior + step`. The next segment starts at
/// `prior + step`, which keeps consecutive segments disjoint.
///
/// A segment is owned exclusively by the refill loop and needs no
/// synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    min: i64,
    max: i64,
}

impl Segment {
    /// Creates a segment covering `(min, max]`.
    ///
    /// If `max < min` the segment is clamped to empty so that `min <= max`
    /// always holds.
    pub const fn new(min: i64, max: i64) -> Self {
        if max < min {
            Self { min, max: min }
        } else {
            Self { min, max }
        }
    }

    /// Returns the next identifier, or `None` once the segment is exhausted.
    ///
    /// An exhausted segment never yields again; a fresh one must be reserved.
    pub fn next_id(&mut self) -> Option<i64> {
        if self.is_exhausted() {
            return None;
        }
        self.min += 1;
        Some(self.min)
    }

    /// Returns `true` when every identifier of the segment has been produced.
    pub const fn is_exhausted(&self) -> bool {
        self.min >= self.max
    }

    /// Number of identifiers still available in the segment.
    pub const fn remaining(&self) -> u64 {
        self.max.abs_diff(self.min)
    }

    /// The last identifier produced, or the reservation's lower bound if none
    /// has been yet.
    pub const fn min(&self) -> i64 {
        self.min
    }

    /// Inclusive upper bound of the segment.
    pub const fn max(&self) -> i64 {
        self.max
    }
}

impl From<&Reservation> for Segment {
    fn from(reservation: &Reservation) -> Self {
        Self::new(reservation.min, reservation.max)
    }
}
