//! Time abstractions.
//!
//! Grounded in the teacher's `time.rs`: a thin supertrait pinning the
//! `embedded_time::Clock` tick type to `u64` milliseconds, plus a
//! timestamped wrapper used for message-id/token de-duplication history
//! and for ageing entries out of the bounded runtime tables.

use embedded_time::clock::Error as ClockError;
use embedded_time::Instant;

/// A duration, in milliseconds.
pub type Millis = embedded_time::duration::Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the type of "ticks" to `u64`.
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Timeout configuration allowing for "never time out" as an option.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum Timeout {
  /// Timeout after some number of milliseconds has elapsed.
  Millis(u64),
  /// Never time out.
  Never,
}

/// Data associated with a timestamp.
#[derive(Clone, Copy)]
pub struct Stamped<C: Clock, T>(pub T, pub Instant<C>);

impl<C: Clock, T: core::fmt::Debug> core::fmt::Debug for Stamped<C, T> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_tuple("Stamped")
     .field(&self.0)
     .field(&self.1.duration_since_epoch())
     .finish()
  }
}

impl<C: Clock, T: PartialEq> PartialEq for Stamped<C, T> {
  fn eq(&self, other: &Self) -> bool {
    self.0 == other.0 && self.1 == other.1
  }
}

impl<C: Clock, T: Eq> Eq for Stamped<C, T> {}

impl<C: Clock, T: Default> Default for Stamped<C, T> {
  fn default() -> Self {
    Self(T::default(), Instant::new(0))
  }
}

impl<C: Clock, T> Stamped<C, T> {
  /// Stamp a value with the clock's current time.
  pub fn new(clock: &C, t: T) -> Result<Self, ClockError> {
    clock.try_now().map(|now| Self(t, now))
  }

  /// Borrow the stamped data.
  pub fn data(&self) -> &T {
    &self.0
  }

  /// The time this value was stamped.
  pub fn time(&self) -> Instant<C> {
    self.1
  }

  /// Discard the timestamp and yield the data.
  pub fn discard_timestamp(self) -> T {
    self.0
  }

  /// How many milliseconds have elapsed between this stamp and `now`.
  pub fn millis_since(&self, now: Instant<C>) -> u64 {
    now.checked_duration_since(&self.1)
       .and_then(|dur| Millis::try_from(dur).ok())
       .map(|Millis(ms)| ms)
       .unwrap_or(0)
  }
}

/// Get the current time as milliseconds since the clock's epoch.
pub fn now_millis<C: Clock>(clock: &C) -> Result<u64, ClockError> {
  clock.try_now()
       .and_then(|now| {
         Millis::try_from(now.duration_since_epoch()).map_err(|_| ClockError::Unspecified)
       })
       .map(|Millis(ms)| ms)
}

#[cfg(test)]
pub(crate) mod test {
  use embedded_time::rate::Fraction;
  use embedded_time::Clock as _;

  use super::*;

  /// A clock whose "now" is driven by a raw pointer to a `u64`, so tests
  /// can advance time deterministically without sleeping.
  pub struct FakeClock(pub *const u64);

  impl FakeClock {
    pub fn new(time_ptr: *const u64) -> Self {
      Self(time_ptr)
    }
  }

  impl embedded_time::Clock for FakeClock {
    type T = u64;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

    fn try_now(&self) -> Result<Instant<Self>, ClockError> {
      unsafe { Ok(Instant::new(*self.0)) }
    }
  }

  #[test]
  fn now_millis_reads_through_clock() {
    let t = 4200u64;
    let clock = FakeClock::new(&t as *const _);
    assert_eq!(now_millis(&clock).unwrap(), 4200);
  }
}
