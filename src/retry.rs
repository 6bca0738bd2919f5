//! A non-blocking retransmission timer driven by [`crate::txparams::TxParams`].
//!
//! Grounded in the teacher's `retry::RetryTimer`, specialized to the single
//! "initial random draw, then double every attempt" strategy §4.2 and §4.3's
//! retransmission sweep call for (the teacher additionally supports a flat
//! `Delay` strategy that nothing in this spec needs).

use crate::txparams::TxParams;

/// A number of attempts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempts(pub u8);

/// Result of [`RetryTimer::what_should_i_do`].
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted; the request should be finalized with
  /// `ResponseTimeoutError`.
  Cry,
  /// A retry should be performed now.
  Retry,
}

/// Per-request exponential-backoff retransmission timer.
///
/// Tracks, for one tracked CON request: how long until the next retry is
/// due, and how many attempts remain.
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer {
  /// Absolute time (ms since epoch) the timer was started.
  start_ms: u64,
  /// Current retransmission timeout, doubled after each attempt.
  timeout_ms: u32,
  attempts: Attempts,
  max_attempts: Attempts,
  /// Absolute time (ms since epoch) the next retry is due.
  fire_at_ms: u64,
}

impl RetryTimer {
  /// Start a new timer at `now_ms`, drawing the initial timeout from
  /// `params` using `rand_seed` for jitter.
  pub fn new(now_ms: u64, params: &TxParams, rand_seed: u64) -> Self {
    let timeout_ms = params.initial_timeout_ms_seeded(rand_seed);
    Self { start_ms: now_ms,
           timeout_ms,
           attempts: Attempts(0),
           max_attempts: Attempts(params.max_retransmit),
           fire_at_ms: now_ms + timeout_ms as u64 }
  }

  /// Absolute time (ms since epoch) this timer will next fire.
  pub fn fire_at_ms(&self) -> u64 {
    self.fire_at_ms
  }

  /// How many retransmit attempts remain.
  pub fn remaining(&self) -> u8 {
    self.max_attempts.0.saturating_sub(self.attempts.0)
  }

  /// Should the caller retry or give up, given the current time?
  ///
  /// When `Retry` is returned, the timer's internal state has already been
  /// advanced (timeout doubled, attempt counted, next fire time set) so the
  /// caller does not need to call this twice for the same attempt.
  pub fn what_should_i_do(&mut self, now_ms: u64) -> Option<YouShould> {
    if now_ms < self.fire_at_ms {
      return None;
    }

    if self.attempts >= self.max_attempts {
      return Some(YouShould::Cry);
    }

    self.attempts.0 += 1;
    self.timeout_ms *= 2;
    self.fire_at_ms = now_ms + self.timeout_ms as u64;

    Some(YouShould::Retry)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn retries_then_gives_up() {
    let params = TxParams { ack_timeout_ms: 1_000,
                            random_factor_numer: 1,
                            random_factor_denom: 1,
                            max_retransmit: 2,
                            ..TxParams::default() };
    let mut t = RetryTimer::new(0, &params, 1);
    assert_eq!(t.fire_at_ms(), 1_000);

    assert_eq!(t.what_should_i_do(500), None);
    assert_eq!(t.what_should_i_do(1_000), Some(YouShould::Retry));
    assert_eq!(t.fire_at_ms(), 1_000 + 2_000);

    assert_eq!(t.what_should_i_do(2_999), None);
    assert_eq!(t.what_should_i_do(3_000), Some(YouShould::Retry));
    assert_eq!(t.fire_at_ms(), 3_000 + 4_000);

    assert_eq!(t.what_should_i_do(7_000), Some(YouShould::Cry));
  }
}
