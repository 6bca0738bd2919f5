//! Transmission Parameters (§4.2): the per-transaction knobs controlling
//! CON retransmission, and the RFC 7252-derived quantities computed from
//! them.
//!
//! Grounded in the teacher's `config::Con`/`retry::Strategy`, but
//! restructured to match the spec's literal single-`TxParams` shape
//! (`ack_timeout`, `random_factor`, `max_retransmits`, `max_latency`)
//! rather than the teacher's split acked/unacked exponential strategies.

use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Per-transaction retransmission knobs (RFC 7252 §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
  /// Initial ack timeout, in milliseconds. Zero is only legal for
  /// non-confirmable (fire-and-forget) transmissions.
  pub ack_timeout_ms: u32,
  /// Random factor numerator/denominator; the first retransmission timeout
  /// is drawn uniformly from `[ack_timeout, ack_timeout * numer/denom]`.
  pub random_factor_numer: u32,
  /// See [`TxParams::random_factor_numer`].
  pub random_factor_denom: u32,
  /// Maximum number of retransmits before giving up.
  pub max_retransmit: u8,
  /// Maximum latency the network is expected to introduce, in milliseconds.
  pub max_latency_ms: u32,
}

impl Default for TxParams {
  fn default() -> Self {
    Self { ack_timeout_ms: 2_000,
           random_factor_numer: 3,
           random_factor_denom: 2,
           max_retransmit: 4,
           max_latency_ms: 100_000 }
  }
}

/// `ack_timeout` below which a nonzero value is rejected by [`TxParams::validate`].
pub const MIN_ACK_TIMEOUT_MS: u32 = 1;

impl TxParams {
  /// Validate this set of parameters per §4.2:
  /// `denom > 0`, `numer >= denom`, `ack_timeout >= MIN_ACK_TIMEOUT_MS`
  /// (unless this is for a non-confirmable transmission), `max_retx <= 30`.
  pub fn validate(&self, confirmable: bool) -> Result<()> {
    if self.random_factor_denom == 0 {
      return Err(Error::InvalidArgs);
    }
    if self.random_factor_numer < self.random_factor_denom {
      return Err(Error::InvalidArgs);
    }
    if confirmable && self.ack_timeout_ms < MIN_ACK_TIMEOUT_MS {
      return Err(Error::InvalidArgs);
    }
    if self.max_retransmit > 30 {
      return Err(Error::InvalidArgs);
    }
    Ok(())
  }

  /// Draw the initial retransmission timeout uniformly from
  /// `[ack_timeout, ack_timeout * numer/denom]`.
  pub fn initial_timeout_ms(&self, rand: &mut rand_chacha::ChaCha8Rng) -> u32 {
    let max = (self.ack_timeout_ms as u64 * self.random_factor_numer as u64
               / self.random_factor_denom as u64) as u32;

    if max <= self.ack_timeout_ms {
      self.ack_timeout_ms
    } else {
      rand.gen_range(self.ack_timeout_ms..=max)
    }
  }

  /// Seed a fresh RNG and draw the initial timeout from it. Convenience for
  /// call sites that don't otherwise need an RNG handle.
  pub fn initial_timeout_ms_seeded(&self, seed: u64) -> u32 {
    let mut rand = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    self.initial_timeout_ms(&mut rand)
  }

  /// `exchange_lifetime = ack_timeout * (2^(max_retx+1) - 1) * numer/denom
  ///                      + 2*max_latency + ack_timeout`
  pub fn exchange_lifetime_ms(&self) -> u64 {
    let span = self.max_transmit_span_ms();
    span + 2 * self.max_latency_ms as u64 + self.ack_timeout_ms as u64
  }

  /// `max_transmit_span = ack_timeout * (2^(max_retx+1) - 1) * numer/denom`
  ///
  /// The total time between the first transmission and the last retransmit.
  pub fn max_transmit_span_ms(&self) -> u64 {
    let factor = (1u64 << (self.max_retransmit as u32 + 1)) - 1;
    self.ack_timeout_ms as u64 * factor * self.random_factor_numer as u64
    / self.random_factor_denom as u64
  }

  /// `max_transmit_wait = ack_timeout * (2^(max_retx+2) - 1) * numer/denom`
  pub fn max_transmit_wait_ms(&self) -> u64 {
    let factor = (1u64 << (self.max_retransmit as u32 + 2)) - 1;
    self.ack_timeout_ms as u64 * factor * self.random_factor_numer as u64
    / self.random_factor_denom as u64
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults_match_rfc7252() {
    let p = TxParams::default();
    assert_eq!(p.ack_timeout_ms, 2_000);
    assert_eq!((p.random_factor_numer, p.random_factor_denom), (3, 2));
    assert_eq!(p.max_retransmit, 4);
  }

  #[test]
  fn exchange_lifetime_matches_scenario_b() {
    // Scenario B: 2000 + 4000 + 8000 + 16000 + 32000 = 62000ms span of sends,
    // exchange_lifetime adds 2*max_latency + ack_timeout on top of the span.
    let p = TxParams::default();
    assert_eq!(p.max_transmit_span_ms(), 2_000 + 4_000 + 8_000 + 16_000 + 32_000);
    assert_eq!(p.exchange_lifetime_ms(), 62_000 + 2 * 100_000 + 2_000);
  }

  #[test]
  fn validate_rejects_bad_random_factor() {
    let mut p = TxParams::default();
    p.random_factor_denom = 0;
    assert_eq!(p.validate(true), Err(Error::InvalidArgs));

    let mut p = TxParams::default();
    p.random_factor_numer = 1;
    p.random_factor_denom = 2;
    assert_eq!(p.validate(true), Err(Error::InvalidArgs));
  }

  #[test]
  fn validate_allows_zero_ack_timeout_for_non_confirmable() {
    let mut p = TxParams::default();
    p.ack_timeout_ms = 0;
    assert!(p.validate(false).is_ok());
  }

  #[test]
  fn initial_timeout_within_bounds() {
    let p = TxParams::default();
    let mut rand = rand_chacha::ChaCha8Rng::seed_from_u64(7);
    for _ in 0..50 {
      let t = p.initial_timeout_ms(&mut rand);
      assert!(t >= p.ack_timeout_ms);
      assert!(t <= p.ack_timeout_ms * 3 / 2);
    }
  }
}
