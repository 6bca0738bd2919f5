//! Runtime configuration.
//!
//! One aggregate `Config` struct with a literal-matching `Default`, in the
//! same doc-tested style as the teacher's `config::Config`/`Msg`/`Con`/`Non`.

use crate::txparams::TxParams;

/// Response-cache and table capacities, all fixed at compile time per the
/// "no heap required for runtime tables" non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
  /// `MaxCacheSize` (§4.4): bound on the response cache.
  pub max_cache_size: usize,
  /// Bound on the number of simultaneously pending (tracked) requests.
  pub max_pending_requests: usize,
  /// `kMaxRouters` (§4.10): bound on the MLE router table.
  pub max_routers: usize,
  /// Bound on the MeshCoP commissioner's joiner table.
  pub max_joiners: usize,
  /// `kIPv6AddressesNumMax` (§4.11): bound on one MLR registration batch.
  pub max_mlr_addresses: usize,
}

impl Default for Capacities {
  fn default() -> Self {
    Self { max_cache_size: 8,
           max_pending_requests: 16,
           max_routers: 32,
           max_joiners: 8,
           max_mlr_addresses: 6 }
  }
}

/// MeshCoP Commissioner timing knobs (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionerConfig {
  /// Petition retransmit attempts before giving up and returning to Disabled.
  pub petition_retry_count: u8,
  /// Half of this is the commissioner keep-alive period, once Active.
  pub keep_alive_timeout_ms: u32,
  /// Delay after a successful joiner-finalize before the joiner entry is removed.
  pub remove_joiner_delay_s: u32,
}

impl Default for CommissionerConfig {
  fn default() -> Self {
    Self { petition_retry_count: 2,
           keep_alive_timeout_ms: 50_000,
           remove_joiner_delay_s: 30 }
  }
}

/// MeshCoP Joiner-Router timing knobs (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinerRouterConfig {
  /// Delay between a successful finalize and sending the joiner-entrust message.
  pub joiner_entrust_tx_delay_ms: u32,
  /// Default joiner UDP port when network data doesn't specify one.
  pub default_joiner_udp_port: u16,
}

impl Default for JoinerRouterConfig {
  fn default() -> Self {
    Self { joiner_entrust_tx_delay_ms: 500,
           default_joiner_udp_port: 1000 }
  }
}

/// MLE Router Table constants (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MleConfig {
  /// `kMaxRouteCost` (16): a cost at or above this is "unreachable".
  pub max_route_cost: u8,
  /// `kRouterIdReuseDelay` (100s): time a released router-id stays unusable.
  pub router_id_reuse_delay_s: u32,
  /// `kMaxRoutersInRouteTlvForLinkAccept`.
  pub max_routers_in_route_tlv_for_link_accept: usize,
  /// `kLinkAcceptSequenceRollback`.
  pub link_accept_sequence_rollback: u8,
}

impl Default for MleConfig {
  fn default() -> Self {
    Self { max_route_cost: 16,
           router_id_reuse_delay_s: 100,
           max_routers_in_route_tlv_for_link_accept: 9,
           link_accept_sequence_rollback: 1 }
  }
}

/// MLR Client timing knobs (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlrConfig {
  /// Registration lifetime requested from the backbone router, in seconds.
  pub mlr_timeout_s: u32,
  /// Upper bound (inclusive) of the random re-registration retry delay.
  pub reregistration_delay_s: u32,
}

impl Default for MlrConfig {
  fn default() -> Self {
    Self { mlr_timeout_s: 300, reregistration_delay_s: 300 }
  }
}

/// Top-level runtime config for an [`crate::agent::Agent`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Default transmission parameters for outgoing CON/NON requests.
  pub tx_params: TxParams,
  /// Table/cache capacities.
  pub capacities: Capacities,
  /// See [`CommissionerConfig`].
  pub commissioner: CommissionerConfig,
  /// See [`JoinerRouterConfig`].
  pub joiner_router: JoinerRouterConfig,
  /// See [`MleConfig`].
  pub mle: MleConfig,
  /// See [`MlrConfig`].
  pub mlr: MlrConfig,
  /// Seed used to generate message tokens, customizable so distinct
  /// devices in a swarm generate tokens less guessably.
  pub token_seed: u16,
  /// Default CoAP port (§6): 5683.
  pub coap_port: u16,
  /// Backbone TMF port (§6): 61631.
  pub backbone_tmf_port: u16,
}

impl Default for Config {
  fn default() -> Self {
    Self { tx_params: TxParams::default(),
           capacities: Capacities::default(),
           commissioner: CommissionerConfig::default(),
           joiner_router: JoinerRouterConfig::default(),
           mle: MleConfig::default(),
           mlr: MlrConfig::default(),
           token_seed: 0,
           coap_port: 5683,
           backbone_tmf_port: 61631 }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults() {
    let c = Config::default();
    assert_eq!(c.coap_port, 5683);
    assert_eq!(c.backbone_tmf_port, 61631);
    assert_eq!(c.capacities.max_cache_size, 8);
    assert_eq!(c.mle.max_route_cost, 16);
    assert_eq!(c.mle.router_id_reuse_delay_s, 100);
  }
}
