//! Multicast Listener Registration Client (§4.11): tracks this device's
//! and its proxied children's multicast subscriptions and keeps them
//! registered with the primary backbone router.
//!
//! Grounded in `original_source/src/core/backbone_router/mlr_manager.cpp`
//! for the state machine shape (`ToRegister`/`Registering`/`Registered`,
//! batching into `kIPv6AddressesNumMax`-sized POSTs, retry-on-failure);
//! reimplemented against this crate's own address/rng types rather than
//! OpenThread's `Ip6::Address`.

use rand::Rng;

use crate::error::{Error, Result};

/// Registration state of one tracked multicast address (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
  /// Needs to be included in the next registration POST.
  ToRegister,
  /// Included in an in-flight registration POST, awaiting response.
  Registering,
  /// Confirmed registered with the backbone router.
  Registered,
}

/// Outcome of a completed registration POST, as reported by the
/// backbone router (§4.11 "On response").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterStatus {
  /// All addresses in the batch were accepted.
  Success,
  /// Some other status, or a subset of addresses failed; retry those
  /// (or, with no per-address list, the whole batch).
  Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
  address: [u8; 16],
  state: RegistrationState,
}

/// The MLR Client (§4.11). Owns the registration-state table; sending
/// the actual POST to the backbone router's service ALOC is the
/// caller's job (via [`crate::agent::Agent`]) once [`MlrClient::next_batch`]
/// names the addresses to send.
#[derive(Debug)]
pub struct MlrClient {
  entries: Vec<Entry>,
  max_addresses: usize,
  capacity: usize,
  mlr_timeout_s: u32,
  reregistration_delay_s: u32,
}

impl MlrClient {
  /// A client bounded to `capacity` tracked addresses, batching up to
  /// `max_addresses` (`Config::capacities::max_mlr_addresses`,
  /// `kIPv6AddressesNumMax`) per registration POST.
  pub fn new(capacity: usize, max_addresses: usize, mlr_timeout_s: u32, reregistration_delay_s: u32) -> Self {
    Self { entries: Vec::new(), max_addresses, capacity, mlr_timeout_s, reregistration_delay_s }
  }

  /// Start tracking `address` (netif-subscribe or proxied-child event,
  /// §4.11 "Triggered by"). No-op if already tracked.
  pub fn subscribe(&mut self, address: [u8; 16]) -> Result<()> {
    if self.entries.iter().any(|e| e.address == address) {
      return Ok(());
    }
    if self.entries.len() >= self.capacity {
      return Err(Error::NoBufs);
    }
    self.entries.push(Entry { address, state: RegistrationState::ToRegister });
    Ok(())
  }

  /// Stop tracking `address` entirely (netif-unsubscribe). The backbone
  /// router's own registration lease simply expires; Thread's MLR
  /// protocol has no explicit deregister message.
  pub fn unsubscribe(&mut self, address: &[u8; 16]) {
    self.entries.retain(|e| &e.address != address);
  }

  pub fn state_of(&self, address: &[u8; 16]) -> Option<RegistrationState> {
    self.entries.iter().find(|e| &e.address == address).map(|e| e.state)
  }

  /// Collect up to `max_addresses` addresses currently `ToRegister`,
  /// mark them `Registering`, and return them as the next POST body
  /// (§4.11 "On trigger, schedule a registration"). Empty if nothing is
  /// pending.
  pub fn next_batch(&mut self) -> Vec<[u8; 16]> {
    let mut batch = Vec::new();
    for entry in &mut self.entries {
      if batch.len() >= self.max_addresses {
        break;
      }
      if entry.state == RegistrationState::ToRegister {
        entry.state = RegistrationState::Registering;
        batch.push(entry.address);
      }
    }
    batch
  }

  /// Apply a registration POST's result.
  ///
  /// `failed` lists addresses the backbone router rejected; `None`
  /// means a generic failure covering the whole batch. On `Success`
  /// with an empty `failed` list, every `Registering` address in
  /// `sent` becomes `Registered`; anything else is retried after a
  /// random `[1, reregistration_delay_s]` second backoff, returned per
  /// address so the caller can schedule the retry.
  pub fn handle_response(&mut self,
                          sent: &[[u8; 16]],
                          status: RegisterStatus,
                          failed: Option<&[[u8; 16]]>,
                          rand: &mut impl Rng)
                          -> Vec<([u8; 16], u32)> {
    let mut retry_delays = Vec::new();

    for &address in sent {
      let Some(entry) = self.entries.iter_mut().find(|e| e.address == address) else { continue };
      if entry.state != RegistrationState::Registering {
        continue;
      }

      let failed_here = match (status, failed) {
        | (RegisterStatus::Success, None) => false,
        | (RegisterStatus::Success, Some(list)) => list.contains(&address),
        | (RegisterStatus::Failure, _) => true,
      };

      if failed_here {
        entry.state = RegistrationState::ToRegister;
        retry_delays.push((address, rand.gen_range(1..=self.reregistration_delay_s)));
      } else {
        entry.state = RegistrationState::Registered;
      }
    }

    retry_delays
  }

  /// Move every `Registered` address back to `ToRegister` so the next
  /// trigger re-registers it (§4.11 "Reregistration after the MLR
  /// timeout").
  pub fn expire_all_registered(&mut self) {
    for entry in &mut self.entries {
      if entry.state == RegistrationState::Registered {
        entry.state = RegistrationState::ToRegister;
      }
    }
  }

  /// A random delay, in seconds, before the next full reregistration
  /// sweep (§4.11: `((mlr_timeout/2)+1, mlr_timeout−9)`).
  pub fn next_reregistration_delay_s(&self, rand: &mut impl Rng) -> u32 {
    let low = self.mlr_timeout_s / 2 + 1;
    let high = self.mlr_timeout_s.saturating_sub(9).max(low);
    rand.gen_range(low..=high)
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
