//! MeshCoP Commissioner (§4.8): the `{Disabled, Petitioning, Active}`
//! state machine, its joiner table, and the joiner admission path.
//!
//! The DTLS handshake itself and the transport of petition/keep-alive/
//! relay messages are external collaborators (§1 Non-goals: "the DTLS
//! stack", consumed via the interfaces in §6); this module owns only the
//! state transitions and table bookkeeping, returning the small
//! [`Action`]/outcome values a host wires into those collaborators --
//! the same separation the teacher keeps between `core::Core` (owns
//! state) and `Socket`/`Clock` (external effectful collaborators).

use crate::error::{Error, Result};
use crate::config::CommissionerConfig;
use crate::meshcop::dataset::State as FinalizeState;
use crate::meshcop::steering::SteeringData;
use crate::time::Clock;

/// Commissioner FSM states (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Disabled,
  Petitioning,
  Active,
}

/// What a commissioner `tick` or petition/keep-alive timeout asks the
/// host to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  /// (Re)send the petition request to the leader.
  SendPetition,
  /// Send a keep-alive to the leader (`kKeepAliveTimeout/2`, §4.8).
  SendKeepAlive,
}

/// A joiner table entry matches either a specific EUI64 or any joiner
/// (§9 "any-joiner wildcard": `{Wildcard, Exact(Eui64)}` rather than a
/// boolean alongside an ignored EUI64 field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinerMatch {
  Wildcard,
  Exact([u8; 8]),
}

/// One entry in the joiner table (§4.8 "Joiner Table").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinerEntry {
  pub id: JoinerMatch,
  pub psk: Vec<u8>,
  pub expiration_time_ms: u64,
}

/// Compute the joiner-id a joiner's relay-rx/DTLS traffic is attributed
/// under, from its EUI64. A full derivation hashes the EUI64; this sets
/// the locally-administered bit of the first octet, the same
/// transform the IID a joiner derives its link-local address from uses.
pub fn joiner_id(eui64: &[u8; 8]) -> [u8; 8] {
  let mut id = *eui64;
  id[0] |= 0x02;
  id
}

/// The MeshCoP Commissioner (§4.8).
pub struct Commissioner<C: Clock> {
  state: State,
  config: CommissionerConfig,
  attempts: u8,
  session_id: Option<u16>,
  max_joiners: usize,
  joiners: Vec<JoinerEntry>,
  keep_alive_due_ms: Option<u64>,
  _clock: core::marker::PhantomData<C>,
}

impl<C: Clock> core::fmt::Debug for Commissioner<C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Commissioner")
     .field("state", &self.state)
     .field("config", &self.config)
     .field("attempts", &self.attempts)
     .field("session_id", &self.session_id)
     .field("max_joiners", &self.max_joiners)
     .field("joiners", &self.joiners)
     .field("keep_alive_due_ms", &self.keep_alive_due_ms)
     .finish()
  }
}

impl<C: Clock> Commissioner<C> {
  /// A disabled commissioner with an empty joiner table bounded to
  /// `max_joiners` entries (`Config::capacities::max_joiners`).
  pub fn new(config: CommissionerConfig, max_joiners: usize) -> Self {
    Self { state: State::Disabled,
           config,
           attempts: 0,
           session_id: None,
           max_joiners,
           joiners: Vec::new(),
           keep_alive_due_ms: None,
           _clock: core::marker::PhantomData }
  }

  /// Current FSM state.
  pub fn state(&self) -> State {
    self.state
  }

  /// Disabled → Petitioning (§4.8): opens the DTLS server for joiners
  /// (host responsibility) and asks the caller to send the petition.
  pub fn start(&mut self) -> Result<Action> {
    if self.state != State::Disabled {
      return Err(Error::InvalidState);
    }
    self.state = State::Petitioning;
    self.attempts = 0;
    Ok(Action::SendPetition)
  }

  /// A petition response arrived. `Accept` carries the commissioner
  /// session id (§4.8).
  pub fn handle_petition_response(&mut self, accepted: bool, session_id: u16, now_ms: u64) -> Result<()> {
    if self.state != State::Petitioning {
      return Err(Error::InvalidState);
    }
    if accepted {
      self.session_id = Some(session_id);
      self.state = State::Active;
      self.keep_alive_due_ms = Some(now_ms + u64::from(self.config.keep_alive_timeout_ms) / 2);
    } else {
      self.state = State::Disabled;
    }
    Ok(())
  }

  /// No petition response arrived in time. Retries up to
  /// `kPetitionRetryCount` (§4.8) before giving up.
  pub fn petition_timed_out(&mut self) -> Action {
    self.attempts += 1;
    if self.attempts > self.config.petition_retry_count {
      self.state = State::Disabled;
      Action::SendPetition
    } else {
      Action::SendPetition
    }
  }

  /// Whether the last `petition_timed_out` call exhausted the retry budget.
  pub fn petition_exhausted(&self) -> bool {
    self.state == State::Disabled && self.attempts > self.config.petition_retry_count
  }

  /// Keep-alive response arrived (or was missing, per the caller's
  /// judgment) while Active. `Reject`/timeout returns to Disabled.
  pub fn handle_keep_alive_response(&mut self, ok: bool, now_ms: u64) {
    if self.state != State::Active {
      return;
    }
    if ok {
      self.keep_alive_due_ms = Some(now_ms + u64::from(self.config.keep_alive_timeout_ms) / 2);
    } else {
      self.state = State::Disabled;
      self.session_id = None;
    }
  }

  /// Local `Stop` call (§4.8 "Active → Disabled... local Stop call").
  pub fn stop(&mut self) {
    self.state = State::Disabled;
    self.session_id = None;
    self.keep_alive_due_ms = None;
  }

  /// Poll for a due keep-alive while Active.
  pub fn tick(&mut self, now_ms: u64) -> Option<Action> {
    if self.state != State::Active {
      return None;
    }
    let due = self.keep_alive_due_ms?;
    (now_ms >= due).then_some(Action::SendKeepAlive)
  }

  /// Add (or replace, by EUI64) a joiner entry (§4.8: "Adding a joiner
  /// replaces any prior with the same EUI64"). `timeout_s` of `None`
  /// means no expiration.
  pub fn add_joiner(&mut self, id: JoinerMatch, psk: &[u8], timeout_s: Option<u32>, now_ms: u64) -> Result<()> {
    self.remove_joiner(id);

    if self.joiners.len() >= self.max_joiners {
      return Err(Error::NoBufs);
    }

    let expiration_time_ms = now_ms + u64::from(timeout_s.unwrap_or(u32::MAX)) * 1000;
    self.joiners.push(JoinerEntry { id, psk: psk.to_vec(), expiration_time_ms });
    Ok(())
  }

  /// Remove a joiner entry by id, if present.
  pub fn remove_joiner(&mut self, id: JoinerMatch) -> Option<JoinerEntry> {
    let ix = self.joiners.iter().position(|j| j.id == id)?;
    Some(self.joiners.remove(ix))
  }

  /// Remove joiner entries whose `expiration_time_ms` has passed,
  /// returning how many were reaped (§4.8 "Joiner-expiration timer").
  pub fn expire_joiners(&mut self, now_ms: u64) -> usize {
    let before = self.joiners.len();
    self.joiners.retain(|j| j.expiration_time_ms > now_ms);
    before - self.joiners.len()
  }

  /// Find a joiner table entry whose id matches `candidate` (wildcard or exact).
  pub fn find_joiner(&self, candidate: &[u8; 8]) -> Option<&JoinerEntry> {
    self.joiners.iter().find(|j| match j.id {
                          | JoinerMatch::Wildcard => true,
                          | JoinerMatch::Exact(id) => id == *candidate,
                        })
  }

  /// The steering-data TLV value covering every joiner in the table
  /// (§4.8: "sends a `MGMT_COMMISSIONER_SET`... steering-data TLV is
  /// the Bloom filter of all joiner-IDs"), sized to `len` bytes.
  pub fn steering_data(&self, len: usize) -> SteeringData {
    if self.joiners.iter().any(|j| j.id == JoinerMatch::Wildcard) {
      return SteeringData::any(len);
    }
    let mut sd = SteeringData::empty(len);
    for j in &self.joiners {
      if let JoinerMatch::Exact(id) = j.id {
        sd.add(&id);
      }
    }
    sd
  }

  /// Process a `joiner-finalize` request (§4.8 step 5): compare the
  /// joiner's provisioning URL against `configured_url` and answer
  /// `Accept`/`Reject`. Returns the removal deadline to schedule
  /// (`now_ms + kRemoveJoinerDelay`), unless the matched entry is a
  /// wildcard (never scheduled for removal, §4.8 step 6).
  pub fn process_joiner_finalize(&mut self,
                                  joiner_id: [u8; 8],
                                  provisioning_url: &str,
                                  configured_url: &str,
                                  now_ms: u64)
                                  -> (FinalizeState, Option<u64>) {
    let Some(entry) = self.find_joiner(&joiner_id) else {
      return (FinalizeState::Reject, None);
    };

    let state =
      if provisioning_url == configured_url { FinalizeState::Accept } else { FinalizeState::Reject };

    let remove_at = match entry.id {
      | JoinerMatch::Wildcard => None,
      | JoinerMatch::Exact(_) => {
        Some(now_ms + u64::from(self.config.remove_joiner_delay_s) * 1000)
      },
    };

    (state, remove_at)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::time::test::FakeClock;

  fn cfg() -> CommissionerConfig {
    CommissionerConfig::default()
  }

  #[test]
  fn start_moves_disabled_to_petitioning() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    assert_eq!(c.start().unwrap(), Action::SendPetition);
    assert_eq!(c.state(), State::Petitioning);
  }

  #[test]
  fn accepted_petition_moves_to_active_and_schedules_keep_alive() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    c.start().unwrap();
    c.handle_petition_response(true, 7, 0).unwrap();
    assert_eq!(c.state(), State::Active);
    assert_eq!(c.tick(0), None);
    assert_eq!(c.tick(cfg().keep_alive_timeout_ms as u64 / 2), Some(Action::SendKeepAlive));
  }

  #[test]
  fn rejected_petition_returns_to_disabled() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    c.start().unwrap();
    c.handle_petition_response(false, 0, 0).unwrap();
    assert_eq!(c.state(), State::Disabled);
  }

  #[test]
  fn petition_retries_exhaust_after_configured_count() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    c.start().unwrap();
    for _ in 0..cfg().petition_retry_count {
      c.petition_timed_out();
      assert!(!c.petition_exhausted());
    }
    c.petition_timed_out();
    assert!(c.petition_exhausted());
  }

  #[test]
  fn adding_joiner_with_same_eui64_replaces_prior_entry() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    let eui = [1u8; 8];
    c.add_joiner(JoinerMatch::Exact(eui), b"psk1", None, 0).unwrap();
    c.add_joiner(JoinerMatch::Exact(eui), b"psk2", None, 0).unwrap();

    assert_eq!(c.joiners.len(), 1);
    assert_eq!(c.find_joiner(&eui).unwrap().psk, b"psk2");
  }

  #[test]
  fn wildcard_joiner_id_matches_anything_and_fills_steering_data() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    c.add_joiner(JoinerMatch::Wildcard, b"psk", None, 0).unwrap();

    assert!(c.find_joiner(&[9u8; 8]).is_some());
    assert!(c.steering_data(4).contains(&[9u8; 8]));
  }

  #[test]
  fn finalize_accepts_matching_url_and_schedules_removal_for_exact_entry() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    let eui = [2u8; 8];
    let jid = joiner_id(&eui);
    c.add_joiner(JoinerMatch::Exact(jid), b"psk", None, 1_000).unwrap();

    let (state, remove_at) = c.process_joiner_finalize(jid, "example.com", "example.com", 1_000);
    assert_eq!(state, FinalizeState::Accept);
    assert_eq!(remove_at, Some(1_000 + cfg().remove_joiner_delay_s as u64 * 1000));
  }

  #[test]
  fn finalize_rejects_mismatched_url() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    let eui = [3u8; 8];
    let jid = joiner_id(&eui);
    c.add_joiner(JoinerMatch::Exact(jid), b"psk", None, 0).unwrap();

    let (state, _) = c.process_joiner_finalize(jid, "evil.example", "example.com", 0);
    assert_eq!(state, FinalizeState::Reject);
  }

  #[test]
  fn expire_joiners_reaps_past_deadline() {
    let mut c = Commissioner::<FakeClock>::new(cfg(), 8);
    c.add_joiner(JoinerMatch::Exact([4u8; 8]), b"psk", Some(10), 0).unwrap();
    assert_eq!(c.expire_joiners(5_000), 0);
    assert_eq!(c.expire_joiners(11_000), 1);
  }
}
