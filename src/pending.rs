//! Pending-Request Table (§4.5): the set of outstanding requests the
//! agent is tracking for a response and/or retransmitting.
//!
//! The spec's intrusive FIFO is adapted to a plain `Vec`-backed table
//! bounded to `Config::capacities::max_pending_requests` entries --
//! grounded in the teacher's `Core::retry_q`/`fling_q` (`ArrayVec<[Option<T>; 16]>`)
//! but using `swap_remove`-free indexed removal so iteration stays valid
//! across the re-entrant removal the spec calls out (a response handler
//! cancelling its own transaction mid-sweep).

use no_std_net::SocketAddr;
use toad_msg::{Id, Token};

use crate::msg::Message;
use crate::retry::RetryTimer;

/// Why a pending request was removed from the table, passed to the
/// caller so it can run the matching finalize-handler logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// A piggy-backed or separate response arrived and matched.
  Delivered,
  /// An empty ACK arrived for a non-Observe request with no handler
  /// (implicit success, fire-and-forget).
  ImplicitlyAcknowledged,
  /// An RST arrived, or the peer otherwise aborted the exchange.
  Aborted,
  /// Retransmit attempts were exhausted with no response.
  TimedOut,
  /// The caller cancelled the transaction directly (e.g. a response
  /// handler cancelling its own subscription).
  Cancelled,
}

/// Callback invoked when a tracked request reaches a terminal outcome
/// (or, for an Observe subscription, on every notification).
pub type ResponseHandler = Box<dyn FnMut(Outcome, Option<Message>) + Send>;

/// One tracked outstanding request (§3 "Request metadata").
pub struct PendingRequest {
  /// The stored body, a clone of what was transmitted, used for retries.
  pub message: Message,
  pub(crate) peer: SocketAddr,
  pub(crate) multicast: bool,
  /// True once a matching empty ACK has been seen (separate-response pattern).
  pub acknowledged: bool,
  /// True for CON requests, which are eligible for retransmission.
  pub confirmable: bool,
  /// True if this entry is an Observe subscription: it is not retransmitted
  /// and lives until explicitly cancelled rather than timing out.
  pub observe: bool,
  /// True if this entry tracks an outgoing request (vs. an outgoing
  /// server-side notification, which is also Observe-tracked).
  pub is_request: bool,
  pub(crate) retry: Option<RetryTimer>,
  /// Invoked when this entry reaches a terminal outcome.
  pub handler: Option<ResponseHandler>,
}

impl core::fmt::Debug for PendingRequest {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PendingRequest")
     .field("message", &self.message)
     .field("peer", &self.peer)
     .field("multicast", &self.multicast)
     .field("acknowledged", &self.acknowledged)
     .field("confirmable", &self.confirmable)
     .field("observe", &self.observe)
     .field("is_request", &self.is_request)
     .field("retry", &self.retry)
     .field("handler", &self.handler.as_ref().map(|_| "ResponseHandler"))
     .finish()
  }
}

impl PendingRequest {
  /// The message-id this entry is tracked under.
  pub fn id(&self) -> Id {
    self.message.id
  }

  /// The token this entry is tracked under.
  pub fn token(&self) -> Token {
    self.message.token
  }

  /// Whether `peer` is an acceptable source for a reply to this entry,
  /// per the §4.3 matching-rules leniency (multicast/anycast sends may
  /// be answered by any router).
  pub fn accepts_reply_from(&self, peer: SocketAddr) -> bool {
    self.peer == peer || self.multicast
  }
}

/// The bounded table of outstanding requests the agent tracks (§4.5).
#[derive(Debug)]
pub struct PendingTable {
  entries: Vec<Option<PendingRequest>>,
  capacity: usize,
}

impl PendingTable {
  /// Create an empty table bounded to `capacity` entries
  /// (`Config::capacities::max_pending_requests`, default 16).
  pub fn new(capacity: usize) -> Self {
    Self { entries: Vec::with_capacity(capacity), capacity }
  }

  /// Number of entries currently tracked (including any `None` holes
  /// left by in-progress removal).
  pub fn len(&self) -> usize {
    self.entries.iter().filter(|e| e.is_some()).count()
  }

  /// True if no requests are tracked.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Enqueue `req`, returning [`crate::error::Error::NoBufs`] if the
  /// table is already at capacity.
  pub fn insert(&mut self, req: PendingRequest) -> Result<(), crate::error::Error> {
    if let Some(hole) = self.entries.iter_mut().find(|e| e.is_none()) {
      *hole = Some(req);
      return Ok(());
    }
    if self.entries.len() >= self.capacity {
      return Err(crate::error::Error::NoBufs);
    }
    self.entries.push(Some(req));
    Ok(())
  }

  /// Find the first tracked request matching `token` from an acceptable
  /// peer (§4.3 "match by token" rule for CON/NON responses).
  pub fn find_by_token(&self, peer: SocketAddr, token: Token) -> Option<usize> {
    self.entries
        .iter()
        .position(|e| matches!(e, Some(r) if r.token() == token && r.accepts_reply_from(peer)))
  }

  /// Find the first tracked request matching `id` from an acceptable peer
  /// (§4.3 "match by message-id" rule for ACK/RST).
  pub fn find_by_id(&self, peer: SocketAddr, id: Id) -> Option<usize> {
    self.entries
        .iter()
        .position(|e| matches!(e, Some(r) if r.id() == id && r.accepts_reply_from(peer)))
  }

  /// Borrow the entry at `ix`, if still present.
  pub fn get(&self, ix: usize) -> Option<&PendingRequest> {
    self.entries.get(ix).and_then(|e| e.as_ref())
  }

  /// Mutably borrow the entry at `ix`, if still present.
  pub fn get_mut(&mut self, ix: usize) -> Option<&mut PendingRequest> {
    self.entries.get_mut(ix).and_then(|e| e.as_mut())
  }

  /// Remove and return the entry at `ix`. Leaves a hole (`None`) rather
  /// than shifting later elements, so an in-progress iteration by index
  /// over the table is not disturbed by a re-entrant removal (§4.5).
  pub fn remove(&mut self, ix: usize) -> Option<PendingRequest> {
    self.entries.get_mut(ix).and_then(|e| e.take())
  }

  /// Iterate indices of live entries, safe against a callback removing
  /// the current or a later entry mid-iteration (it snapshots indices
  /// up front; removed slots are simply skipped when visited).
  pub fn live_indices(&self) -> Vec<usize> {
    self.entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.is_some().then_some(i))
        .collect()
  }

  /// Remove the entry at `ix` and invoke its handler (if any) with
  /// `outcome`/`resp`. A no-op if `ix` is already empty.
  pub fn finalize(&mut self, ix: usize, outcome: Outcome, resp: Option<Message>) {
    if let Some(mut req) = self.remove(ix) {
      if let Some(h) = &mut req.handler {
        h(outcome, resp);
      }
    }
  }

  /// Invoke the handler at `ix` with `outcome`/`resp` without removing
  /// the entry (used for Observe notifications, which keep the
  /// subscription alive).
  pub fn notify(&mut self, ix: usize, outcome: Outcome, resp: Option<Message>) {
    if let Some(req) = self.get_mut(ix) {
      if let Some(h) = &mut req.handler {
        h(outcome, resp);
      }
    }
  }
}

#[cfg(test)]
mod test {
  use no_std_net::{IpAddr, Ipv4Addr};
  use toad_msg::{Code, Type};

  use super::*;

  fn peer() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 5683)
  }

  fn req(id: u16) -> PendingRequest {
    PendingRequest { message: Message::new(Type::Con, Code::GET, Id(id), Token(Default::default())),
                     peer: peer(),
                     multicast: false,
                     acknowledged: false,
                     confirmable: true,
                     observe: false,
                     is_request: true,
                     retry: None,
                     handler: None }
  }

  #[test]
  fn insert_find_remove_roundtrip() {
    let mut table = PendingTable::new(4);
    table.insert(req(1)).unwrap();
    table.insert(req(2)).unwrap();

    let ix = table.find_by_id(peer(), Id(2)).unwrap();
    assert_eq!(table.get(ix).unwrap().id(), Id(2));

    table.remove(ix);
    assert!(table.find_by_id(peer(), Id(2)).is_none());
    assert_eq!(table.len(), 1);
  }

  #[test]
  fn insert_fails_when_full() {
    let mut table = PendingTable::new(1);
    table.insert(req(1)).unwrap();
    assert!(matches!(table.insert(req(2)), Err(crate::error::Error::NoBufs)));
  }

  #[test]
  fn removal_leaves_a_reusable_hole() {
    let mut table = PendingTable::new(1);
    table.insert(req(1)).unwrap();
    let ix = table.find_by_id(peer(), Id(1)).unwrap();
    table.remove(ix);
    // the hole should be reused rather than erroring as full
    table.insert(req(2)).unwrap();
    assert_eq!(table.len(), 1);
  }
}
