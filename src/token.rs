//! Message-ID and Token generation, and the seen-id/seen-token history
//! used to detect duplicate confirmable messages (§4.2 invariants).
//!
//! Grounded in the teacher's `core::Core::{next_id, next_token, seen_id,
//! seen_token}`. The teacher keeps one history array per peer address in a
//! generic `Map`; here the per-peer history is a fixed-capacity array
//! directly (no separate map type needed since `std`/`alloc` is always on),
//! bounded by `Config::capacities::max_pending_requests` peers tracked at
//! once, each with up to 8 recent ids/tokens.

use no_std_net::SocketAddr;
use rand::{Rng, SeedableRng};
use toad_msg::{Id, Token};

use crate::time::{Clock, Stamped};

const HISTORY_PER_PEER: usize = 8;
const MAX_PEERS: usize = 16;

struct PeerHistory<C: Clock> {
  addr: SocketAddr,
  /// Bounded by hand to [`HISTORY_PER_PEER`]: neither `Id` nor `Token`
  /// implement `Default`, which `tinyvec::ArrayVec` would otherwise
  /// require of its backing storage.
  ids: Vec<Stamped<C, Id>>,
  tokens: Vec<Stamped<C, Token>>,
}

impl<C: Clock> core::fmt::Debug for PeerHistory<C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PeerHistory")
     .field("addr", &self.addr)
     .field("ids", &self.ids)
     .field("tokens", &self.tokens)
     .finish()
  }
}

impl<C: Clock> PeerHistory<C> {
  fn new(addr: SocketAddr) -> Self {
    Self { addr, ids: Vec::new(), tokens: Vec::new() }
  }
}

/// Generates message-ids and tokens unique (within the exchange lifetime)
/// per destination address, and answers "have I seen this id/token from
/// this peer before" for duplicate detection.
pub struct TokenGenerator<C: Clock> {
  /// Bounded to [`MAX_PEERS`] entries by hand (rather than a fixed-size
  /// array) since `no_std_net::SocketAddr` has no sensible `Default`,
  /// which `tinyvec::ArrayVec`'s backing storage would otherwise require.
  peers: Vec<PeerHistory<C>>,
  largest_id_seen: Option<u16>,
  rand: rand_chacha::ChaCha8Rng,
  token_seed: u16,
}

impl<C: Clock> core::fmt::Debug for TokenGenerator<C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("TokenGenerator")
     .field("peers", &self.peers)
     .field("largest_id_seen", &self.largest_id_seen)
     .field("token_seed", &self.token_seed)
     .finish_non_exhaustive()
  }
}

impl<C: Clock> TokenGenerator<C> {
  /// Create a generator whose tokens are salted with `token_seed`
  /// (`Config::token_seed`) so distinct devices in a swarm don't draw
  /// identical token sequences.
  pub fn new(token_seed: u16) -> Self {
    Self { peers: Vec::new(),
           largest_id_seen: None,
           rand: rand_chacha::ChaCha8Rng::seed_from_u64(0),
           token_seed }
  }

  /// Find or create the history entry for `addr`, evicting the
  /// least-recently-created peer if the table is full.
  fn peer_mut(&mut self, addr: SocketAddr) -> &mut PeerHistory<C> {
    if let Some(ix) = self.peers.iter().position(|p| p.addr == addr) {
      return &mut self.peers[ix];
    }

    if self.peers.len() == MAX_PEERS {
      self.peers.remove(0);
    }
    self.peers.push(PeerHistory::new(addr));
    self.peers.last_mut().unwrap()
  }

  /// Record that `id` was seen from/sent to `addr`, pruning entries older
  /// than `exchange_lifetime_ms`.
  pub fn seen_id(&mut self, clock: &C, addr: SocketAddr, id: Id, exchange_lifetime_ms: u64) {
    let now = clock.try_now().ok();
    let peer = self.peer_mut(addr);

    if let Some(now) = now {
      peer.ids.retain(|s| s.millis_since(now) < exchange_lifetime_ms);
    }

    let largest = peer.ids
                       .iter()
                       .map(|s| s.data().0)
                       .chain(core::iter::once(id.0))
                       .max();
    self.largest_id_seen = largest;

    if peer.ids.len() == HISTORY_PER_PEER {
      peer.ids.remove(0);
    }
    if let Ok(stamped) = Stamped::new(clock, id) {
      peer.ids.push(stamped);
    }
  }

  /// Record that `token` was seen from/sent to `addr`.
  pub fn seen_token(&mut self, clock: &C, addr: SocketAddr, token: Token, exchange_lifetime_ms: u64) {
    let now = clock.try_now().ok();
    let peer = self.peer_mut(addr);

    if let Some(now) = now {
      peer.tokens.retain(|s| *s.data() != token && s.millis_since(now) < exchange_lifetime_ms);
    }

    if peer.tokens.len() == HISTORY_PER_PEER {
      peer.tokens.remove(0);
    }
    if let Ok(stamped) = Stamped::new(clock, token) {
      peer.tokens.push(stamped);
    }
  }

  /// True if `id` has already been recorded for `addr` (duplicate
  /// detection for retransmitted CON requests).
  pub fn is_duplicate_id(&self, addr: SocketAddr, id: Id) -> bool {
    self.peers
        .iter()
        .find(|p| p.addr == addr)
        .map(|p| p.ids.iter().any(|s| *s.data() == id))
        .unwrap_or(false)
  }

  /// Allocate the next outgoing message-id for `addr`.
  pub fn next_id(&mut self, clock: &C, addr: SocketAddr, exchange_lifetime_ms: u64) -> Id {
    let new = match self.largest_id_seen {
      | Some(id) => Id(id.wrapping_add(1)),
      | None => Id(self.rand.gen_range(0..=255)),
    };
    self.seen_id(clock, addr, new, exchange_lifetime_ms);
    new
  }

  /// Allocate the next outgoing token for `addr`.
  ///
  /// Grounded in the teacher's `next_token`: the low-order bytes encode
  /// the current millisecond clock reading so tokens are unique across
  /// process restarts without needing persistent state.
  pub fn next_token(&mut self, clock: &C, addr: SocketAddr, exchange_lifetime_ms: u64) -> Token {
    let now_ms = crate::time::now_millis(clock).unwrap_or(0);

    let ([a, b], [c, d, e, f, g, h, i, j]) =
      (self.token_seed.to_be_bytes(), now_ms.to_be_bytes());
    let bytes = [a, b, c, d, e, f, g, h, i, j];

    let token = Token::opaque(&bytes);
    self.seen_token(clock, addr, token, exchange_lifetime_ms);
    token
  }
}

#[cfg(test)]
mod test {
  use no_std_net::{IpAddr, Ipv4Addr};

  use super::*;
  use crate::time::test::FakeClock;

  fn addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 5683)
  }

  #[test]
  fn ids_increment_and_are_not_duplicates_until_seen() {
    let t = 0u64;
    let clock = FakeClock::new(&t as *const _);
    let mut gen = TokenGenerator::<FakeClock>::new(0);

    let id1 = gen.next_id(&clock, addr(), 60_000);
    assert!(gen.is_duplicate_id(addr(), id1));

    let id2 = gen.next_id(&clock, addr(), 60_000);
    assert_eq!(id2, Id(id1.0 + 1));
  }

  #[test]
  fn tokens_differ_across_calls() {
    let mut t = 0u64;
    let clock = FakeClock::new(&t as *const _);
    let mut gen = TokenGenerator::<FakeClock>::new(42);

    let tok1 = gen.next_token(&clock, addr(), 60_000);
    t = 1;
    let tok2 = gen.next_token(&clock, addr(), 60_000);
    assert_ne!(tok1, tok2);
  }
}
