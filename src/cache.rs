//! Response Cache (§4.4): a bounded dedup cache of server-sent ACK-type
//! responses, keyed by `{peer-addr, peer-port, message-id}`.
//!
//! Grounded in the teacher's `Core::resps`/fling-queue bookkeeping
//! (`core/mod.rs`), but given its own table since the spec calls for
//! explicit earliest-expiry eviction rather than the teacher's plain FIFO
//! buffers.

use no_std_net::SocketAddr;
use toad_msg::Id;

use crate::msg::Message;

/// Lookup key for the response cache: the sender and the message-id they
/// used, since CoAP message-ids are only unique per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
  /// The peer endpoint a request came from (and a cached response is re-sent to).
  pub peer: SocketAddr,
  /// The message-id from the original request, echoed by the cached response.
  pub id: Id,
}

#[derive(Debug, Clone)]
struct Entry {
  key: CacheKey,
  response: Message,
  expire_time_ms: u64,
}

/// Dedup cache of outgoing ACK-carrying responses (§4.4), so a
/// retransmitted CON request gets the stored reply re-sent verbatim
/// instead of re-running the resource handler.
#[derive(Debug)]
pub struct ResponseCache {
  entries: Vec<Entry>,
  capacity: usize,
}

impl ResponseCache {
  /// Create an empty cache bounded to `capacity` entries
  /// (`Config::capacities::max_cache_size`, default 8).
  pub fn new(capacity: usize) -> Self {
    Self { entries: Vec::with_capacity(capacity), capacity }
  }

  /// Number of entries currently cached.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// True if the cache holds no entries.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Insert `response` under `key`, expiring at `expire_time_ms`. If the
  /// cache is at capacity, evicts the entry with the earliest expiry
  /// first.
  pub fn insert(&mut self, key: CacheKey, response: Message, expire_time_ms: u64) {
    if let Some(ix) = self.entries.iter().position(|e| e.key == key) {
      self.entries.remove(ix);
    } else if self.entries.len() >= self.capacity {
      if let Some((ix, _)) =
        self.entries.iter().enumerate().min_by_key(|(_, e)| e.expire_time_ms)
      {
        log::debug!("response cache full, evicting earliest-expiring entry");
        self.entries.remove(ix);
      }
    }

    self.entries.push(Entry { key, response, expire_time_ms });
  }

  /// Look up a still-live cached response for `key`. Expired entries are
  /// treated as absent (they're reaped on the next [`ResponseCache::sweep`]).
  pub fn get(&self, key: CacheKey, now_ms: u64) -> Option<&Message> {
    self.entries
        .iter()
        .find(|e| e.key == key && e.expire_time_ms > now_ms)
        .map(|e| &e.response)
  }

  /// Remove all entries whose `expire_time_ms` has passed. Returns the
  /// number reaped.
  pub fn sweep(&mut self, now_ms: u64) -> usize {
    let before = self.entries.len();
    self.entries.retain(|e| e.expire_time_ms > now_ms);
    before - self.entries.len()
  }

  /// Drop every cached entry (`remove_all`, per the lifecycle rules).
  pub fn remove_all(&mut self) {
    self.entries.clear();
  }
}

#[cfg(test)]
mod test {
  use no_std_net::{IpAddr, Ipv4Addr};
  use toad_msg::{Code, Token, Type};

  use super::*;

  fn peer(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
  }

  fn msg() -> Message {
    Message::new(Type::Ack, Code::CONTENT, Id(1), Token(Default::default()))
  }

  #[test]
  fn evicts_earliest_expiry_when_full() {
    let mut cache = ResponseCache::new(2);
    cache.insert(CacheKey { peer: peer(1), id: Id(1) }, msg(), 100);
    cache.insert(CacheKey { peer: peer(2), id: Id(2) }, msg(), 50);

    // cache is full; this insert should evict the id=2 entry (expires at 50).
    cache.insert(CacheKey { peer: peer(3), id: Id(3) }, msg(), 200);

    assert_eq!(cache.len(), 2);
    assert!(cache.get(CacheKey { peer: peer(2), id: Id(2) }, 0).is_none());
    assert!(cache.get(CacheKey { peer: peer(1), id: Id(1) }, 0).is_some());
  }

  #[test]
  fn expired_entries_are_not_returned() {
    let mut cache = ResponseCache::new(8);
    cache.insert(CacheKey { peer: peer(1), id: Id(1) }, msg(), 100);

    assert!(cache.get(CacheKey { peer: peer(1), id: Id(1) }, 50).is_some());
    assert!(cache.get(CacheKey { peer: peer(1), id: Id(1) }, 150).is_none());
  }

  #[test]
  fn sweep_reaps_expired_entries() {
    let mut cache = ResponseCache::new(8);
    cache.insert(CacheKey { peer: peer(1), id: Id(1) }, msg(), 100);
    cache.insert(CacheKey { peer: peer(2), id: Id(2) }, msg(), 300);

    assert_eq!(cache.sweep(200), 1);
    assert_eq!(cache.len(), 1);
  }
}
