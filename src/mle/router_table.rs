//! MLE Router Table (§4.10): router-id allocation/release and
//! path-cost/link-cost computation.
//!
//! Grounded in `original_source/src/core/thread/router_table.cpp`'s
//! `Allocate`/`Release`/`GetLinkCost`/`GetNextHopAndPathCost`. The
//! router-id-to-index map (`mRouterIdMap` in the original, a packed
//! byte array covering all `kMaxRouterId+1` ids) is kept as an explicit
//! `RouterIdState` enum per id instead, since this crate isn't
//! chasing the original's byte-packed memory layout.

use rand::Rng;

/// `kMaxRouterId` (62): the highest valid router-id. IDs run `0..=62`,
/// 63 values total.
pub const MAX_ROUTER_ID: u8 = 62;

/// Link cost table (§4.10): `{LQ3:1, LQ2:2, LQ1:4, LQ0:16}`.
pub fn cost_for_link_quality(lq: u8) -> u8 {
  match lq {
    | 3 => 1,
    | 2 => 2,
    | 1 => 4,
    | _ => 16,
  }
}

/// Allocation state of one router-id slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterIdState {
  /// Never allocated, or its reuse delay has elapsed.
  Free,
  /// Currently allocated; the index into `RouterTable::routers`.
  Allocated(usize),
  /// Released; unusable until `reuse_delay_s` more of [`RouterIdState`]
  /// clock time elapses (`kRouterIdReuseDelay`, 100s, §4.10).
  ReuseDelay { expires_at_ms: u64 },
}

/// One tracked router neighbor (§3 "Router").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
  pub router_id: u8,
  /// Router-id of the next hop towards this router, or `None` if no
  /// route is currently known.
  pub next_hop: Option<u8>,
  /// The path cost this router reports towards its own next hops
  /// (used as the second term of the min-of-two-paths rule, §4.10).
  pub cost: u8,
  pub link_quality_in: u8,
  pub link_quality_out: u8,
  pub last_heard_ms: u64,
}

impl Router {
  fn new(router_id: u8, now_ms: u64) -> Self {
    Self { router_id, next_hop: None, cost: 0, link_quality_in: 0, link_quality_out: 0, last_heard_ms: now_ms }
  }

  /// `min(link_quality_in, link_quality_out)`, the "two-way" link
  /// quality `GetLinkCost` folds into a cost.
  fn two_way_link_quality(&self) -> u8 {
    self.link_quality_in.min(self.link_quality_out)
  }
}

/// The MLE Router Table (§4.10): up to `kMaxRouters` (32) routers,
/// indexed by allocation order, mirrored by a router-id→index map
/// covering all 63 possible router ids.
#[derive(Debug)]
pub struct RouterTable {
  routers: Vec<Router>,
  max_routers: usize,
  id_state: [RouterIdState; MAX_ROUTER_ID as usize + 1],
  router_id_sequence: u8,
  max_route_cost: u8,
  router_id_reuse_delay_ms: u64,
  self_router_id: Option<u8>,
}

impl RouterTable {
  /// An empty table bounded to `max_routers` entries
  /// (`Config::capacities::max_routers`, default 32), using
  /// `max_route_cost` (`Config::mle.max_route_cost`, default 16) as the
  /// unreachable threshold and `router_id_reuse_delay_s`
  /// (`Config::mle.router_id_reuse_delay_s`, default 100) between a
  /// router-id's release and its next allocation.
  pub fn new(max_routers: usize, max_route_cost: u8, router_id_reuse_delay_s: u32) -> Self {
    Self { routers: Vec::new(),
           max_routers,
           id_state: [RouterIdState::Free; MAX_ROUTER_ID as usize + 1],
           router_id_sequence: 0,
           max_route_cost,
           router_id_reuse_delay_ms: u64::from(router_id_reuse_delay_s) * 1000,
           self_router_id: None }
  }

  /// Mark `router_id` as this device's own id, so [`RouterTable::path_cost`]
  /// can short-circuit `path_cost(self) = 0` (§8 invariant 5).
  pub fn set_self_router_id(&mut self, router_id: u8) {
    self.self_router_id = Some(router_id);
  }

  /// Number of currently allocated routers.
  pub fn active_router_count(&self) -> usize {
    self.routers.len()
  }

  pub fn is_allocated(&self, router_id: u8) -> bool {
    matches!(self.id_state.get(router_id as usize), Some(RouterIdState::Allocated(_)))
  }

  pub fn find(&self, router_id: u8) -> Option<&Router> {
    match self.id_state.get(router_id as usize)? {
      | RouterIdState::Allocated(ix) => self.routers.get(*ix),
      | _ => None,
    }
  }

  fn find_mut(&mut self, router_id: u8) -> Option<&mut Router> {
    match self.id_state.get(router_id as usize)? {
      | RouterIdState::Allocated(ix) => self.routers.get_mut(*ix),
      | _ => None,
    }
  }

  /// Reservoir-sample a uniformly random free router-id and allocate it
  /// (§4.10 "Allocation"). `None` if the table is full or no id is free.
  pub fn allocate(&mut self, rand: &mut impl Rng, now_ms: u64) -> Option<u8> {
    if self.routers.len() >= self.max_routers {
      return None;
    }

    let mut selected = None;
    let mut available = 0u32;
    for id in 0..=MAX_ROUTER_ID {
      if self.can_allocate(id, now_ms) {
        available += 1;
        if rand.gen_range(0..available) == 0 {
          selected = Some(id);
        }
      }
    }

    let id = selected?;
    self.allocate_id(id, now_ms);
    Some(id)
  }

  fn can_allocate(&self, router_id: u8, now_ms: u64) -> bool {
    match self.id_state[router_id as usize] {
      | RouterIdState::Free => true,
      | RouterIdState::ReuseDelay { expires_at_ms } => now_ms >= expires_at_ms,
      | RouterIdState::Allocated(_) => false,
    }
  }

  pub(crate) fn allocate_id(&mut self, router_id: u8, now_ms: u64) {
    let ix = self.routers.len();
    self.routers.push(Router::new(router_id, now_ms));
    self.id_state[router_id as usize] = RouterIdState::Allocated(ix);
    self.router_id_sequence = self.router_id_sequence.wrapping_add(1);
  }

  /// Release a router-id (§4.10 "Release"): swap-remove from the
  /// backing array, fix up the moved entry's index, and start the
  /// reuse-delay countdown for the freed id.
  pub fn release(&mut self, router_id: u8, now_ms: u64) -> bool {
    let RouterIdState::Allocated(ix) = self.id_state[router_id as usize] else {
      return false;
    };

    self.routers.swap_remove(ix);
    if let Some(moved) = self.routers.get(ix) {
      self.id_state[moved.router_id as usize] = RouterIdState::Allocated(ix);
    }

    self.id_state[router_id as usize] =
      RouterIdState::ReuseDelay { expires_at_ms: now_ms + self.router_id_reuse_delay_ms };
    self.router_id_sequence = self.router_id_sequence.wrapping_add(1);

    for router in &mut self.routers {
      if router.next_hop == Some(router_id) {
        router.next_hop = None;
      }
    }

    true
  }

  /// Seconds remaining before `router_id` may be allocated again, or 0
  /// if it isn't in its reuse-delay window.
  pub fn reuse_delay_remaining_s(&self, router_id: u8, now_ms: u64) -> u64 {
    match self.id_state.get(router_id as usize) {
      | Some(RouterIdState::ReuseDelay { expires_at_ms }) if *expires_at_ms > now_ms => {
        (*expires_at_ms - now_ms) / 1000
      },
      | _ => 0,
    }
  }

  /// The link cost to `router_id` directly (§4.10 "Link cost table"):
  /// `kMaxRouteCost` if not allocated.
  pub fn link_cost(&self, router_id: u8) -> u8 {
    self.find(router_id)
        .map(|r| cost_for_link_quality(r.two_way_link_quality()))
        .unwrap_or(self.max_route_cost)
  }

  /// Path cost to `dest_router_id` (§4.10 "Path cost to a destination
  /// RLOC", router/leader-role branch: children and the child role are
  /// out of this table's scope, which only models router-to-router
  /// reachability).
  pub fn path_cost(&self, dest_router_id: u8) -> u8 {
    if self.self_router_id == Some(dest_router_id) {
      return 0;
    }

    let Some(router) = self.find(dest_router_id) else {
      return self.max_route_cost;
    };

    let direct = self.link_cost(dest_router_id);
    let via_next_hop = match router.next_hop {
      | Some(next_hop_id) if next_hop_id != dest_router_id => {
        router.cost.saturating_add(self.link_cost(next_hop_id))
      },
      | _ => self.max_route_cost,
    };

    direct.min(via_next_hop).min(self.max_route_cost)
  }

  /// Set `router_id`'s stored next-hop and path cost, returning whether
  /// anything changed (mirrors `Router::SetNextHopAndCost`).
  pub fn set_next_hop_and_cost(&mut self, router_id: u8, next_hop: u8, cost: u8) -> bool {
    let Some(router) = self.find_mut(router_id) else { return false };
    let changed = router.next_hop != Some(next_hop) || router.cost != cost;
    router.next_hop = Some(next_hop);
    router.cost = cost;
    changed
  }

  pub fn invalidate_next_hop(&mut self, router_id: u8) {
    if let Some(router) = self.find_mut(router_id) {
      router.next_hop = None;
    }
  }

  pub fn set_link_quality(&mut self, router_id: u8, link_quality_in: u8, link_quality_out: u8) {
    if let Some(router) = self.find_mut(router_id) {
      router.link_quality_in = link_quality_in;
      router.link_quality_out = link_quality_out;
    }
  }

  pub fn router_id_sequence(&self) -> u8 {
    self.router_id_sequence
  }

  /// The configured unreachable-path threshold (`kMaxRouteCost`).
  pub fn max_route_cost(&self) -> u8 {
    self.max_route_cost
  }

  /// Iterate the ids currently allocated, in allocation (array) order.
  pub fn allocated_ids(&self) -> impl Iterator<Item = u8> + '_ {
    self.routers.iter().map(|r| r.router_id)
  }
}

#[cfg(test)]
mod test {
  use rand::SeedableRng;

  use super::*;

  fn table() -> RouterTable {
    RouterTable::new(32, 16, 100)
  }

  #[test]
  fn allocate_yields_an_id_in_range_and_marks_it_allocated() {
    let mut t = table();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
    let id = t.allocate(&mut rng, 0).unwrap();
    assert!(id <= MAX_ROUTER_ID);
    assert!(t.is_allocated(id));
  }

  #[test]
  fn release_frees_the_id_with_a_reuse_delay() {
    let mut t = table();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(2);
    let id = t.allocate(&mut rng, 0).unwrap();

    assert!(t.release(id, 0));
    assert!(!t.is_allocated(id));
    assert_eq!(t.reuse_delay_remaining_s(id, 0), 100);
    assert_eq!(t.reuse_delay_remaining_s(id, 100_000), 0);
  }

  #[test]
  fn scenario_f_two_router_chain_path_cost() {
    let mut t = table();
    t.set_self_router_id(1);

    t.allocate_id(2, 0);
    t.allocate_id(3, 0);

    // self --LQ3--> R1(2) --LQ3--> R2(3); R2 has no direct link to self,
    // only a path reported via R1.
    t.set_link_quality(2, 3, 3);
    t.set_next_hop_and_cost(3, 2, cost_for_link_quality(3));

    assert_eq!(t.path_cost(2), 1);
    assert_eq!(t.path_cost(3), 1 + 1);

    t.release(2, 0);
    assert_eq!(t.path_cost(3), 16);
    assert_eq!(t.reuse_delay_remaining_s(2, 0), 100);
  }
}
