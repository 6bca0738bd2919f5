//! Route64 TLV fill/consume (§4.10 "Route TLV fill" / "Route TLV
//! consume"), grounded in
//! `original_source/src/core/thread/router_table.cpp`'s
//! `FillRouteTlv`/`ProcessRouteTlv`.

use crate::mle::router_table::{RouterTable, MAX_ROUTER_ID};

/// One allocated router-id's entry in a [`RouteTlv`]: link quality in
/// each direction as seen by the sender, and the sender's path cost to
/// that router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteData {
  pub router_id: u8,
  pub link_quality_in: u8,
  pub link_quality_out: u8,
  pub route_cost: u8,
}

/// A decoded/to-be-encoded Route64 TLV (§6: "router-id sequence,
/// router-id set as 8-byte bitmap, per-id packed `{LQI, cost}`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTlv {
  pub router_id_sequence: u8,
  /// One bit per router-id, `0..=62`, set if that id is allocated.
  pub router_id_mask: [u8; 8],
  /// In router-id order, one entry per set bit of `router_id_mask`.
  pub route_data: Vec<RouteData>,
}

impl RouteTlv {
  fn mask_contains(mask: &[u8; 8], router_id: u8) -> bool {
    mask[router_id as usize / 8] & (1 << (router_id % 8)) != 0
  }

  fn mask_set(mask: &mut [u8; 8], router_id: u8) {
    mask[router_id as usize / 8] |= 1 << (router_id % 8);
  }

  pub fn is_router_id_set(&self, router_id: u8) -> bool {
    Self::mask_contains(&self.router_id_mask, router_id)
  }
}

/// Fill a Route64 TLV describing `table` from this device's own
/// perspective (§4.10 "Route TLV fill").
///
/// `link_accept_truncate_to` is `Some(kMaxRoutersInRouteTlvForLinkAccept)`
/// when filling for a Link Accept response to `neighbor_router_id`
/// (truncating the set and rolling the sequence back by
/// `sequence_rollback` so the recipient reprocesses a later full
/// exchange); `None` for an ordinary Advertisement.
pub fn fill(table: &RouterTable,
            self_router_id: u8,
            leader_router_id: u8,
            link_accept: Option<(u8 /* neighbor */, usize /* truncate_to */, u8 /* seq rollback */)>)
            -> RouteTlv {
  let mut mask = [0u8; 8];
  for id in table.allocated_ids() {
    RouteTlv::mask_set(&mut mask, id);
  }

  let mut router_id_sequence = table.router_id_sequence();

  if let Some((neighbor_id, truncate_to, rollback)) = link_accept {
    let mut count = table.active_router_count();
    if count > truncate_to {
      for id in 0..=MAX_ROUTER_ID {
        if count <= truncate_to {
          break;
        }
        if id == self_router_id || id == neighbor_id || id == leader_router_id {
          continue;
        }
        if RouteTlv::mask_contains(&mask, id) {
          mask[id as usize / 8] &= !(1 << (id % 8));
          count -= 1;
        }
      }
      router_id_sequence = router_id_sequence.wrapping_sub(rollback);
    }
  }

  let mut route_data = Vec::new();
  for id in 0..=MAX_ROUTER_ID {
    if !RouteTlv::mask_contains(&mask, id) {
      continue;
    }

    if id == self_router_id {
      route_data.push(RouteData { router_id: id, link_quality_in: 0, link_quality_out: 0, route_cost: 1 });
      continue;
    }

    let mut cost = table.path_cost(id);
    if cost >= table.max_route_cost() {
      cost = 0;
    }
    let router = table.find(id);
    route_data.push(RouteData { router_id: id,
                                link_quality_in: router.map(|r| r.link_quality_in).unwrap_or(0),
                                link_quality_out: router.map(|r| r.link_quality_out).unwrap_or(0),
                                route_cost: cost });
  }

  RouteTlv { router_id_sequence, router_id_mask: mask, route_data }
}

/// Apply a received Route64 TLV from `neighbor_id` (§4.10 "Route TLV
/// consume (neighbor side)"). Returns whether the set of
/// finite/infinite path costs changed for any router id, signalling
/// the caller should reset the MLE advertise interval.
pub fn consume(table: &mut RouterTable, tlv: &RouteTlv, neighbor_id: u8, self_router_id: u8) -> bool {
  let before: Vec<bool> =
    (0..=MAX_ROUTER_ID).map(|id| table.path_cost(id) < max_route_cost(table)).collect();

  if tlv.is_router_id_set(self_router_id) {
    if let Some(entry) = tlv.route_data.iter().find(|e| e.router_id == self_router_id) {
      table.set_link_quality(neighbor_id, entry.link_quality_out, neighbor_link_quality_out(table, neighbor_id));
      // `link_quality_out` towards the neighbor reflects what the
      // neighbor reports seeing *from* us (their `LinkQualityIn`).
      if let Some(router) = table.find(neighbor_id) {
        table.set_link_quality(neighbor_id, router.link_quality_in, entry.link_quality_in);
      }
    }
  }

  let link_cost_to_neighbor = table.link_cost(neighbor_id);

  for entry in &tlv.route_data {
    if entry.router_id == self_router_id || entry.router_id == neighbor_id {
      continue;
    }
    if !table.is_allocated(entry.router_id) {
      continue;
    }

    let reported_cost = if entry.route_cost == 0 { max_route_cost(table) } else { entry.route_cost };
    let next_hop = table.find(entry.router_id).and_then(|r| r.next_hop);

    match next_hop {
      | None => {
        if reported_cost.saturating_add(link_cost_to_neighbor) < max_route_cost(table) {
          table.set_next_hop_and_cost(entry.router_id, neighbor_id, reported_cost);
        }
      },
      | Some(hop) if hop == neighbor_id => {
        if reported_cost.saturating_add(link_cost_to_neighbor) < max_route_cost(table) {
          table.set_next_hop_and_cost(entry.router_id, neighbor_id, reported_cost);
        } else {
          table.invalidate_next_hop(entry.router_id);
        }
      },
      | Some(hop) => {
        let cur_cost =
          table.find(entry.router_id).map(|r| r.cost).unwrap_or(max_route_cost(table)) + table.link_cost(hop);
        let new_cost = reported_cost.saturating_add(link_cost_to_neighbor);
        if new_cost < cur_cost {
          table.set_next_hop_and_cost(entry.router_id, neighbor_id, reported_cost);
        }
      },
    }
  }

  let after: Vec<bool> =
    (0..=MAX_ROUTER_ID).map(|id| table.path_cost(id) < max_route_cost(table)).collect();

  before != after
}

fn max_route_cost(table: &RouterTable) -> u8 {
  table.max_route_cost()
}

fn neighbor_link_quality_out(table: &RouterTable, neighbor_id: u8) -> u8 {
  table.find(neighbor_id).map(|r| r.link_quality_out).unwrap_or(0)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn fill_marks_self_with_best_link_quality_and_cost_one() {
    let mut t = RouterTable::new(32, 16, 100);
    t.set_self_router_id(1);
    t.allocate_id(1, 0);

    let tlv = fill(&t, 1, 1, None);
    assert!(tlv.is_router_id_set(1));
    let self_entry = tlv.route_data.iter().find(|e| e.router_id == 1).unwrap();
    assert_eq!(self_entry.route_cost, 1);
  }

  #[test]
  fn consume_adopts_a_route_reported_by_a_direct_neighbor() {
    let mut t = RouterTable::new(32, 16, 100);
    t.set_self_router_id(1);
    t.allocate_id(1, 0);
    t.allocate_id(2, 0);
    t.set_link_quality(2, 3, 3);

    let mut mask = [0u8; 8];
    RouteTlv::mask_set(&mut mask, 3);
    let tlv = RouteTlv { router_id_sequence: 1,
                         router_id_mask: mask,
                         route_data: vec![RouteData { router_id: 3,
                                                      link_quality_in: 3,
                                                      link_quality_out: 3,
                                                      route_cost: 1 }] };

    // router 3 isn't allocated locally yet, so the reported route is skipped
    let changed = consume(&mut t, &tlv, 2, 1);
    assert!(!changed);
    assert!(!t.is_allocated(3));

    t.allocate_id(3, 0);
    let changed = consume(&mut t, &tlv, 2, 1);
    assert!(changed);
    assert_eq!(t.find(3).unwrap().next_hop, Some(2));
  }
}
