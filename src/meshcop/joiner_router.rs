//! MeshCoP Joiner-Router (§4.9): relays DTLS-encapsulated traffic
//! between a joiner on the joiner UDP port and the commissioner's
//! `relay-rx`/`relay-tx` TMF resources, and queues the post-finalize
//! Joiner Entrust delivery.

use crate::error::{Error, Result};
use crate::meshcop::dataset::OperationalDataset;

/// A pending Joiner Entrust delivery (§4.9 "Joiner Entrust"): queued
/// after a successful finalize, sent after `kJoinerEntrustTxDelay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntrust {
  pub joiner_iid: [u8; 8],
  pub joiner_router_locator: u16,
  pub due_ms: u64,
}

/// One `relay-tx` payload's worth of routing metadata, alongside the
/// DTLS bytes it encapsulates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEnvelope {
  pub joiner_udp_port: u16,
  pub joiner_iid: [u8; 8],
  pub joiner_router_locator: u16,
  pub payload: Vec<u8>,
}

/// The Joiner-Router role (§4.9). Owns the FIFO of pending entrust
/// deliveries; the DTLS-secured connection to the joiner and the UDP
/// socket to the commissioner are host-provided collaborators (§6).
#[derive(Debug)]
pub struct JoinerRouter {
  joiner_udp_port: u16,
  tx_delay_ms: u32,
  pending: Vec<PendingEntrust>,
}

impl JoinerRouter {
  /// A joiner-router bound to `joiner_udp_port`
  /// (`Config::joiner_router.default_joiner_udp_port`, overridden by
  /// network data when present), delaying entrust delivery by
  /// `tx_delay_ms` (`Config::joiner_router.joiner_entrust_tx_delay_ms`).
  pub fn new(joiner_udp_port: u16, tx_delay_ms: u32) -> Self {
    Self { joiner_udp_port, tx_delay_ms, pending: Vec::new() }
  }

  /// The UDP port this joiner-router listens for joiner datagrams on.
  pub fn joiner_udp_port(&self) -> u16 {
    self.joiner_udp_port
  }

  /// Host→joiner (§4.9 "Host→joiner"): unwrap a `relay-tx` envelope into
  /// the encapsulated bytes, to forward as an unsecured UDP datagram to
  /// the joiner's link-local address. If the envelope carries a
  /// `joiner-router-kek` TLV, the caller should also call
  /// [`JoinerRouter::queue_entrust`].
  pub fn unwrap_relay_tx(envelope: &RelayEnvelope) -> &[u8] {
    &envelope.payload
  }

  /// Joiner→host (§4.9 "Joiner→host"): wrap a UDP datagram received
  /// from the joiner into a `relay-rx` envelope addressed to the
  /// primary border agent's RLOC.
  pub fn wrap_relay_rx(&self, joiner_iid: [u8; 8], datagram: &[u8]) -> RelayEnvelope {
    RelayEnvelope { joiner_udp_port: self.joiner_udp_port,
                    joiner_iid,
                    joiner_router_locator: 0,
                    payload: datagram.to_vec() }
  }

  /// Queue a Joiner Entrust delivery, due `tx_delay_ms` from `now_ms`
  /// (§4.9 "after a short fixed delay").
  pub fn queue_entrust(&mut self, joiner_iid: [u8; 8], joiner_router_locator: u16, now_ms: u64) {
    self.pending.push(PendingEntrust { joiner_iid,
                                       joiner_router_locator,
                                       due_ms: now_ms + u64::from(self.tx_delay_ms) });
  }

  /// Pop the earliest-due pending entrust if it's due by `now_ms`
  /// (§4.9 "the timer processes them in FIFO order").
  pub fn next_due_entrust(&mut self, now_ms: u64) -> Option<PendingEntrust> {
    if self.pending.first().map(|p| p.due_ms <= now_ms).unwrap_or(false) {
      Some(self.pending.remove(0))
    } else {
      None
    }
  }

  /// Build the confirmable POST body installing the negotiated KEK and
  /// delivering the operational dataset (§4.9 "install the negotiated
  /// KEK... and send a confirmable POST... containing the full
  /// operational dataset TLVs").
  pub fn build_entrust_payload(dataset: &OperationalDataset) -> Vec<u8> {
    dataset.encode()
  }
}

/// Decode a `relay-rx`/`relay-tx` TLV payload into its routing metadata
/// and encapsulated bytes (§6 TLV list: Joiner-UDP-Port, Joiner-IID,
/// Joiner-Router-Locator, Joiner-DTLS-Encapsulation).
pub fn decode_relay_envelope(bytes: &[u8]) -> Result<RelayEnvelope> {
  use crate::meshcop::dataset::ty;
  use crate::meshcop::tlv;

  let port_tlv = tlv::find(bytes, ty::JOINER_UDP_PORT).ok_or(Error::Parse)?;
  let iid_tlv = tlv::find(bytes, ty::JOINER_IID).ok_or(Error::Parse)?;
  let rloc_tlv = tlv::find(bytes, ty::JOINER_ROUTER_LOCATOR).ok_or(Error::Parse)?;
  let payload_tlv = tlv::find(bytes, ty::JOINER_DTLS_ENCAPSULATION).ok_or(Error::Parse)?;

  Ok(RelayEnvelope { joiner_udp_port: u16::from_be_bytes(port_tlv.value.try_into().map_err(|_| Error::Parse)?),
                     joiner_iid: iid_tlv.value.try_into().map_err(|_| Error::Parse)?,
                     joiner_router_locator: u16::from_be_bytes(rloc_tlv.value.try_into()
                                                                              .map_err(|_| Error::Parse)?),
                     payload: payload_tlv.value.to_vec() })
}

/// Encode a `relay-rx`/`relay-tx` envelope back to its TLV payload.
pub fn encode_relay_envelope(envelope: &RelayEnvelope) -> Vec<u8> {
  use crate::meshcop::dataset::ty;
  use crate::meshcop::tlv;

  let mut out = Vec::new();
  tlv::write(&mut out, ty::JOINER_UDP_PORT, &envelope.joiner_udp_port.to_be_bytes());
  tlv::write(&mut out, ty::JOINER_IID, &envelope.joiner_iid);
  tlv::write(&mut out, ty::JOINER_ROUTER_LOCATOR, &envelope.joiner_router_locator.to_be_bytes());
  tlv::write(&mut out, ty::JOINER_DTLS_ENCAPSULATION, &envelope.payload);
  out
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn relay_envelope_round_trips_through_tlv_encoding() {
    let env = RelayEnvelope { joiner_udp_port: 1000,
                              joiner_iid: [1, 2, 3, 4, 5, 6, 7, 8],
                              joiner_router_locator: 0xfc00,
                              payload: vec![0xde, 0xad, 0xbe, 0xef] };

    let bytes = encode_relay_envelope(&env);
    let decoded = decode_relay_envelope(&bytes).unwrap();
    assert_eq!(env, decoded);
  }

  #[test]
  fn entrust_delivery_is_not_due_before_the_tx_delay() {
    let mut jr = JoinerRouter::new(1000, 500);
    jr.queue_entrust([1; 8], 0xfc00, 0);

    assert!(jr.next_due_entrust(499).is_none());
    let due = jr.next_due_entrust(500).unwrap();
    assert_eq!(due.joiner_iid, [1; 8]);
  }

  #[test]
  fn entrust_deliveries_drain_in_fifo_order() {
    let mut jr = JoinerRouter::new(1000, 0);
    jr.queue_entrust([1; 8], 0, 0);
    jr.queue_entrust([2; 8], 0, 0);

    assert_eq!(jr.next_due_entrust(0).unwrap().joiner_iid, [1; 8]);
    assert_eq!(jr.next_due_entrust(0).unwrap().joiner_iid, [2; 8]);
    assert!(jr.next_due_entrust(0).is_none());
  }
}
