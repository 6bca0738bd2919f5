//! Operational Dataset (§3 expansion "MeshCoP Dataset"): the TLV set
//! delivered to a newly-joined device by the Joiner Entrust step (§4.9)
//! and referenced by Commissioner dataset management (§4.8 expansion).
//!
//! TLV type bytes are the Thread 1.2 MeshCoP registry values, grounded in
//! the field list §6 calls out by name (Active/Pending Timestamp,
//! Network Key, Mesh-Local Prefix, Extended PAN-ID, Network Name,
//! Channel Mask, PSKc, Security Policy, Network Key Sequence).

use crate::error::{Error, Result};
use crate::meshcop::tlv::{self, Tlv, TlvIter};

/// MeshCoP TLV type bytes used by this core (Thread 1.2 registry).
pub mod ty {
  pub const CHANNEL: u8 = 0;
  pub const PAN_ID: u8 = 1;
  pub const EXTENDED_PAN_ID: u8 = 2;
  pub const NETWORK_NAME: u8 = 3;
  pub const PSKC: u8 = 4;
  pub const NETWORK_KEY: u8 = 5;
  pub const NETWORK_KEY_SEQUENCE: u8 = 6;
  pub const MESH_LOCAL_PREFIX: u8 = 7;
  pub const STEERING_DATA: u8 = 8;
  pub const BORDER_AGENT_LOCATOR: u8 = 9;
  pub const COMMISSIONER_ID: u8 = 10;
  pub const COMMISSIONER_SESSION_ID: u8 = 11;
  pub const SECURITY_POLICY: u8 = 12;
  pub const ACTIVE_TIMESTAMP: u8 = 14;
  pub const COMMISSIONER_UDP_PORT: u8 = 15;
  pub const STATE: u8 = 16;
  pub const JOINER_DTLS_ENCAPSULATION: u8 = 17;
  pub const JOINER_UDP_PORT: u8 = 18;
  pub const JOINER_IID: u8 = 19;
  pub const JOINER_ROUTER_LOCATOR: u8 = 20;
  pub const JOINER_ROUTER_KEK: u8 = 21;
  pub const PROVISIONING_URL: u8 = 32;
  pub const VENDOR_NAME: u8 = 33;
  pub const VENDOR_MODEL: u8 = 34;
  pub const VENDOR_SW_VERSION: u8 = 35;
  pub const VENDOR_DATA: u8 = 36;
  pub const VENDOR_STACK_VERSION: u8 = 37;
  pub const UDP_ENCAPSULATION: u8 = 48;
  pub const IPV6_ADDRESS: u8 = 49;
  pub const PENDING_TIMESTAMP: u8 = 51;
  pub const DELAY_TIMER: u8 = 52;
  pub const CHANNEL_MASK: u8 = 53;
}

/// `State` TLV value, carried in a joiner-finalize response (§4.8 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  /// 0x01
  Accept,
  /// 0xff
  Reject,
  /// 0xfe
  Pending,
}

impl State {
  /// Decode a single-byte `State` TLV value.
  pub fn from_byte(b: u8) -> Option<Self> {
    match b {
      | 0x01 => Some(State::Accept),
      | 0xfe => Some(State::Pending),
      | 0xff => Some(State::Reject),
      | _ => None,
    }
  }

  /// Encode to the wire byte.
  pub fn to_byte(self) -> u8 {
    match self {
      | State::Accept => 0x01,
      | State::Pending => 0xfe,
      | State::Reject => 0xff,
    }
  }
}

/// The full operational dataset (§4.9 "the full operational dataset
/// TLVs"), entrusted to a joiner once it has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationalDataset {
  pub active_timestamp: u64,
  pub network_key: [u8; 16],
  pub mesh_local_prefix: [u8; 8],
  pub extended_pan_id: [u8; 8],
  pub network_name: [u8; 16],
  pub network_name_len: u8,
  pub pan_id: u16,
  pub channel: u16,
  pub pskc: [u8; 16],
  pub security_policy: [u8; 3],
  pub network_key_sequence: u32,
}

impl OperationalDataset {
  /// Encode this dataset as a sequence of TLVs, in the order a joiner
  /// entrust POST body lists them in (§4.9).
  pub fn encode(&self) -> Vec<u8> {
    let mut out = Vec::new();
    tlv::write(&mut out, ty::ACTIVE_TIMESTAMP, &self.active_timestamp.to_be_bytes());
    tlv::write(&mut out, ty::NETWORK_KEY, &self.network_key);
    tlv::write(&mut out, ty::MESH_LOCAL_PREFIX, &self.mesh_local_prefix);
    tlv::write(&mut out, ty::EXTENDED_PAN_ID, &self.extended_pan_id);
    tlv::write(&mut out, ty::NETWORK_NAME, &self.network_name[..self.network_name_len as usize]);
    tlv::write(&mut out, ty::PAN_ID, &self.pan_id.to_be_bytes());
    tlv::write(&mut out, ty::CHANNEL, &self.channel.to_be_bytes());
    tlv::write(&mut out, ty::PSKC, &self.pskc);
    tlv::write(&mut out, ty::SECURITY_POLICY, &self.security_policy);
    tlv::write(&mut out, ty::NETWORK_KEY_SEQUENCE, &self.network_key_sequence.to_be_bytes());
    out
  }

  /// Parse a dataset back out of its TLV encoding. Every field listed in
  /// §4.9 must be present; a missing TLV is a [`Error::Parse`].
  pub fn decode(bytes: &[u8]) -> Result<Self> {
    let get = |t: u8| -> Result<Tlv<'_>> { tlv::find(bytes, t).ok_or(Error::Parse) };

    let active_timestamp = u64::from_be_bytes(get(ty::ACTIVE_TIMESTAMP)?.value
                                                                         .try_into()
                                                                         .map_err(|_| Error::Parse)?);
    let network_key = get(ty::NETWORK_KEY)?.value.try_into().map_err(|_| Error::Parse)?;
    let mesh_local_prefix = get(ty::MESH_LOCAL_PREFIX)?.value.try_into().map_err(|_| Error::Parse)?;
    let extended_pan_id = get(ty::EXTENDED_PAN_ID)?.value.try_into().map_err(|_| Error::Parse)?;

    let name_tlv = get(ty::NETWORK_NAME)?;
    if name_tlv.value.len() > 16 {
      return Err(Error::Parse);
    }
    let mut network_name = [0u8; 16];
    network_name[..name_tlv.value.len()].copy_from_slice(name_tlv.value);

    let pan_id = u16::from_be_bytes(get(ty::PAN_ID)?.value.try_into().map_err(|_| Error::Parse)?);
    let channel = u16::from_be_bytes(get(ty::CHANNEL)?.value.try_into().map_err(|_| Error::Parse)?);
    let pskc = get(ty::PSKC)?.value.try_into().map_err(|_| Error::Parse)?;
    let security_policy = get(ty::SECURITY_POLICY)?.value.try_into().map_err(|_| Error::Parse)?;
    let network_key_sequence =
      u32::from_be_bytes(get(ty::NETWORK_KEY_SEQUENCE)?.value.try_into().map_err(|_| Error::Parse)?);

    Ok(Self { active_timestamp,
              network_key,
              mesh_local_prefix,
              extended_pan_id,
              network_name,
              network_name_len: name_tlv.value.len() as u8,
              pan_id,
              channel,
              pskc,
              security_policy,
              network_key_sequence })
  }
}

/// Iterate the TLVs of an already-encoded dataset (or any other TLV
/// blob, such as a `relay-rx` payload), for callers that only need a
/// subset of fields rather than the full typed struct.
pub fn iter(bytes: &[u8]) -> TlvIter<'_> {
  TlvIter::new(bytes)
}

#[cfg(test)]
mod test {
  use super::*;

  fn sample() -> OperationalDataset {
    OperationalDataset { active_timestamp: 1,
                         network_key: [0xaa; 16],
                         mesh_local_prefix: [0xfd, 0, 0, 0, 0, 0, 0, 0],
                         extended_pan_id: [1, 2, 3, 4, 5, 6, 7, 8],
                         network_name: *b"ThreadNet\0\0\0\0\0\0\0",
                         network_name_len: 9,
                         pan_id: 0x1234,
                         channel: 15,
                         pskc: [0xbb; 16],
                         security_policy: [0, 0xff, 0xf8],
                         network_key_sequence: 0 }
  }

  #[test]
  fn dataset_round_trips_through_tlv_encoding() {
    let ds = sample();
    let bytes = ds.encode();
    let decoded = OperationalDataset::decode(&bytes).unwrap();
    assert_eq!(ds, decoded);
  }

  #[test]
  fn decode_rejects_missing_field() {
    let mut bytes = sample().encode();
    // drop the trailing Network Key Sequence TLV
    let without_seq_len = bytes.len() - 6;
    bytes.truncate(without_seq_len);
    assert_eq!(OperationalDataset::decode(&bytes), Err(Error::Parse));
  }

  #[test]
  fn state_round_trips() {
    assert_eq!(State::from_byte(State::Accept.to_byte()), Some(State::Accept));
    assert_eq!(State::from_byte(State::Reject.to_byte()), Some(State::Reject));
    assert_eq!(State::from_byte(0x02), None);
  }
}
