//! Generic MeshCoP TLV codec (§3 expansion "Generic MeshCoP TLV reader/writer").
//!
//! Type-Length-Value triplets, one byte of type, one byte of length (or,
//! when that byte is `0xFF`, two more bytes of extended length), then
//! `length` bytes of value -- grounded in `original_source`'s
//! `meshcop_tlvs.hpp` TLV layout. Shaped as an iterator/writer pair the
//! same way `toad_msg::opt`'s option iterator and `OptionMap` sit next to
//! each other, so the two codecs in this crate read as siblings.

use crate::error::{Error, Result};

/// Marks the one-byte length field as "read the real length from the
/// next two bytes instead".
const EXTENDED_LENGTH_MARKER: u8 = 0xff;

/// A single parsed TLV, borrowing its value from the buffer it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
  /// TLV type byte (e.g. Channel = 0, PAN ID = 1, ...; see `dataset.rs`).
  pub ty: u8,
  /// The value bytes, excluding the type/length header.
  pub value: &'a [u8],
}

/// Iterates the TLVs packed one after another in a byte slice (e.g. a
/// commissioning dataset, or a `relay-rx`/`relay-tx` message payload).
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
  rest: &'a [u8],
}

impl<'a> TlvIter<'a> {
  /// Start iterating the TLVs packed in `bytes`.
  pub fn new(bytes: &'a [u8]) -> Self {
    Self { rest: bytes }
  }
}

impl<'a> Iterator for TlvIter<'a> {
  type Item = Result<Tlv<'a>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.rest.is_empty() {
      return None;
    }

    let ty = self.rest[0];
    let (len, header_len) = match self.rest.get(1) {
      | Some(&EXTENDED_LENGTH_MARKER) => {
        let hi = *self.rest.get(2)?;
        let lo = *self.rest.get(3)?;
        (u16::from_be_bytes([hi, lo]) as usize, 4)
      },
      | Some(&len) => (len as usize, 2),
      | None => return Some(Err(Error::Parse)),
    };

    if self.rest.len() < header_len + len {
      self.rest = &[];
      return Some(Err(Error::Parse));
    }

    let value = &self.rest[header_len..header_len + len];
    self.rest = &self.rest[header_len + len..];

    Some(Ok(Tlv { ty, value }))
  }
}

/// Find the first TLV of type `ty` in `bytes`, if present.
pub fn find(bytes: &[u8], ty: u8) -> Option<Tlv<'_>> {
  TlvIter::new(bytes).filter_map(|r| r.ok()).find(|t| t.ty == ty)
}

/// Append one TLV (`ty`, `value`) to `out`, using the extended-length
/// form whenever `value` is 255 bytes or longer.
pub fn write(out: &mut Vec<u8>, ty: u8, value: &[u8]) {
  out.push(ty);
  if value.len() < EXTENDED_LENGTH_MARKER as usize {
    out.push(value.len() as u8);
  } else {
    out.push(EXTENDED_LENGTH_MARKER);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
  }
  out.extend_from_slice(value);
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn round_trips_short_tlv() {
    let mut buf = Vec::new();
    write(&mut buf, 1, &[0xaa, 0xbb]);

    let tlv = find(&buf, 1).unwrap();
    assert_eq!(tlv.value, &[0xaa, 0xbb]);
  }

  #[test]
  fn round_trips_extended_length_tlv() {
    let value = vec![7u8; 300];
    let mut buf = Vec::new();
    write(&mut buf, 9, &value);

    let tlv = find(&buf, 9).unwrap();
    assert_eq!(tlv.value, value.as_slice());
  }

  #[test]
  fn iterates_multiple_tlvs_in_sequence() {
    let mut buf = Vec::new();
    write(&mut buf, 1, &[1]);
    write(&mut buf, 2, &[2, 2]);
    write(&mut buf, 3, &[]);

    let parsed: Vec<_> = TlvIter::new(&buf).filter_map(|r| r.ok()).map(|t| t.ty).collect();
    assert_eq!(parsed, vec![1, 2, 3]);
  }

  #[test]
  fn truncated_value_is_a_parse_error() {
    let buf = [1u8, 5, 0, 0];
    let results: Vec<_> = TlvIter::new(&buf).collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0], Err(Error::Parse));
  }
}
