//! CoAP message types (§3, §4.1).
//!
//! The wire codec (header/options/payload-marker parsing, delta-length
//! option encoding) is not reimplemented here: `toad_msg` already is that
//! codec, and is the teacher's own dependency for it. This module supplies
//! the pieces the spec's data model adds on top of a bare parsed message:
//! the `subtype`/`priority` tags used to mark MeshCoP roles, URI-path
//! helpers bounded to a fixed-capacity buffer (rather than the teacher's
//! heap-backed `path_string`), and the response-code constants RFC 7252
//! defines but `toad_msg::Code` itself only special-cases for requests.

use tinyvec::ArrayVec;
use toad_msg::{Code, MessageOptions};

use crate::error::{Error, Result};

/// A parsed CoAP message, backed by `toad_msg`'s heap-allocating
/// representation (`Vec<u8>` payload, `BTreeMap` option map).
pub type Message = toad_msg::alloc::Message;

/// Maximum number of Uri-Path segments reconstructed by [`path_into`].
pub const MAX_PATH_SEGMENTS: usize = 8;

/// Maximum total length (bytes, including '/' separators) of a
/// reconstructed Uri-Path.
pub const MAX_PATH_LEN: usize = 64;

/// A Uri-Path, reconstructed into a fixed-capacity buffer rather than a
/// heap `String` so resource dispatch (§4.3) can match against it without
/// allocating.
pub type PathBuf = ArrayVec<[u8; MAX_PATH_LEN]>;

/// Marks a message's special role in the MeshCoP bootstrap flows (§4.8,
/// §4.9). Ordinary CoAP traffic is [`Subtype::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subtype {
  /// Ordinary request or response; no special handling.
  #[default]
  None,
  /// Response to a joiner's `JOIN_FIN.req`, tagged so the joiner-router
  /// relay (§4.9) knows to forward it back over the DTLS session instead
  /// of treating it as commissioner-bound traffic.
  JoinerFinalizeResponse,
  /// A `JOIN_ENT.ntf` carrying the KEK-wrapped operational dataset,
  /// queued for transmission after `joiner_entrust_tx_delay_ms` (§4.9).
  JoinerEntrust,
}

/// Queueing priority class for the pending-request table and message pool.
///
/// Higher-priority messages are serviced first when the table is near
/// capacity; MeshCoP bootstrap traffic outranks steady-state application
/// traffic so a joining device isn't starved by existing mesh chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
  /// Steady-state application CoAP traffic.
  #[default]
  Normal,
  /// MeshCoP bootstrap and MLE control traffic.
  High,
}

/// RFC 7252 §5.9 response codes not already provided as constants by
/// `toad_msg::Code` (which only special-cases the four request methods).
pub mod code {
  use toad_msg::Code;

  /// 2.01 Created
  pub const CREATED: Code = Code::new(2, 01);
  /// 2.02 Deleted
  pub const DELETED: Code = Code::new(2, 02);
  /// 2.03 Valid
  pub const VALID: Code = Code::new(2, 03);
  /// 2.04 Changed
  pub const CHANGED: Code = Code::new(2, 04);
  /// 2.05 Content
  pub const CONTENT: Code = Code::new(2, 05);
  /// 2.31 Continue (RFC 7959 block-wise)
  pub const CONTINUE: Code = Code::new(2, 31);

  /// 4.00 Bad Request
  pub const BAD_REQUEST: Code = Code::new(4, 00);
  /// 4.01 Unauthorized
  pub const UNAUTHORIZED: Code = Code::new(4, 01);
  /// 4.02 Bad Option
  pub const BAD_OPTION: Code = Code::new(4, 02);
  /// 4.03 Forbidden
  pub const FORBIDDEN: Code = Code::new(4, 03);
  /// 4.04 Not Found
  pub const NOT_FOUND: Code = Code::new(4, 04);
  /// 4.05 Method Not Allowed
  pub const METHOD_NOT_ALLOWED: Code = Code::new(4, 05);
  /// 4.06 Not Acceptable
  pub const NOT_ACCEPTABLE: Code = Code::new(4, 06);
  /// 4.08 Request Entity Incomplete (RFC 7959 block-wise)
  pub const REQUEST_ENTITY_INCOMPLETE: Code = Code::new(4, 08);
  /// 4.12 Precondition Failed
  pub const PRECONDITION_FAILED: Code = Code::new(4, 12);
  /// 4.13 Request Entity Too Large
  pub const REQUEST_ENTITY_TOO_LARGE: Code = Code::new(4, 13);
  /// 4.15 Unsupported Content-Format
  pub const UNSUPPORTED_CONTENT_FORMAT: Code = Code::new(4, 15);

  /// 5.00 Internal Server Error
  pub const INTERNAL_SERVER_ERROR: Code = Code::new(5, 00);
  /// 5.01 Not Implemented
  pub const NOT_IMPLEMENTED: Code = Code::new(5, 01);
  /// 5.03 Service Unavailable
  pub const SERVICE_UNAVAILABLE: Code = Code::new(5, 03);
}

/// Reconstruct a message's Uri-Path segments into `buf`, separated by
/// `/`, returning the number of bytes written.
///
/// Errors with [`Error::NoBufs`] rather than silently truncating if the
/// path doesn't fit `buf`'s capacity.
pub fn path_into(msg: &Message, buf: &mut PathBuf) -> Result<usize> {
  buf.clear();

  let segs: Vec<&str> = msg.path::<Vec<&str>>().map_err(|_| Error::Parse)?;

  if segs.len() > MAX_PATH_SEGMENTS {
    return Err(Error::NoBufs);
  }

  for (i, seg) in segs.iter().enumerate() {
    if i > 0 && buf.try_push(b'/').is_some() {
      return Err(Error::NoBufs);
    }
    for &b in seg.as_bytes() {
      if buf.try_push(b).is_some() {
        return Err(Error::NoBufs);
      }
    }
  }

  Ok(buf.len())
}

/// Whether `code` is a request, response, or the empty (0.00) code.
pub fn is_request(code: Code) -> bool {
  code.kind() == toad_msg::CodeKind::Request
}
