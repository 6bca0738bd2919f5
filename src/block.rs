//! Block-Wise Engine (RFC 7959, §4.6).
//!
//! No teacher module implements RFC 7959 directly (the `toad` crate's own
//! `step::block` only reassembles a known response size); this is built
//! against `toad_msg::Block`'s NUM/M/SZX codec, in the same "one state
//! machine per direction" shape as the teacher's `step/*.rs` modules.

use toad_msg::Block;

use crate::error::{Error, Result};

/// Maximum block size, in bytes, this engine will ever request or accept
/// (`2^(SZX+4)` at `SZX=6`). A configurable cap per §4.6; exposed so
/// agents with tighter memory can clamp lower.
pub const MAX_BLOCK_SIZE: u16 = 1024;

/// One leg of a block-wise transfer in progress, tracking the next chunk
/// expected/to-send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockState {
  /// Block size in bytes (always a power of two, 16..=1024).
  pub size: u16,
  /// Next expected/to-send block number.
  pub num: u32,
  /// Whether more blocks are expected/to-send after `num`.
  pub more: bool,
}

impl BlockState {
  /// Start a transfer at block 0 with the given size and more-flag.
  pub fn start(size: u16, more: bool) -> Self {
    Self { size, num: 0, more }
  }

  /// Build from a parsed wire [`Block`] option.
  pub fn from_block(b: Block) -> Self {
    Self { size: b.size(), num: b.num(), more: b.more() }
  }

  /// Encode back to a wire [`Block`] option.
  pub fn to_block(self) -> Block {
    Block::new(self.size, self.num, self.more)
  }

  /// Byte offset into the full body that this block's `num` starts at.
  pub fn offset(&self) -> usize {
    self.num as usize * self.size as usize
  }

  /// Advance to the next block number, inheriting `size` and `more`.
  ///
  /// Ordering guarantee (§5): chunks must arrive in ascending `NUM`;
  /// callers use [`BlockState::expects`] to reject an out-of-order chunk
  /// before calling this.
  pub fn next(&self, more: bool) -> Self {
    Self { size: self.size, num: self.num + 1, more }
  }

  /// Whether `candidate` is the block number this state expects next.
  pub fn expects(&self, candidate: &Block) -> bool {
    candidate.num() == self.num
  }
}

/// Sender-side block-wise state (§4.6 "Sender side"): walks a caller's
/// transmit hook, handing out successive chunks of a request body too
/// large for one datagram.
#[derive(Debug, Clone, Copy)]
pub struct Sender {
  state: BlockState,
  total_len: usize,
}

impl Sender {
  /// Start a new block1 upload of a body `total_len` bytes long, using
  /// `szx` as the initial block size (capped to [`MAX_BLOCK_SIZE`]).
  pub fn new(total_len: usize, szx: u16) -> Self {
    let size = szx.min(MAX_BLOCK_SIZE);
    let more = total_len > size as usize;
    Self { state: BlockState::start(size, more), total_len }
  }

  /// The block1 option to attach to the next outgoing chunk.
  pub fn current(&self) -> BlockState {
    self.state
  }

  /// The `[start, end)` byte range of the current chunk within the full body.
  pub fn current_range(&self) -> (usize, usize) {
    let start = self.state.offset();
    let end = (start + self.state.size as usize).min(self.total_len);
    (start, end)
  }

  /// Record that a `2.31 Continue` was received and advance to the next
  /// chunk. Returns `false` once the transfer is complete (§4.6
  /// "Terminate when more_blocks=false in the last sent block").
  pub fn advance(&mut self) -> bool {
    if !self.state.more {
      return false;
    }
    let next_start = self.state.offset() + self.state.size as usize;
    let more = next_start + self.state.size as usize < self.total_len;
    self.state = self.state.next(more);
    true
  }

  /// True once the last chunk (`more=false`) has been sent.
  pub fn complete(&self) -> bool {
    !self.state.more
  }
}

/// Receiver-side block-wise state (§4.6 "Receiver side" / "Server side"):
/// reassembles chunks delivered out of a socket into a contiguous body,
/// rejecting anything but the next expected block number (§5 ordering
/// guarantee).
#[derive(Debug, Clone)]
pub struct Receiver {
  state: BlockState,
  body: Vec<u8>,
}

impl Receiver {
  /// Start tracking a fresh inbound transfer.
  pub fn new() -> Self {
    Self { state: BlockState::start(MAX_BLOCK_SIZE, true), body: Vec::new() }
  }

  /// Feed one chunk in off the wire. `block` is the peer's Block1/Block2
  /// option for this datagram, `chunk` its payload.
  ///
  /// Returns `Ok(true)` when the body is now complete, `Ok(false)` if
  /// more chunks are still expected, or [`Error::InvalidState`] (mapped
  /// by the caller to `RequestIncomplete`, 4.08) if `block` is out of order.
  pub fn accept(&mut self, block: Block, chunk: &[u8]) -> Result<bool> {
    let incoming = BlockState::from_block(block);

    if !self.state.expects(&block) {
      return Err(Error::InvalidState);
    }

    self.body.extend_from_slice(chunk);
    self.state = incoming.next(incoming.more);

    Ok(!incoming.more)
  }

  /// The reassembled body so far. Only meaningful to take once
  /// [`Receiver::accept`] has returned `Ok(true)`.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Byte offset the most recently accepted chunk started at, for
  /// passing to a receive hook alongside the chunk bytes.
  pub fn offset(&self) -> usize {
    self.body.len()
  }
}

impl Default for Receiver {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn sender_walks_3000_byte_body_in_1024_chunks() {
    let mut s = Sender::new(3000, 1024);
    assert_eq!(s.current_range(), (0, 1024));
    assert!(s.current().more);

    assert!(s.advance());
    assert_eq!(s.current_range(), (1024, 2048));
    assert!(s.current().more);

    assert!(s.advance());
    assert_eq!(s.current_range(), (2048, 3000));
    assert!(!s.current().more);

    assert!(!s.advance());
  }

  #[test]
  fn receiver_reassembles_in_order_chunks() {
    let mut r = Receiver::new();
    let b0 = Block::new(1024, 0, true);
    let b1 = Block::new(1024, 1, true);
    let b2 = Block::new(1024, 2, false);

    assert_eq!(r.accept(b0, &[1u8; 1024]).unwrap(), false);
    assert_eq!(r.accept(b1, &[2u8; 1024]).unwrap(), false);
    assert_eq!(r.accept(b2, &[3u8; 952]).unwrap(), true);

    assert_eq!(r.body().len(), 3000);
  }

  #[test]
  fn receiver_rejects_out_of_order_block() {
    let mut r = Receiver::new();
    let b0 = Block::new(1024, 0, true);
    let b2 = Block::new(1024, 2, false);

    r.accept(b0, &[1u8; 1024]).unwrap();
    assert_eq!(r.accept(b2, &[3u8; 952]), Err(Error::InvalidState));
  }
}
