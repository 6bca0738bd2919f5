//! Observe Engine (RFC 7641, §4.7): subscription bookkeeping layered on
//! top of the pending-request table rather than a separate structure,
//! since a subscription is just a [`crate::pending::PendingRequest`] that
//! never times out and is never dequeued on a matching ACK.
//!
//! Grounded in `toad_msg::opt::known::observe::Action` for the wire
//! representation; the subscription lifecycle itself (register on `GET
//! Observe=0`, cancel on a fresh `GET Observe=1`, deliver-without-dequeue
//! on notification) has no teacher counterpart and is built directly
//! from §4.7.

use no_std_net::SocketAddr;
use toad_msg::observe::Action;
use toad_msg::{MessageOptions, Token};

use crate::msg::Message;
use crate::pending::PendingTable;

/// What an outgoing GET's Observe option means for this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
  /// No Observe option present; ordinary request.
  None,
  /// `Observe=0`: register a new subscription.
  Register,
  /// `Observe=1`: cancel a previous matching subscription.
  Deregister,
}

/// Inspect a message's Observe option (if any) to determine what the
/// sender is asking for.
pub fn intent(msg: &Message) -> Intent {
  match msg.observe_action() {
    | Some(Action::Register) => Intent::Register,
    | Some(Action::Deregister) => Intent::Deregister,
    | None => Intent::None,
  }
}

/// Read the raw Observe option off a message, if present, as an
/// [`Action`]. Mirrors `toad_msg`'s `MessageOptions::block1`-style
/// helpers, which don't cover Observe directly.
pub trait ObserveOption {
  /// The message's Observe action, if the option is present and valid.
  fn observe_action(&self) -> Option<Action>;
}

impl ObserveOption for Message {
  fn observe_action(&self) -> Option<Action> {
    self.get_u8(toad_msg::opt::known::no_repeat::OBSERVE)
        .and_then(Action::from_byte)
  }
}

/// Find the subscription (if any) in `table` that a fresh `GET
/// Observe=1` from `peer`/`token` should cancel.
///
/// Per §4.7, cancellation finalizes the prior subscription as `Ok` with
/// a `None` response passed to the caller's handler, rather than
/// treating it as a timeout or abort.
pub fn find_subscription(table: &PendingTable, peer: SocketAddr, token: Token) -> Option<usize> {
  table.live_indices().into_iter().find(|&ix| {
    table.get(ix)
         .map(|r| r.observe && r.token() == token && r.accepts_reply_from(peer))
         .unwrap_or(false)
  })
}
