//! Network abstractions: the UDP transport contract this core consumes,
//! and the `Addrd<T>` / `MessageInfo` wrappers threaded through every
//! send and receive path.
//!
//! Grounded in the teacher's `net.rs`. The generic `Array`-backed datagram
//! buffer is simplified to `Vec<u8>` here since this core targets the
//! `std`/`alloc` feature set the teacher itself defaults to
//! (`toad/Cargo.toml`: `default = ["std", "std_serde_json"]`).

use no_std_net::{IpAddr, SocketAddr};

/// Data that came from (or is going to) a network socket, paired with the
/// peer address.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addrd.
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket address and get the data.
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addrd.
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents.
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the contents.
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the socket address.
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

/// IPv6-level metadata carried alongside a message, mirroring
/// `Ip6::MessageInfo` (§6): everything the 6LoWPAN/IPv6 layer below the
/// core knows about a datagram that the core itself needs to make
/// routing and multicast decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
  /// Address of the peer (sender for inbound, destination for outbound).
  pub peer_addr: IpAddr,
  /// UDP port of the peer.
  pub peer_port: u16,
  /// Local address the message was sent from / received on.
  pub sock_addr: IpAddr,
  /// IPv6 hop limit to use (outbound) or that was observed (inbound).
  pub hop_limit: u8,
  /// Whether loopback delivery should occur for multicast sends.
  pub multicast_loop: bool,
  /// Whether this message's destination is a host (not on-mesh) interface.
  pub is_host_interface: bool,
}

impl MessageInfo {
  /// Construct message info for a conversation with `peer` on `sock_addr`,
  /// using the stack's usual defaults (hop limit 64, no multicast loop).
  pub fn new(peer_addr: IpAddr, peer_port: u16, sock_addr: IpAddr) -> Self {
    Self { peer_addr,
           peer_port,
           sock_addr,
           hop_limit: 64,
           multicast_loop: false,
           is_host_interface: false }
  }

  /// `SocketAddr` view of the peer (addr + port), useful for pending-request
  /// and cache keys.
  pub fn peer(&self) -> SocketAddr {
    SocketAddr::new(self.peer_addr, self.peer_port)
  }

  /// True if `peer_addr` is a multicast address.
  pub fn is_multicast(&self) -> bool {
    self.peer_addr.is_multicast()
  }
}

/// Address-scope classification relevant to the backbone TMF endpoint
/// filter (§6 "Backbone TMF endpoint"). Built by whatever IPv6 address
/// table sits below this core; this crate only combines the three
/// booleans it cares about, the same way `MessageInfo` exposes the facts
/// a transport layer already knows rather than re-deriving them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackboneScope {
  /// Link-local unicast or multicast.
  LinkLocal,
  /// The "All Network BBRs" realm-local multicast address.
  AllNetworkBbrs,
  /// The "All Domain BBRs" realm-local multicast address.
  AllDomainBbrs,
  /// Anything else, including non-link-local backbone unicast.
  Other,
}

/// Whether the backbone TMF endpoint (UDP port 61631, §6) accepts a
/// message from a backbone-link-local source addressed to `dest_scope`.
///
/// Mirrors the filtering rule exactly as the source states it:
/// `IsLinkLocal || == AllNetworkBBRs || == AllDomainBBRs`. A unicast
/// backbone destination outside link-local scope is deliberately
/// excluded rather than assumed accepted.
pub fn backbone_tmf_accepts(source_is_backbone_link_local: bool, dest_scope: BackboneScope) -> bool {
  source_is_backbone_link_local
  && matches!(dest_scope,
              BackboneScope::LinkLocal | BackboneScope::AllNetworkBbrs | BackboneScope::AllDomainBbrs)
}

/// A CoAP network socket.
///
/// Mirrors the UDP socket traits in `embedded-nal`, but allows implementing
/// for foreign types (like `std::net::UdpSocket`). `connect`ing is expected
/// to modify the internal state of a [`Socket`], not yield a connected
/// socket type.
pub trait Socket: Sized {
  /// The error yielded by socket operations.
  type Error: core::fmt::Debug;

  /// Get the local address this socket was created from.
  fn local_addr(&self) -> SocketAddr;

  /// Send a message to a remote address.
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull a buffered datagram from the socket, along with the sender's address.
  ///
  /// As with [`std::net::UdpSocket`], if the message is larger than `buffer`
  /// those bytes are dropped rather than treated as an error.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Poll the socket for a single datagram.
  fn poll(&self) -> Result<Option<Addrd<Vec<u8>>>, Self::Error> {
    let mut buf = vec![0u8; 2048];
    match self.recv(&mut buf) {
      | Ok(Addrd(n, addr)) => {
        buf.truncate(n);
        Ok(Some(Addrd(buf, addr)))
      },
      | Err(nb::Error::WouldBlock) => Ok(None),
      | Err(nb::Error::Other(e)) => Err(e),
    }
  }

  /// Join a multicast group.
  fn join_multicast(&self, addr: IpAddr) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn backbone_tmf_accepts_link_local_and_the_two_bbr_multicast_scopes() {
    assert!(backbone_tmf_accepts(true, BackboneScope::LinkLocal));
    assert!(backbone_tmf_accepts(true, BackboneScope::AllNetworkBbrs));
    assert!(backbone_tmf_accepts(true, BackboneScope::AllDomainBbrs));
  }

  #[test]
  fn backbone_tmf_rejects_other_destination_scopes_even_from_a_link_local_source() {
    assert!(!backbone_tmf_accepts(true, BackboneScope::Other));
  }

  #[test]
  fn backbone_tmf_rejects_a_non_link_local_source_regardless_of_destination() {
    assert!(!backbone_tmf_accepts(false, BackboneScope::LinkLocal));
    assert!(!backbone_tmf_accepts(false, BackboneScope::AllNetworkBbrs));
  }
}
