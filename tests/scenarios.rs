//! End-to-end scenarios from the "Testable Properties" section: drives a
//! real [`thread_core::agent::Agent`] against a recording/replaying mock
//! socket and a manually-advanced clock, the only way an external crate
//! can exercise `send`/`tick`/`receive` together without the library's
//! own `#[cfg(test)]`-only `FakeClock`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use embedded_time::clock::Error as ClockError;
use embedded_time::rate::Fraction;
use embedded_time::Instant;
use no_std_net::{IpAddr, Ipv4Addr, SocketAddr};
use thread_core::agent::Agent;
use thread_core::msg::{code, Message};
use thread_core::net::{Addrd, MessageInfo, Socket};
use thread_core::pending::Outcome;
use thread_core::resource::{Dispatch, HandlerResult, Resource};
use tinyvec::array_vec;
use toad_msg::{Code, Id, Payload, Token, TryFromBytes, TryIntoBytes, Type};

/// A clock whose "now" is an explicit millisecond counter the test
/// advances by hand.
struct TestClock(Arc<AtomicU32>);

impl embedded_time::Clock for TestClock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

  fn try_now(&self) -> Result<Instant<Self>, ClockError> {
    Ok(Instant::new(u64::from(self.0.load(Ordering::SeqCst))))
  }
}

/// Records every datagram sent, behind a handle the test keeps after
/// moving the socket into the `Agent`. `recv` always reports "nothing
/// buffered" since these tests feed inbound datagrams to
/// `Agent::receive` directly rather than through a live socket.
struct MockSocket {
  local: SocketAddr,
  sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
}

impl Socket for MockSocket {
  type Error = ();

  fn local_addr(&self) -> SocketAddr {
    self.local
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.sent.lock().unwrap().push((msg.addr(), msg.data().to_vec()));
    Ok(())
  }

  fn recv(&self, _buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    Err(nb::Error::WouldBlock)
  }

  fn join_multicast(&self, _addr: IpAddr) -> Result<(), Self::Error> {
    Ok(())
  }
}

fn peer() -> SocketAddr {
  SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 5683)
}

fn local() -> SocketAddr {
  SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 5683)
}

fn info_from(peer: SocketAddr, local: SocketAddr) -> MessageInfo {
  MessageInfo::new(peer.ip(), peer.port(), local.ip())
}

fn token(b: u8) -> Token {
  Token(array_vec!([u8; 8] => b))
}

fn new_agent() -> (Agent<MockSocket, TestClock>, Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>) {
  let clock = TestClock(Arc::new(AtomicU32::new(0)));
  let sent = Arc::new(Mutex::new(Vec::new()));
  let sock = MockSocket { local: local(), sent: sent.clone() };
  (Agent::new(sock, clock), sent)
}

fn take_sent(sent: &Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>) -> Vec<(SocketAddr, Vec<u8>)> {
  std::mem::take(&mut *sent.lock().unwrap())
}

/// Scenario A: basic CON request round trip, one handler invocation,
/// no retransmissions.
#[test]
fn scenario_a_basic_con_round_trip() {
  let (mut agent, sent) = new_agent();

  let mut req = Message::new(Type::Con, Code::POST, Id(10), token(0xA1));
  req.set_path("test").unwrap();

  let delivered = Arc::new(Mutex::new(Vec::new()));
  let sink = delivered.clone();
  agent.send(req,
             peer(),
             None,
             Some(Box::new(move |outcome, resp| sink.lock().unwrap().push((outcome, resp)))))
       .unwrap();

  let first = take_sent(&sent);
  assert_eq!(first.len(), 1);
  let (sent_peer, sent_bytes) = &first[0];
  assert_eq!(*sent_peer, peer());
  let sent_msg = Message::try_from_bytes(sent_bytes.as_slice()).unwrap();

  let resp = Message::new(Type::Ack, code::CHANGED, sent_msg.id, sent_msg.token);
  let bytes: Vec<u8> = resp.try_into_bytes().unwrap();
  agent.receive(info_from(peer(), local()), &bytes);

  let calls = delivered.lock().unwrap();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0].0, Outcome::Delivered);
  assert_eq!(calls[0].1.as_ref().unwrap().code, code::CHANGED);

  // no further sends beyond the original request
  assert!(take_sent(&sent).is_empty());
}

/// Scenario C: separate response -- CON GET, empty ACK (acknowledged,
/// no delivery), then a later NON response delivers and dequeues.
#[test]
fn scenario_c_separate_response() {
  let (mut agent, sent) = new_agent();

  let mut req = Message::new(Type::Con, Code::GET, Id(0x1234), token(0xB2));
  req.set_path("sensor").unwrap();

  let delivered = Arc::new(Mutex::new(Vec::new()));
  let sink = delivered.clone();
  agent.send(req,
             peer(),
             None,
             Some(Box::new(move |outcome, resp| sink.lock().unwrap().push((outcome, resp)))))
       .unwrap();

  let sent_bytes = take_sent(&sent);
  let sent_msg = Message::try_from_bytes(sent_bytes[0].1.as_slice()).unwrap();

  let empty_ack = Message::new(Type::Ack, toad_msg::Code::EMPTY, sent_msg.id, Token(Default::default()));
  let ack_bytes: Vec<u8> = empty_ack.try_into_bytes().unwrap();
  agent.receive(info_from(peer(), local()), &ack_bytes);

  assert!(delivered.lock().unwrap().is_empty(), "empty ack must not deliver yet");

  let content = Message::new(Type::Non, code::CONTENT, Id(77), token(0xB2));
  let content_bytes: Vec<u8> = content.try_into_bytes().unwrap();
  agent.receive(info_from(peer(), local()), &content_bytes);

  let calls = delivered.lock().unwrap();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0].0, Outcome::Delivered);
  assert_eq!(calls[0].1.as_ref().unwrap().code, code::CONTENT);
}

/// Scenario D: server dedup via the response cache -- the resource
/// handler runs once; a duplicate `{peer, id}` re-sends the cached ACK
/// verbatim instead of re-invoking the handler.
#[test]
fn scenario_d_server_dedup_via_response_cache() {
  let (mut agent, sent) = new_agent();

  let hits = Arc::new(AtomicU32::new(0));
  let counter = hits.clone();
  let mut dispatch = Dispatch::new();
  dispatch.add_resource(Resource::new("a",
                                       Box::new(move |req: &Addrd<Message>| {
                                         counter.fetch_add(1, Ordering::SeqCst);
                                         HandlerResult::Respond(Message::new(Type::Ack,
                                                                              code::CHANGED,
                                                                              req.data().id,
                                                                              req.data().token))
                                       })));
  agent.dispatch = dispatch;

  let mut req = Message::new(Type::Con, Code::POST, Id(5), token(0x01));
  req.set_path("a").unwrap();
  req.payload = Payload(b"hello".to_vec());
  let bytes: Vec<u8> = req.clone().try_into_bytes().unwrap();

  agent.receive(info_from(peer(), local()), &bytes);
  assert_eq!(hits.load(Ordering::SeqCst), 1);
  let first_sent = take_sent(&sent);
  assert_eq!(first_sent.len(), 1);

  agent.receive(info_from(peer(), local()), &bytes);
  assert_eq!(hits.load(Ordering::SeqCst), 1, "resource handler must not run twice");

  let second_sent = take_sent(&sent);
  assert_eq!(second_sent.len(), 1);
  assert_eq!(first_sent[0].1, second_sent[0].1, "cached ack resent verbatim");
}
