//! CoAP Agent (client + server), §4.3: binds a [`Socket`], owns the
//! pending-request table, response cache, and resource dispatch, and
//! runs the retransmission sweep on every `tick`.
//!
//! Grounded in the teacher's `core::Core<P: Platform>`, but monomorphic
//! over `Socket`/`Clock` directly instead of the teacher's
//! const-generic `Platform` trait -- this spec only ever needs one
//! concrete message representation (`toad_msg::alloc::Message`) and one
//! concrete set of bounded tables, so the extra type parameter the
//! teacher carries to let callers swap those out buys nothing here.

use no_std_net::SocketAddr;
use toad_msg::{CodeKind, Token, TryFromBytes, TryIntoBytes, Type};

use crate::cache::{CacheKey, ResponseCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::msg::{Message, PathBuf};
use crate::net::{Addrd, MessageInfo, Socket};
use crate::pending::{Outcome, PendingRequest, PendingTable, ResponseHandler};
use crate::resource::Dispatch;
use crate::retry::{RetryTimer, YouShould};
use crate::time::Clock;
use crate::token::TokenGenerator;
use crate::txparams::TxParams;

/// Ties together the message codec, pending-request table, response
/// cache, and resource dispatch on top of one [`Socket`] (§4.3).
pub struct Agent<S: Socket, C: Clock> {
  sock: S,
  clock: C,
  config: Config,
  tokens: TokenGenerator<C>,
  pending: PendingTable,
  cache: ResponseCache,
  /// The agent's resource list, default handler, and interceptor.
  pub dispatch: Dispatch,
  response_fallback: Option<ResponseHandler>,
}

impl<S: Socket, C: Clock> core::fmt::Debug for Agent<S, C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Agent")
     .field("config", &self.config)
     .field("pending", &self.pending)
     .field("cache", &self.cache)
     .finish_non_exhaustive()
  }
}

impl<S: Socket, C: Clock> Agent<S, C> {
  /// Create a new agent bound to `sock`, driven by `clock`, with default
  /// configuration.
  pub fn new(sock: S, clock: C) -> Self {
    Self::with_config(sock, clock, Config::default())
  }

  /// Create a new agent with custom configuration.
  pub fn with_config(sock: S, clock: C, config: Config) -> Self {
    Self { tokens: TokenGenerator::new(config.token_seed),
           pending: PendingTable::new(config.capacities.max_pending_requests),
           cache: ResponseCache::new(config.capacities.max_cache_size),
           dispatch: Dispatch::new(),
           response_fallback: None,
           sock,
           clock,
           config }
  }

  /// Register the fallback invoked for a response matching no pending
  /// request (§4.3 "Inbound receive").
  pub fn set_response_fallback(&mut self, handler: ResponseHandler) {
    self.response_fallback = Some(handler);
  }

  fn now_ms(&self) -> u64 {
    crate::time::now_millis(&self.clock).unwrap_or(0)
  }

  fn exchange_lifetime_ms(&self) -> u64 {
    self.config.tx_params.exchange_lifetime_ms()
  }

  /// Outgoing send contract (§4.3 "Outgoing send contract").
  ///
  /// `handler` is invoked once the exchange reaches a terminal state (or,
  /// for an Observe GET, on every notification). `tx_params` overrides
  /// the agent's default retransmission parameters for this request.
  pub fn send(&mut self,
              mut msg: Message,
              peer: SocketAddr,
              tx_params: Option<TxParams>,
              handler: Option<ResponseHandler>)
              -> Result<()> {
    let confirmable = msg.ty == Type::Con;
    let params = tx_params.unwrap_or(self.config.tx_params);
    params.validate(confirmable)?;

    match msg.ty {
      | Type::Ack => {
        let key = CacheKey { peer, id: msg.id };
        self.cache.insert(key, msg.clone(), self.now_ms() + self.exchange_lifetime_ms());
      },
      | Type::Reset => {
        if msg.code.kind() != CodeKind::Empty {
          return Err(Error::InvalidArgs);
        }
      },
      | Type::Con | Type::Non => {
        msg.id = self.tokens.next_id(&self.clock, peer, self.exchange_lifetime_ms());
      },
    }

    let observe_intent = crate::observe::intent(&msg);
    if observe_intent == crate::observe::Intent::Deregister {
      if let Some(ix) = crate::observe::find_subscription(&self.pending, peer, msg.token) {
        self.pending.finalize(ix, Outcome::Cancelled, None);
      }
    }
    let is_observe_register = observe_intent == crate::observe::Intent::Register && handler.is_some();

    let should_track = confirmable || (msg.ty == Type::Non && handler.is_some());

    if should_track {
      let now = self.now_ms();
      let retry = confirmable.then(|| RetryTimer::new(now, &params, u64::from(msg.id.0)));

      let req = PendingRequest { message: msg.clone(),
                                peer,
                                multicast: peer.ip().is_multicast(),
                                acknowledged: false,
                                confirmable,
                                observe: is_observe_register,
                                is_request: true,
                                retry,
                                handler };
      self.pending.insert(req)?;
    }

    self.transmit(&msg, peer)
  }

  fn transmit(&self, msg: &Message, peer: SocketAddr) -> Result<()> {
    let bytes: Vec<u8> = msg.clone()
                            .try_into_bytes()
                            .map_err(|_| Error::NoBufs)?;
    self.sock.send(Addrd(&bytes, peer)).map_err(|_| Error::Drop)
  }

  /// Retransmission timer sweep (§4.3 "Retransmission timer"): walk all
  /// pending requests, retransmitting or finalizing as due.
  pub fn tick(&mut self) {
    self.cache.sweep(self.now_ms());

    let now = self.now_ms();

    for ix in self.pending.live_indices() {
      let Some(req) = self.pending.get(ix) else { continue };
      if req.observe {
        continue;
      }

      let Some(mut retry) = req.retry else {
        if !req.confirmable {
          self.pending.finalize(ix, Outcome::TimedOut, None);
        }
        continue;
      };

      match retry.what_should_i_do(now) {
        | None => {},
        | Some(YouShould::Cry) => self.pending.finalize(ix, Outcome::TimedOut, None),
        | Some(YouShould::Retry) => {
          let (should_send, body, peer) = {
            let req = self.pending.get_mut(ix).expect("checked live above");
            req.retry = Some(retry);
            (!req.acknowledged, req.message.clone(), req.peer)
          };
          if should_send {
            let _ = self.transmit(&body, peer);
          }
        },
      }
    }
  }

  /// Inbound receive (§4.3 "Inbound receive"). Call once per datagram
  /// pulled off the socket.
  pub fn receive(&mut self, info: MessageInfo, bytes: &[u8]) {
    let peer = info.peer();

    let msg = match Message::try_from_bytes(bytes) {
      | Ok(msg) => msg,
      | Err(_) => {
        if !info.is_multicast() {
          self.send_rst_for_unparseable(peer);
        }
        return;
      },
    };

    self.tokens.seen_id(&self.clock, peer, msg.id, self.exchange_lifetime_ms());
    self.tokens.seen_token(&self.clock, peer, msg.token, self.exchange_lifetime_ms());

    if crate::msg::is_request(msg.code) {
      self.handle_request(Addrd(msg, peer), info.is_multicast());
    } else {
      self.handle_response(Addrd(msg, peer));
    }
  }

  fn send_rst_for_unparseable(&self, peer: SocketAddr) {
    let rst = Message::new(Type::Reset, toad_msg::Code::EMPTY, toad_msg::Id(0), Token(Default::default()));
    let _ = self.transmit(&rst, peer);
  }

  fn handle_request(&mut self, msg: Addrd<Message>, is_multicast: bool) {
    if !self.dispatch.intercept(&msg) {
      return;
    }

    let key = CacheKey { peer: msg.addr(), id: msg.data().id };
    if let Some(cached) = self.cache.get(key, self.now_ms()) {
      let _ = self.transmit(cached, msg.addr());
      return;
    }

    let mut path = PathBuf::new();
    if crate::msg::path_into(msg.data(), &mut path).is_err() {
      return;
    }

    match self.dispatch.dispatch(&msg, &path, is_multicast) {
      | Some(resp) => {
        let _ = self.send(resp, msg.addr(), None, None);
      },
      | None if !is_multicast => {
        let rst = Message::new(Type::Reset, toad_msg::Code::EMPTY, msg.data().id, Token(Default::default()));
        let _ = self.transmit(&rst, msg.addr());
      },
      | None => {},
    }
  }

  fn handle_response(&mut self, msg: Addrd<Message>) {
    let peer = msg.addr();
    let data = msg.data().clone();

    match data.ty {
      | Type::Reset => {
        if let Some(ix) = self.pending.find_by_id(peer, data.id) {
          self.pending.finalize(ix, Outcome::Aborted, None);
        }
      },
      | Type::Ack if data.code.kind() == CodeKind::Empty => {
        if let Some(ix) = self.pending.find_by_id(peer, data.id) {
          let is_observe = self.pending.get(ix).map(|r| r.observe).unwrap_or(false);
          if is_observe {
            self.pending.finalize(ix, Outcome::Delivered, None);
          } else {
            let has_handler = self.pending.get(ix).map(|r| r.handler.is_some()).unwrap_or(false);
            if let Some(r) = self.pending.get_mut(ix) {
              r.acknowledged = true;
            }
            if !has_handler {
              self.pending.remove(ix);
            }
          }
        }
      },
      | Type::Ack => {
        if let Some(ix) = self.pending.find_by_token(peer, data.token) {
          self.deliver_or_finalize(ix, data);
        } else if let Some(fallback) = &mut self.response_fallback {
          fallback(Outcome::Delivered, Some(data));
        }
      },
      | Type::Con => {
        let ack = Message::new(Type::Ack, toad_msg::Code::EMPTY, data.id, Token(Default::default()));
        let _ = self.transmit(&ack, peer);
        self.deliver_non_or_con_response(peer, data);
      },
      | Type::Non => {
        self.deliver_non_or_con_response(peer, data);
      },
    }
  }

  fn deliver_non_or_con_response(&mut self, peer: SocketAddr, resp: Message) {
    let token = resp.token;
    if let Some(ix) = self.pending.find_by_token(peer, token) {
      self.deliver_or_finalize(ix, resp);
    } else if let Some(fallback) = &mut self.response_fallback {
      fallback(Outcome::Delivered, Some(resp));
    }
  }

  /// Deliver `resp` to the tracked request at `ix`. An Observe
  /// subscription, or a request sent to a multicast destination, stays
  /// tracked to receive further responses; anything else finalizes.
  fn deliver_or_finalize(&mut self, ix: usize, resp: Message) {
    let keep_alive =
      self.pending.get(ix).map(|r| r.observe || r.multicast).unwrap_or(false);

    if keep_alive {
      self.pending.notify(ix, Outcome::Delivered, Some(resp));
    } else {
      self.pending.finalize(ix, Outcome::Delivered, Some(resp));
    }
  }

  /// §5 "ClearAllRequestsAndResponses": abort every pending request and
  /// empty the cache.
  pub fn clear_all(&mut self) {
    for ix in self.pending.live_indices() {
      self.pending.finalize(ix, Outcome::Aborted, None);
    }
    self.cache.remove_all();
  }
}
