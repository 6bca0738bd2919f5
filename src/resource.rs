//! Resource Dispatch (§4.3, §4.3 expansion): a flat URI-path table plus a
//! default handler and a pre-dispatch interceptor.
//!
//! The teacher solves this with a generic `Ap`-combinator routing DSL
//! (`server/ap/*.rs`) built for arbitrary middleware composition; this
//! spec only ever needs exact-path lookup against a handful of TMF
//! resources, so the table here is a literal `Vec<Resource>` walked
//! linearly, grounded in the simpler `server/path.rs` path-matching
//! helper rather than the `Ap` machinery.

use crate::msg::{code, Message, PathBuf};
use crate::net::Addrd;

/// Outcome of a resource handler or interceptor, deciding whether
/// dispatch should continue to the next stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
  /// The handler fully handled the request; stop dispatching.
  Yes,
  /// The handler declined; try the next stage.
  No,
}

/// Return type of a resource handler: either a response to send, or
/// "not handled" so dispatch can fall through.
#[derive(Debug)]
pub enum HandlerResult {
  /// Send this response to the requester.
  Respond(Message),
  /// This handler doesn't apply; keep walking the dispatch chain.
  NotHandled,
}

/// A request handler function. Boxed since handlers are heterogeneous
/// (different closures capture different per-resource state).
pub type Handler = Box<dyn Fn(&Addrd<Message>) -> HandlerResult + Send + Sync>;

/// One entry in the resource table (§3 "Resource").
pub struct Resource {
  /// Exact Uri-Path this resource answers, without leading/trailing `/`.
  pub uri_path: &'static str,
  handler: Handler,
}

impl core::fmt::Debug for Resource {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Resource").field("uri_path", &self.uri_path).finish_non_exhaustive()
  }
}

impl Resource {
  /// Register a resource at `uri_path` served by `handler`.
  pub fn new(uri_path: &'static str, handler: Handler) -> Self {
    Self { uri_path, handler }
  }
}

/// The agent's resource list, default handler, and optional
/// pre-dispatch interceptor (§4.3).
#[derive(Default)]
pub struct Dispatch {
  resources: Vec<Resource>,
  default_handler: Option<Handler>,
  interceptor: Option<Box<dyn Fn(&Addrd<Message>) -> Handled + Send + Sync>>,
}

impl core::fmt::Debug for Dispatch {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Dispatch")
     .field("resources", &self.resources)
     .field("default_handler", &self.default_handler.as_ref().map(|_| "Handler"))
     .field("interceptor", &self.interceptor.as_ref().map(|_| "Interceptor"))
     .finish()
  }
}

impl Dispatch {
  /// An empty dispatch table with no resources, default handler, or
  /// interceptor registered.
  pub fn new() -> Self {
    Self { resources: Vec::new(), default_handler: None, interceptor: None }
  }

  /// Register a resource at an exact path.
  pub fn add_resource(&mut self, resource: Resource) {
    self.resources.push(resource);
  }

  /// Set the fallback handler run when no resource matches.
  pub fn set_default_handler(&mut self, handler: Handler) {
    self.default_handler = Some(handler);
  }

  /// Set the pre-dispatch interceptor (used by MeshCoP to reject
  /// non-TMF traffic on a shared endpoint before any resource runs).
  pub fn set_interceptor(&mut self, interceptor: impl Fn(&Addrd<Message>) -> Handled + Send + Sync + 'static) {
    self.interceptor = Some(Box::new(interceptor));
  }

  /// Run the interceptor, if any. `false` means the message should be
  /// dropped (`NotTmfError`, §4.3 step 1).
  pub fn intercept(&self, msg: &Addrd<Message>) -> bool {
    self.interceptor.as_ref().map(|i| i(msg) == Handled::Yes).unwrap_or(true)
  }

  /// Dispatch a request by exact Uri-Path match, falling through to the
  /// default handler, per §4.3 step 3:
  /// "match against the resource list by URI-path... else invoke the
  /// default handler... else respond with NotFound, unless multicast."
  pub fn dispatch(&self, msg: &Addrd<Message>, path: &PathBuf, is_multicast: bool) -> Option<Message> {
    let path_str = core::str::from_utf8(path).unwrap_or("");

    for resource in &self.resources {
      if resource.uri_path == path_str {
        if let HandlerResult::Respond(resp) = (resource.handler)(msg) {
          return Some(resp);
        }
      }
    }

    if let Some(default) = &self.default_handler {
      if let HandlerResult::Respond(resp) = default(msg) {
        return Some(resp);
      }
    }

    if is_multicast {
      return None;
    }

    let mut not_found = Message::new(toad_msg::Type::Ack, code::NOT_FOUND, msg.data().id, msg.data().token);
    not_found.payload = toad_msg::Payload(Vec::new());
    Some(not_found)
  }
}

#[cfg(test)]
mod test {
  use no_std_net::{IpAddr, Ipv4Addr, SocketAddr};
  use toad_msg::{Code, Id, Token, Type};

  use super::*;

  fn peer() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 5683)
  }

  fn get(path: &str) -> Addrd<Message> {
    let mut m = Message::new(Type::Con, Code::GET, Id(1), Token(Default::default()));
    m.set_path(path).unwrap();
    Addrd(m, peer())
  }

  #[test]
  fn matches_exact_path() {
    let mut d = Dispatch::new();
    d.add_resource(Resource::new("c/cm",
                                  Box::new(|req: &Addrd<Message>| {
                                    HandlerResult::Respond(Message::new(Type::Ack,
                                                                         code::CHANGED,
                                                                         req.data().id,
                                                                         req.data().token))
                                  })));

    let req = get("c/cm");
    let mut path = PathBuf::new();
    crate::msg::path_into(req.data(), &mut path).unwrap();

    let resp = d.dispatch(&req, &path, false).unwrap();
    assert_eq!(resp.code, code::CHANGED);
  }

  #[test]
  fn unmatched_unicast_path_yields_not_found() {
    let d = Dispatch::new();
    let req = get("nope");
    let mut path = PathBuf::new();
    crate::msg::path_into(req.data(), &mut path).unwrap();

    let resp = d.dispatch(&req, &path, false).unwrap();
    assert_eq!(resp.code, code::NOT_FOUND);
  }

  #[test]
  fn unmatched_multicast_path_yields_no_response() {
    let d = Dispatch::new();
    let req = get("nope");
    let mut path = PathBuf::new();
    crate::msg::path_into(req.data(), &mut path).unwrap();

    assert!(d.dispatch(&req, &path, true).is_none());
  }
}
