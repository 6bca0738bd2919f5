//! `thread-core` is a CoAP (Constrained Application Protocol) engine plus
//! the Thread mesh-networking management primitives built directly on top
//! of it.
//!
//! ## CoAP
//! CoAP is an application-level network protocol that copies the semantics
//! of HTTP to an environment conducive to **constrained** devices. (weak
//! hardware, small battery capacity, etc.)
//!
//! ### Similarities to HTTP
//! CoAP has the same verbs and many of the same semantics as HTTP;
//! - GET, POST, PUT, DELETE
//! - Headers (renamed to [Options](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10))
//! - Data format independent (via the [Content-Format](https://datatracker.ietf.org/doc/html/rfc7252#section-12.3) Option)
//! - [Response status codes](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9)
//!
//! ### Differences from HTTP
//! - CoAP customarily sits on top of UDP.
//! - Because UDP is connectionless, it offers no guarantee of "conversation"
//!   between traditional client and server roles; CoAP machines are
//!   expected to perform both client and server (sender/receiver) roles.
//!
//! ## Thread
//! Layered on the CoAP engine are the Thread mesh-networking management
//! primitives: MeshCoP commissioning and dataset management, the
//! Joiner-Router relay, MLE router-table routing, and the MLR multicast
//! listener registration client.

// docs
#![doc(html_root_url = "https://docs.rs/thread-core/0.1.0")]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]
// -
// features
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc as std_alloc;

/// Errors shared across the core.
pub mod error;

/// Time abstractions.
pub mod time;

/// Network abstractions.
pub mod net;

/// Transmission parameters (retransmission timing, §4.2).
pub mod txparams;

/// Runtime configuration.
pub mod config;

/// Non-blocking retransmission timer.
pub mod retry;

/// Message helpers layered on `toad_msg`.
pub mod msg;

/// Message-id / token generation and de-duplication history.
pub mod token;

/// Server-side response cache (§4.4).
pub mod cache;

/// The pending-request table (§4.3).
pub mod pending;

/// Block-wise transfer (RFC 7959, §4.5/§4.6).
pub mod block;

/// Observe Engine (RFC 7641, §4.7).
pub mod observe;

/// Server-side resource dispatch.
pub mod resource;

/// The CoAP Agent: the client+server entry point tying the rest of the
/// core together.
pub mod agent;

/// Mesh Commissioning Protocol (§4.8, §4.9).
pub mod meshcop;

/// Mesh Link Establishment router table and Route TLV logic (§4.10).
pub mod mle;

/// Multicast Listener Registration client (§4.11).
pub mod mlr;
