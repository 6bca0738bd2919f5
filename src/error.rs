//! Error kinds shared across the core.
//!
//! Send paths return these synchronously; receive paths never surface
//! them to callers directly (see the module docs on [`crate::agent`]).

use toad_msg::parse_error::MessageParseError;

/// An error encounterable from anywhere in the core.
///
/// This is deliberately one flat enum rather than a per-module hierarchy:
/// the teacher's own `core::error::What<P>` does the same, and letting a
/// `PendingTable::Full` and a `Codec::Malformed` both read as values of the
/// same type keeps `?` usable everywhere a `Result` is threaded through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
  /// Pool or buffer exhausted; caller may retry later.
  NoBufs,
  /// Malformed wire data.
  Parse,
  /// Caller violated a precondition.
  InvalidArgs,
  /// Operation not legal in current state.
  InvalidState,
  /// No matching entry.
  NotFound,
  /// Resource already in desired state.
  Already,
  /// Transaction currently in progress.
  Busy,
  /// Silently drop (internal).
  Drop,
  /// Transaction cancelled or peer sent RST.
  Abort,
  /// No response within allowed retries.
  ResponseTimeout,
  /// Interceptor rejected the message.
  NotTmf,
  /// Feature compiled out.
  NotCapable,
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    core::fmt::Debug::fmt(self, f)
  }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<MessageParseError> for Error {
  fn from(_: MessageParseError) -> Self {
    Error::Parse
  }
}

/// Shorthand alias used throughout the core.
pub type Result<T> = core::result::Result<T, Error>;
