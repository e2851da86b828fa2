//! Error kinds for the codec and session layers (§7).
//!
//! The codec never panics on untrusted input: every length field is
//! bounds-checked against the remaining buffer before use, and a malformed
//! message always produces a [`DecodeError`] rather than an index panic.

use thiserror::Error;

/// Malformed input: truncated payload, unknown kind code, non-UTF-8 text,
/// duplicate DICT key, unaligned length. Fatal to the current message; the
/// connection that produced it is closed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown type code {0}")]
    UnknownKind(u8),

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 {
        field: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("duplicate DICT key {0:?}")]
    DuplicateKey(String),

    #[error("length {len} is not 8-byte aligned")]
    Unaligned { len: usize },

    #[error("dict key end-offset {offset} is before the previous end-offset {previous}")]
    KeyOffsetOutOfOrder { offset: usize, previous: usize },

    #[error("container has {len} elements, exceeding the limit of {limit}")]
    ContainerTooLarge { len: usize, limit: usize },

    #[error("frame payload could not be decoded: {0}")]
    Frame(String),
}

/// The handshake credential byte was 0 (rejected).
#[derive(Debug, Error)]
#[error("authentication rejected by server")]
pub struct AuthError;

/// Raised by the external evaluator. For sync requests this is encoded as
/// an ERR value and returned to the caller normally; for async requests it
/// is logged and dropped.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(msg: impl Into<String>) -> Self {
        EvalError(msg.into())
    }
}

/// Socket closed, partial read returning 0 bytes, or write failure.
/// Terminates the connection silently (no decode error is produced).
#[derive(Debug, Error)]
pub enum IoError {
    #[error("peer disconnected")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A client attempted `sync`/`async`/`close` on a handle that does not wrap
/// a socket connection. Surfaced to the caller; the connection, if any, is
/// left untouched.
#[derive(Debug, Error)]
#[error("operation not supported on this handle: {0}")]
pub struct TypeError(pub &'static str);

/// Top-level error type returned by the session endpoint.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(IoError::Io(e))
    }
}
