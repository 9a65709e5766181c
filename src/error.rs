//! Crate-level error types.
//!
//! Mirrors the manual `Debug`/`Display`/`Error` style used for error enums
//! elsewhere in the pack (no `thiserror`): each variant carries just enough
//! data to reconstruct a useful message, and `Display` does the formatting.

use std::fmt;

/// Sentinel delivered via `on_read` when the inbound side closes cleanly.
///
/// `0` means "no error"; any other value is opaque to the adapter and is
/// simply threaded through from `inbound_error` or produced on close.
pub type ErrCode = u32;

/// The code used for `received_shutdown` / peer close-notify.
pub const EOF: ErrCode = 1;

/// Fatal errors raised while driving the TLS engine or runtime.
#[derive(Debug, Clone)]
pub enum AdapterError {
    /// The TLS engine could not be constructed (bad config, bad SNI name, ...).
    EngineInit(String),
    /// The engine rejected the requested cipher-suite restriction at `init`.
    CipherRejected(String),
    /// A wrap or unwrap call raised a TLS-level error (bad record, alert, ...).
    Tls(String),
    /// The configured `Runtime` failed to accept a dispatched job.
    RuntimeDispatch(String),
    /// I/O error surfaced while draining engine buffers (should not normally
    /// occur since this adapter never touches a socket, but the underlying
    /// engine's buffered API is `io::Write`/`io::Read`-shaped).
    Io(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::EngineInit(msg) => write!(f, "engine init failed: {msg}"),
            AdapterError::CipherRejected(msg) => write!(f, "cipher suite rejected: {msg}"),
            AdapterError::Tls(msg) => write!(f, "TLS error: {msg}"),
            AdapterError::RuntimeDispatch(msg) => write!(f, "runtime dispatch failed: {msg}"),
            AdapterError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<std::io::Error> for AdapterError {
    fn from(e: std::io::Error) -> Self {
        AdapterError::Io(e.to_string())
    }
}

/// Peer-authentication failure observed during handshake completion.
///
/// Reported as data via `Connection::verify_error`, never thrown: the
/// upstream layer reads this after `on_handshake_done` and decides policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The engine reports the peer as unverified (no certificate exchanged
    /// for the negotiated cipher, or client auth not performed).
    Unverified,
    /// The peer offered a certificate chain with no certificates in it.
    NoCertificates,
    /// No trust store was configured, so no chain could be validated.
    NoTrustedCas,
    /// Trust-chain validation ran and rejected the peer's certificate.
    Rejected(String),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Unverified => write!(f, "peer is unverified"),
            VerifyError::NoCertificates => write!(f, "peer has no certificates"),
            VerifyError::NoTrustedCas => write!(f, "no trusted CAs"),
            VerifyError::Rejected(msg) => write!(f, "peer certificate rejected: {msg}"),
        }
    }
}

impl std::error::Error for VerifyError {}
