//! Memory-only TLS session adapter.
//!
//! Bridges a byte-stream I/O layer and a TLS record-processing engine: takes
//! plaintext to encrypt and ciphertext to decrypt, drives the handshake to
//! completion, runs peer-certificate verification, and emits the resulting
//! ciphertext/plaintext plus lifecycle events to callbacks. Does no socket
//! I/O of its own -- that, and certificate/trust-store loading, are left to
//! the caller.
//!
//! [`Connection`] is the entry point. It is generic over an [`engine::Engine`]
//! (the TLS primitive; [`engine::RustlsEngine`] is the concrete `rustls`
//! backing) and a [`runtime::Runtime`] (the host's thread pool and event
//! loop; [`runtime::ThreadPoolRuntime`] and [`runtime::InlineRuntime`] are
//! the two backings provided here).

pub mod buffer;
pub mod callbacks;
pub mod chunk;
pub mod connection;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod verify;

pub use connection::Connection;
pub use engine::{
    default_trust_store, Engine, EngineConfig, HandshakeStatus, Role, RustlsEngine, Status, WrapResult,
};
pub use error::{AdapterError, ErrCode, VerifyError};
pub use runtime::{DomainTag, InlineRuntime, Runtime, ThreadPoolRuntime};
#[cfg(feature = "work-stealing")]
pub use runtime::WorkStealingRuntime;
