//! The `Engine` capability: the TLS record-processing primitive the
//! `Connection` drives. Out of scope per the spec ("the underlying TLS
//! primitive"), but modeled here as a trait so the adapter is testable
//! against a mock and usable against the concrete `rustls` backing.

mod config;
mod rustls_engine;

pub use config::{default_trust_store, EngineConfig};
pub use rustls_engine::RustlsEngine;

use crate::buffer::ScratchBuffer;
use crate::error::AdapterError;
use rustls_pki_types::CertificateDer;

/// Client or server role, fixed for the lifetime of an `Engine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The engine's current demand, or quiescence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    NeedWrap,
    NeedUnwrap,
    NeedTask,
    Finished,
    NotHandshaking,
}

/// Outcome of a single `wrap`/`unwrap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BufferOverflow,
    BufferUnderflow,
    Closed,
}

/// Result shape shared by `wrap` and `unwrap`.
#[derive(Debug, Clone, Copy)]
pub struct WrapResult {
    pub status: Status,
    pub handshake_status: HandshakeStatus,
    /// Bytes written into the output `ScratchBuffer` by this call.
    pub bytes_produced: usize,
    /// Bytes consumed from the input slice by this call. Not named in the
    /// distilled spec's external-interface table, but required to implement
    /// the chunk-consumption bookkeeping in `do_wrap`/`do_unwrap` correctly
    /// (see DESIGN.md).
    pub bytes_consumed: usize,
}

/// A CPU-heavy operation the engine asks the host to run off the event-loop
/// thread. Real `rustls` handshakes never produce one (see `RustlsEngine`),
/// but the trait models it generically so the dispatch path in `Connection`
/// is exercised against a mock engine that does report `NeedTask`.
pub trait DelegatedTask: Send {
    fn run(self: Box<Self>);
}

/// Certificate state reported by the engine's negotiated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCertificates {
    /// The engine cannot vouch for the peer's identity at all (anonymous
    /// cipher, or client auth not performed).
    Unverified,
    /// The peer presented this chain (may be empty).
    Presented(Vec<CertificateDer<'static>>),
}

/// Read-only session info surfaced once the handshake has progressed.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer_certificates: PeerCertificates,
    pub cipher_suite: Option<String>,
    pub protocol: Option<String>,
}

/// The TLS record-processing capability `Connection` drives.
pub trait Engine: Send {
    fn wrap(
        &mut self,
        plaintext_in: &[u8],
        ciphertext_out: &mut ScratchBuffer,
    ) -> Result<WrapResult, AdapterError>;

    fn unwrap(
        &mut self,
        ciphertext_in: &[u8],
        plaintext_out: &mut ScratchBuffer,
    ) -> Result<WrapResult, AdapterError>;

    fn handshake_status(&mut self) -> HandshakeStatus;

    /// Pop the next delegated task, if any. Drained in a `while let Some`
    /// loop by the blocking-pool job per the design notes.
    fn next_delegated_task(&mut self) -> Option<Box<dyn DelegatedTask>>;

    fn close_inbound(&mut self) -> Result<(), AdapterError>;

    fn close_outbound(&mut self);

    fn session_info(&self) -> SessionInfo;
}
