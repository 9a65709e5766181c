//! `rustls`-backed implementation of the `Engine` capability.
//!
//! `rustls::Connection` exposes a buffered push/pull API (`read_tls` /
//! `write_tls` / `process_new_packets`, `reader()` / `writer()`) rather than
//! the single-shot `wrap(in, out)` / `unwrap(in, out)` call the spec's
//! `Engine` trait models. The two `submitted` flags below bridge that gap:
//! a logical `wrap`/`unwrap` call may be retried several times on
//! `BufferOverflow` with a larger output buffer, but the plaintext/ciphertext
//! input must only be handed to the underlying connection once per logical
//! call. See DESIGN.md for the reasoning.

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use rustls::{ClientConfig, ClientConnection, Connection as RlConnection, ServerConfig, ServerConnection};
use rustls_pki_types::ServerName;

use crate::buffer::ScratchBuffer;
use crate::engine::{DelegatedTask, Engine, HandshakeStatus, PeerCertificates, Role, SessionInfo, Status, WrapResult};
use crate::error::AdapterError;

pub struct RustlsEngine {
    conn: RlConnection,
    role: Role,
    plaintext_submitted: bool,
    ciphertext_submitted: bool,
    inbound_closed: bool,
}

impl RustlsEngine {
    pub fn client(config: Arc<ClientConfig>, server_name: Option<&str>) -> Result<Self, AdapterError> {
        let name: ServerName<'static> = match server_name {
            Some(s) => s
                .to_string()
                .try_into()
                .map_err(|_| AdapterError::EngineInit(format!("invalid server name: {s}")))?,
            None => {
                return Err(AdapterError::EngineInit(
                    "client connections require a server_name for SNI".into(),
                ))
            }
        };
        let conn = ClientConnection::new(config, name)
            .map_err(|e| AdapterError::EngineInit(e.to_string()))?;
        Ok(Self {
            conn: RlConnection::Client(conn),
            role: Role::Client,
            plaintext_submitted: false,
            ciphertext_submitted: false,
            inbound_closed: false,
        })
    }

    pub fn server(config: Arc<ServerConfig>) -> Result<Self, AdapterError> {
        let conn = ServerConnection::new(config).map_err(|e| AdapterError::EngineInit(e.to_string()))?;
        Ok(Self {
            conn: RlConnection::Server(conn),
            role: Role::Server,
            plaintext_submitted: false,
            ciphertext_submitted: false,
            inbound_closed: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Engine's preferred initial scratch-buffer size. `rustls` records are
    /// capped at 16KiB plus a small framing overhead.
    pub const DEFAULT_PACKET_SIZE: usize = 16 * 1024 + 512;

    fn classify(&self, was_handshaking: bool) -> HandshakeStatus {
        let now_handshaking = self.conn.is_handshaking();
        if was_handshaking && !now_handshaking {
            return HandshakeStatus::Finished;
        }
        self.poll_status(now_handshaking)
    }

    fn poll_status(&self, handshaking: bool) -> HandshakeStatus {
        if !handshaking {
            return HandshakeStatus::NotHandshaking;
        }
        if self.conn.wants_write() {
            HandshakeStatus::NeedWrap
        } else {
            HandshakeStatus::NeedUnwrap
        }
    }
}

impl Engine for RustlsEngine {
    fn wrap(
        &mut self,
        plaintext_in: &[u8],
        ciphertext_out: &mut ScratchBuffer,
    ) -> Result<WrapResult, AdapterError> {
        let was_handshaking = self.conn.is_handshaking();

        if !self.plaintext_submitted {
            if !plaintext_in.is_empty() {
                self.conn
                    .writer()
                    .write_all(plaintext_in)
                    .map_err(|e| AdapterError::Tls(e.to_string()))?;
            }
            self.plaintext_submitted = true;
        }

        let mut total = 0usize;
        loop {
            let slice = ciphertext_out.as_mut_slice();
            let mut cursor = Cursor::new(&mut slice[total..]);
            match self.conn.write_tls(&mut cursor) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    if total >= ciphertext_out.capacity() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WriteZero => break,
                Err(e) => return Err(AdapterError::Tls(e.to_string())),
            }
        }
        ciphertext_out.set_filled(total);

        let status = if self.conn.wants_write() {
            Status::BufferOverflow
        } else {
            self.plaintext_submitted = false;
            Status::Ok
        };

        Ok(WrapResult {
            status,
            handshake_status: self.classify(was_handshaking),
            bytes_produced: total,
            bytes_consumed: plaintext_in.len(),
        })
    }

    fn unwrap(
        &mut self,
        ciphertext_in: &[u8],
        plaintext_out: &mut ScratchBuffer,
    ) -> Result<WrapResult, AdapterError> {
        if self.inbound_closed {
            return Ok(WrapResult {
                status: Status::Closed,
                handshake_status: self.poll_status(self.conn.is_handshaking()),
                bytes_produced: 0,
                bytes_consumed: 0,
            });
        }

        let was_handshaking = self.conn.is_handshaking();

        if !self.ciphertext_submitted {
            if !ciphertext_in.is_empty() {
                let mut cursor = Cursor::new(ciphertext_in);
                self.conn
                    .read_tls(&mut cursor)
                    .map_err(|e| AdapterError::Io(e.to_string()))?;
            }
            self.ciphertext_submitted = true;

            if let Err(e) = self.conn.process_new_packets() {
                return Err(AdapterError::Tls(e.to_string()));
            }
        }

        // rustls buffers raw bytes internally regardless of whether they
        // formed a complete record, so the full input is always consumed
        // from the caller's perspective (see module docs and DESIGN.md).
        let bytes_consumed = ciphertext_in.len();

        let mut total = 0usize;
        let mut closed = false;
        loop {
            let slice = plaintext_out.as_mut_slice();
            if total >= slice.len() {
                break;
            }
            match self.conn.reader().read(&mut slice[total..]) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => total += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(AdapterError::Tls(e.to_string())),
            }
        }
        plaintext_out.set_filled(total);

        // A completely filled buffer might mean more plaintext is pending;
        // conservatively report overflow and let the caller retry with a
        // bigger buffer rather than risk losing bytes by peeking ahead.
        let buffer_full = total >= plaintext_out.capacity();

        let status = if closed {
            self.ciphertext_submitted = false;
            Status::Closed
        } else if buffer_full {
            Status::BufferOverflow
        } else if total == 0 && self.conn.wants_read() {
            self.ciphertext_submitted = false;
            Status::BufferUnderflow
        } else {
            self.ciphertext_submitted = false;
            Status::Ok
        };

        Ok(WrapResult {
            status,
            handshake_status: self.classify(was_handshaking),
            bytes_produced: total,
            bytes_consumed,
        })
    }

    fn handshake_status(&mut self) -> HandshakeStatus {
        self.poll_status(self.conn.is_handshaking())
    }

    fn next_delegated_task(&mut self) -> Option<Box<dyn DelegatedTask>> {
        // rustls performs its crypto synchronously; there is no host-side
        // delegated-task concept to offload.
        None
    }

    fn close_inbound(&mut self) -> Result<(), AdapterError> {
        // rustls has no direct "close_inbound" analogue; a genuine peer
        // close_notify is detected structurally (reader() returning Ok(0)).
        // This flag makes a host-forced inbound close terminal too, so a
        // later unwrap() call can't decrypt ciphertext queued behind it.
        self.inbound_closed = true;
        Ok(())
    }

    fn close_outbound(&mut self) {
        self.conn.send_close_notify();
    }

    fn session_info(&self) -> SessionInfo {
        let peer_certificates = match self.conn.peer_certificates() {
            Some(certs) => PeerCertificates::Presented(certs.to_vec()),
            None => PeerCertificates::Unverified,
        };
        let cipher_suite = self
            .conn
            .negotiated_cipher_suite()
            .map(|cs| format!("{:?}", cs.suite()));
        let protocol = self.conn.protocol_version().map(|v| format!("{v:?}"));
        SessionInfo {
            peer_certificates,
            cipher_suite,
            protocol,
        }
    }
}
