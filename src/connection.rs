//! `Connection`: the adapter's central state object (the encode/decode loop).
//!
//! Owns the two chunk FIFOs, the read/write scratch buffers, the handshake
//! and shutdown flags, the error slots, and the five callback slots. Every
//! public entry point enqueues work and then runs [`Connection::run_encode_loop`]
//! synchronously until it either exhausts both queues, blocks awaiting more
//! ciphertext, or dispatches a delegated task to the runtime's blocking pool.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;

use crate::buffer::{concat_front, ScratchBuffer};
use crate::callbacks::{Callbacks, OnError, OnHandshakeDone, OnHandshakeStart, OnRead, OnWrite};
use crate::chunk::{Callback, Chunk};
use crate::engine::{Engine, HandshakeStatus, PeerCertificates, Role, Status};
use crate::error::{AdapterError, ErrCode, VerifyError, EOF};
use crate::runtime::{DomainTag, Runtime};
use crate::verify::verify_peer;

/// Initial scratch-buffer size, matching `RustlsEngine::DEFAULT_PACKET_SIZE`.
const DEFAULT_PACKET_SIZE: usize = 16 * 1024 + 512;

pub struct Connection<E: Engine + 'static, R: Runtime + 'static> {
    self_ref: Weak<Mutex<Connection<E, R>>>,
    runtime: Arc<R>,

    role: Role,
    server_name: Option<String>,
    server_port: Option<u16>,
    request_cert: bool,
    reject_unauthorized: bool,

    engine: Option<E>,
    trust_store: Option<Arc<RootCertStore>>,

    outgoing: VecDeque<Chunk>,
    incoming: VecDeque<Chunk>,
    write_buf: ScratchBuffer,
    read_buf: ScratchBuffer,

    handshaking: bool,
    init_finished: bool,
    sent_shutdown: bool,
    received_shutdown: bool,

    error: Option<AdapterError>,
    verify_error: Option<VerifyError>,

    callbacks: Callbacks,
}

impl<E: Engine + 'static, R: Runtime + 'static> Connection<E, R> {
    pub fn new(
        runtime: Arc<R>,
        role: Role,
        server_name: Option<String>,
        server_port: Option<u16>,
    ) -> Arc<Mutex<Self>> {
        Arc::new_cyclic(|weak| {
            Mutex::new(Self {
                self_ref: weak.clone(),
                runtime,
                role,
                server_name,
                server_port,
                request_cert: false,
                reject_unauthorized: false,
                engine: None,
                trust_store: None,
                outgoing: VecDeque::new(),
                incoming: VecDeque::new(),
                write_buf: ScratchBuffer::with_capacity(DEFAULT_PACKET_SIZE),
                read_buf: ScratchBuffer::with_capacity(DEFAULT_PACKET_SIZE),
                handshaking: false,
                init_finished: false,
                sent_shutdown: false,
                received_shutdown: false,
                error: None,
                verify_error: None,
                callbacks: Callbacks::default(),
            })
        })
    }

    /// Finalizes the engine. `make_engine` is expected to already bake in
    /// SNI, cipher restriction, and ALPN (see DESIGN.md on why cipher
    /// restriction can't be a separate post-construction step against
    /// `rustls`'s immutable configs). A construction failure, including a
    /// rejected cipher suite, is captured into the error slot rather than
    /// propagated: `init` never fails outright, per the spec.
    pub fn init(
        &mut self,
        make_engine: impl FnOnce() -> Result<E, AdapterError>,
        trust_store: Option<Arc<RootCertStore>>,
    ) {
        self.trust_store = trust_store;
        match make_engine() {
            Ok(engine) => {
                self.write_buf = ScratchBuffer::with_capacity(DEFAULT_PACKET_SIZE);
                self.read_buf = ScratchBuffer::with_capacity(DEFAULT_PACKET_SIZE);
                self.engine = Some(engine);
            }
            Err(e) => {
                log::warn!("engine init failed, deferred to next operation: {e}");
                self.error = Some(e);
            }
        }
    }

    /// Server-side policy knob. `request_cert && reject_unauthorized` requires
    /// client auth; `request_cert` alone merely requests it.
    pub fn set_verification_mode(&mut self, request_cert: bool, reject_unauthorized: bool) {
        self.request_cert = request_cert;
        self.reject_unauthorized = reject_unauthorized;
    }

    pub fn on_write(&mut self, f: impl FnMut(Option<Vec<u8>>, bool, Option<Callback>) + Send + 'static) {
        self.callbacks.on_write = Some(Box::new(f) as OnWrite);
    }

    pub fn on_read(&mut self, f: impl FnMut(Option<Vec<u8>>, ErrCode) + Send + 'static) {
        self.callbacks.on_read = Some(Box::new(f) as OnRead);
    }

    pub fn on_handshake_start(&mut self, f: impl FnMut() + Send + 'static) {
        self.callbacks.on_handshake_start = Some(Box::new(f) as OnHandshakeStart);
    }

    pub fn on_handshake_done(&mut self, f: impl FnMut() + Send + 'static) {
        self.callbacks.on_handshake_done = Some(Box::new(f) as OnHandshakeDone);
    }

    pub fn on_error(&mut self, f: impl FnMut(AdapterError) + Send + 'static) {
        self.callbacks.on_error = Some(Box::new(f) as OnError);
    }

    /// Enqueue a plaintext chunk (`buf` absent/empty represents a pure
    /// handshake kick) and drive the encode loop.
    pub fn wrap(&mut self, buf: Option<Vec<u8>>, cb: Option<Callback>) {
        self.outgoing.push_back(Chunk::data(buf.unwrap_or_default(), cb));
        self.run_encode_loop();
    }

    pub fn shutdown(&mut self, cb: Option<Callback>) {
        self.outgoing.push_back(Chunk::shutdown(cb));
        self.run_encode_loop();
    }

    /// Closes the engine's inbound side directly (swallowing any raised
    /// error), invokes `cb` immediately, then runs one unwrap to surface EOF
    /// to `on_read` before any further wrap is attempted.
    pub fn shutdown_inbound(&mut self, cb: Option<Callback>) {
        if let Some(engine) = self.engine.as_mut() {
            let _ = engine.close_inbound();
        }
        if let Some(cb) = cb {
            cb(None);
        }
        self.do_unwrap();
        self.run_encode_loop();
    }

    pub fn unwrap(&mut self, buf: Vec<u8>, cb: Option<Callback>) {
        self.incoming.push_back(Chunk::data(buf, cb));
        self.run_encode_loop();
    }

    /// Enqueue a lower-layer error so it surfaces on `on_read` in order
    /// relative to ciphertext enqueued earlier.
    pub fn inbound_error(&mut self, code: ErrCode) {
        self.incoming.push_back(Chunk::inbound_error(code));
        self.run_encode_loop();
    }

    /// Clients only: kicks off the ClientHello.
    pub fn start(&mut self) {
        if self.role == Role::Client {
            self.wrap(None, None);
        }
    }

    pub fn error(&self) -> Option<&AdapterError> {
        self.error.as_ref()
    }

    pub fn verify_error(&self) -> Option<&VerifyError> {
        self.verify_error.as_ref()
    }

    pub fn init_finished(&self) -> bool {
        self.init_finished
    }

    pub fn sent_shutdown(&self) -> bool {
        self.sent_shutdown
    }

    pub fn received_shutdown(&self) -> bool {
        self.received_shutdown
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn server_port(&self) -> Option<u16> {
        self.server_port
    }

    /// Sum of remaining (unconsumed) bytes across all queued outgoing chunks.
    pub fn write_queue_len(&self) -> usize {
        self.outgoing.iter().map(Chunk::remaining_len).sum()
    }

    pub fn peer_certificate(&self) -> Option<CertificateDer<'static>> {
        match self.engine.as_ref()?.session_info().peer_certificates {
            PeerCertificates::Presented(chain) => chain.into_iter().next(),
            PeerCertificates::Unverified => None,
        }
    }

    pub fn cipher_suite(&self) -> Option<String> {
        self.engine.as_ref()?.session_info().cipher_suite
    }

    pub fn protocol(&self) -> Option<String> {
        self.engine.as_ref()?.session_info().protocol
    }

    /// Table-driven dispatch on the engine's current handshake status (§4.2).
    /// Iterates until it cannot make further progress: both queues drained
    /// with the handshake idle, a wrap/unwrap blocks, or a delegated task is
    /// dispatched (in which case the loop resumes later via the runtime's
    /// repost).
    fn run_encode_loop(&mut self) {
        if self.engine.is_none() {
            if let Some(e) = self.error.clone() {
                self.fire_on_error(e);
            }
            return;
        }

        loop {
            let status = self.engine.as_mut().unwrap().handshake_status();
            match status {
                HandshakeStatus::NeedWrap => {
                    self.process_handshaking();
                    if !self.do_wrap() {
                        break;
                    }
                }
                HandshakeStatus::NeedUnwrap => {
                    self.process_handshaking();
                    if !self.do_unwrap() {
                        break;
                    }
                }
                HandshakeStatus::NeedTask => {
                    self.dispatch_delegated_tasks();
                    return;
                }
                HandshakeStatus::Finished | HandshakeStatus::NotHandshaking => {
                    if self.outgoing.is_empty() && self.incoming.is_empty() {
                        break;
                    }
                    let progressed = if !self.outgoing.is_empty() {
                        self.do_wrap()
                    } else {
                        self.do_unwrap()
                    };
                    if !progressed {
                        break;
                    }
                }
            }
        }
    }

    /// §4.3. Returns `true` iff the wrap reported `Status::Ok`.
    fn do_wrap(&mut self) -> bool {
        let was_shutdown = self.outgoing.front().map_or(false, Chunk::is_shutdown);
        if was_shutdown {
            if let Some(engine) = self.engine.as_mut() {
                engine.close_outbound();
            }
            self.sent_shutdown = true;
        }

        let payload: Vec<u8> = self
            .outgoing
            .front()
            .map(|c| c.remaining().to_vec())
            .unwrap_or_default();

        let result = loop {
            let Some(engine) = self.engine.as_mut() else {
                return false;
            };
            match engine.wrap(&payload, &mut self.write_buf) {
                Ok(r) if r.status == Status::BufferOverflow => {
                    self.write_buf.grow();
                    continue;
                }
                Ok(r) => break r,
                Err(e) => {
                    let cb = self.outgoing.front_mut().and_then(Chunk::take_callback);
                    if !self.outgoing.is_empty() {
                        self.outgoing.pop_front();
                    }
                    self.handle_encoding_error(cb, e);
                    return false;
                }
            }
        };

        if let Some(front) = self.outgoing.front_mut() {
            front.advance(result.bytes_consumed);
        }

        let mut deferred_cb = None;
        if self.init_finished && self.outgoing.front().map_or(false, Chunk::is_fully_consumed) {
            if let Some(mut popped) = self.outgoing.pop_front() {
                deferred_cb = popped.take_callback();
            }
        }

        if result.handshake_status == HandshakeStatus::Finished {
            self.process_not_handshaking();
        }

        if result.bytes_produced > 0 {
            let bytes = self.write_buf.take_filled();
            self.fire_on_write(Some(bytes), was_shutdown, deferred_cb);
        } else {
            self.write_buf.clear();
            if let Some(cb) = deferred_cb {
                cb(None);
            }
        }

        result.status == Status::Ok
    }

    /// §4.4. Returns `true` iff the unwrap reported `Status::Ok`.
    fn do_unwrap(&mut self) -> bool {
        let had_chunk_initial = !self.incoming.is_empty();

        let result = loop {
            let payload: Vec<u8> = self
                .incoming
                .front()
                .map(|c| c.remaining().to_vec())
                .unwrap_or_default();

            let Some(engine) = self.engine.as_mut() else {
                return false;
            };
            let r = match engine.unwrap(&payload, &mut self.read_buf) {
                Ok(r) => r,
                Err(e) => {
                    let cb = self.incoming.front_mut().and_then(Chunk::take_callback);
                    if !self.incoming.is_empty() {
                        self.incoming.pop_front();
                    }
                    self.handle_encoding_error(cb, e);
                    return false;
                }
            };

            match r.status {
                Status::BufferOverflow => {
                    self.read_buf.grow();
                    continue;
                }
                Status::BufferUnderflow
                    if had_chunk_initial && self.incoming.front().map_or(false, Chunk::is_data) =>
                {
                    if let Some(front) = self.incoming.front_mut() {
                        if let Some(cb) = front.take_callback() {
                            cb(None);
                        }
                    }
                    let unconsumed =
                        payload.get(r.bytes_consumed.min(payload.len())..).unwrap_or(&[]).to_vec();
                    self.incoming.pop_front();
                    if let Some(next) = self.incoming.front_mut() {
                        let merged = concat_front(&unconsumed, next.remaining());
                        let next_cb = next.take_callback();
                        *next = Chunk::data(merged, next_cb);
                        continue;
                    }
                    if !unconsumed.is_empty() {
                        self.incoming.push_front(Chunk::data(unconsumed, None));
                    }
                    return false;
                }
                _ => break r,
            }
        };

        if self.incoming.front().map_or(false, Chunk::is_data) {
            if let Some(front) = self.incoming.front_mut() {
                front.advance(result.bytes_consumed);
            }
        }

        let mut err_code: ErrCode = 0;
        if let Some(code) = self.incoming.front().and_then(Chunk::inbound_err) {
            err_code = code;
            if let Some(engine) = self.engine.as_mut() {
                let _ = engine.close_inbound();
            }
        }

        if result.status == Status::Closed && !self.received_shutdown {
            self.received_shutdown = true;
            err_code = EOF;
        }

        if self.incoming.front().map_or(true, Chunk::is_fully_consumed) {
            if let Some(mut popped) = self.incoming.pop_front() {
                if let Some(cb) = popped.take_callback() {
                    cb(None);
                }
            }
        }

        if result.handshake_status == HandshakeStatus::Finished {
            self.process_not_handshaking();
        }

        let plaintext = if result.bytes_produced > 0 {
            Some(self.read_buf.take_filled())
        } else {
            self.read_buf.clear();
            None
        };
        if plaintext.is_some() || err_code != 0 {
            self.fire_on_read(plaintext, err_code);
        }

        result.status == Status::Ok
    }

    fn process_handshaking(&mut self) {
        if !self.handshaking && !self.sent_shutdown && !self.received_shutdown {
            self.handshaking = true;
            self.fire_on_handshake_start();
        }
    }

    fn process_not_handshaking(&mut self) {
        if self.handshaking {
            self.check_peer_authorization();
            self.handshaking = false;
            self.init_finished = true;
            self.fire_on_handshake_done();
        }
    }

    fn check_peer_authorization(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let session = engine.session_info();
        if let Err(e) = verify_peer(
            self.role,
            &session,
            self.trust_store.as_ref(),
            self.server_name.as_deref(),
            self.request_cert,
        ) {
            log::debug!("peer verification failed: {e}");
            self.verify_error = Some(e.clone());
            if self.role == Role::Server && self.reject_unauthorized {
                self.fire_on_error(AdapterError::Tls(e.to_string()));
            }
        }
    }

    /// A TLS error pre-handshake fires `on_error` directly (the spec's
    /// dynamically-typed `verify_error` reuse for this case doesn't carry
    /// over cleanly to a statically typed `VerifyError` slot here -- see
    /// DESIGN.md). Post-handshake it is delivered to the chunk's completion
    /// callback if one is available, else it also falls back to `on_error`.
    fn handle_encoding_error(&mut self, cb: Option<Callback>, err: AdapterError) {
        self.error = Some(err.clone());
        if !self.init_finished {
            self.fire_on_error(err);
            return;
        }
        match cb {
            Some(cb) => cb(Some(err.to_string())),
            None => self.fire_on_error(err),
        }
    }

    /// §4.6. Drains every delegated task currently available (on the
    /// event-loop side, per the design note) and hands the extracted tasks
    /// -- not the engine itself -- to a blocking-pool job. Only the already
    /// extracted tasks cross the thread boundary.
    fn dispatch_delegated_tasks(&mut self) {
        let mut tasks = Vec::new();
        if let Some(engine) = self.engine.as_mut() {
            while let Some(task) = engine.next_delegated_task() {
                tasks.push(task);
            }
        }
        log::debug!("dispatching {} delegated task(s) to blocking pool", tasks.len());

        let self_ref = self.self_ref.clone();
        let runtime = self.runtime.clone();
        let domain_tag = self.runtime.current_domain_tag();

        self.runtime.submit_blocking(Box::new(move || {
            for task in tasks {
                task.run();
            }
            let resume_ref = self_ref.clone();
            runtime.post_to_event_loop(
                Box::new(move || {
                    if let Some(conn) = resume_ref.upgrade() {
                        conn.lock().unwrap().run_encode_loop();
                    }
                }),
                domain_tag,
            );
        }));
    }

    fn fire_on_write(&mut self, bytes: Option<Vec<u8>>, shutdown: bool, cb: Option<Callback>) {
        if let Some(f) = self.callbacks.on_write.as_mut() {
            f(bytes, shutdown, cb);
        }
    }

    fn fire_on_read(&mut self, bytes: Option<Vec<u8>>, err: ErrCode) {
        if let Some(f) = self.callbacks.on_read.as_mut() {
            f(bytes, err);
        }
    }

    fn fire_on_handshake_start(&mut self) {
        if let Some(f) = self.callbacks.on_handshake_start.as_mut() {
            f();
        }
    }

    fn fire_on_handshake_done(&mut self) {
        if let Some(f) = self.callbacks.on_handshake_done.as_mut() {
            f();
        }
    }

    fn fire_on_error(&mut self, e: AdapterError) {
        if let Some(f) = self.callbacks.on_error.as_mut() {
            f(e);
        }
    }

    #[cfg(test)]
    fn has_engine(&self) -> bool {
        self.engine.is_some()
    }
}
