//! The five named callback slots `Connection` exposes, modeled as one
//! boxed closure field apiece (per the design notes: "define each as its
//! own function-valued field" rather than a single multi-arity observer).

use crate::chunk::Callback;
use crate::error::{AdapterError, ErrCode};

/// Ciphertext ready for the transport. `shutdown` marks the final record of
/// a graceful close; `completion_cb`, if present, fires once the caller has
/// finished transmitting the bytes.
pub type OnWrite = Box<dyn FnMut(Option<Vec<u8>>, bool, Option<Callback>) + Send>;

/// Decrypted plaintext, or `(None, err)` for an inbound EOF/error signal.
pub type OnRead = Box<dyn FnMut(Option<Vec<u8>>, ErrCode) + Send>;

pub type OnHandshakeStart = Box<dyn FnMut() + Send>;
pub type OnHandshakeDone = Box<dyn FnMut() + Send>;
pub type OnError = Box<dyn FnMut(AdapterError) + Send>;

/// The five callback slots, grouped for convenience at construction time.
#[derive(Default)]
pub struct Callbacks {
    pub on_write: Option<OnWrite>,
    pub on_read: Option<OnRead>,
    pub on_handshake_start: Option<OnHandshakeStart>,
    pub on_handshake_done: Option<OnHandshakeDone>,
    pub on_error: Option<OnError>,
}
