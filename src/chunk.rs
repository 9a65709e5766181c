//! Units of queued work on the outgoing (plaintext) and incoming (ciphertext)
//! FIFOs.

use crate::error::ErrCode;

/// Single-shot completion callback. Boxed `FnOnce` rather than `FnMut` since
/// each chunk's callback fires at most once and is always consumed by value.
pub type Callback = Box<dyn FnOnce(Option<String>) + Send>;

#[derive(Debug)]
enum Kind {
    /// Plaintext (outgoing queue) or ciphertext (incoming queue) payload.
    /// An empty vec represents a handshake-only wrap/unwrap with no data.
    Data(Vec<u8>),
    /// Marks the point at which the outbound side should be closed.
    Shutdown,
    /// A lower-layer read error to surface on `on_read`, in order relative
    /// to ciphertext chunks enqueued earlier.
    InboundError(ErrCode),
}

/// One queued unit of work.
///
/// Exactly one of three shapes per the data model: a data chunk (shutdown
/// flag false, no error code), a shutdown marker (no buffer), or an inbound
/// error marker (no buffer, no callback, non-zero error code).
pub struct Chunk {
    kind: Kind,
    callback: Option<Callback>,
    consumed: usize,
}

impl Chunk {
    pub fn data(buf: Vec<u8>, callback: Option<Callback>) -> Self {
        Self {
            kind: Kind::Data(buf),
            callback,
            consumed: 0,
        }
    }

    pub fn shutdown(callback: Option<Callback>) -> Self {
        Self {
            kind: Kind::Shutdown,
            callback,
            consumed: 0,
        }
    }

    pub fn inbound_error(code: ErrCode) -> Self {
        Self {
            kind: Kind::InboundError(code),
            callback: None,
            consumed: 0,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind, Kind::Shutdown)
    }

    /// True for a plaintext/ciphertext payload chunk, as opposed to a
    /// shutdown or inbound-error marker.
    pub fn is_data(&self) -> bool {
        matches!(self.kind, Kind::Data(_))
    }

    pub fn inbound_err(&self) -> Option<ErrCode> {
        match self.kind {
            Kind::InboundError(code) => Some(code),
            _ => None,
        }
    }

    /// Bytes not yet handed to the engine.
    pub fn remaining(&self) -> &[u8] {
        match &self.kind {
            Kind::Data(buf) => &buf[self.consumed.min(buf.len())..],
            _ => &[],
        }
    }

    /// Total bytes this chunk started with (used for write-queue accounting).
    pub fn len(&self) -> usize {
        match &self.kind {
            Kind::Data(buf) => buf.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_len(&self) -> usize {
        self.remaining().len()
    }

    pub fn advance(&mut self, n: usize) {
        self.consumed = (self.consumed + n).min(self.len());
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.remaining_len() == 0
    }

    /// Yield the callback, if any, nulling the slot so no later path can
    /// fire it a second time.
    pub fn take_callback(&mut self) -> Option<Callback> {
        self.callback.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_chunk_tracks_consumption() {
        let mut c = Chunk::data(b"hello".to_vec(), None);
        assert_eq!(c.remaining(), b"hello");
        assert!(!c.is_fully_consumed());
        c.advance(3);
        assert_eq!(c.remaining(), b"lo");
        c.advance(10);
        assert!(c.is_fully_consumed());
    }

    #[test]
    fn callback_taken_at_most_once() {
        let mut c = Chunk::data(Vec::new(), Some(Box::new(|_| {})));
        assert!(c.take_callback().is_some());
        assert!(c.take_callback().is_none());
    }

    #[test]
    fn shutdown_and_error_markers_have_no_payload() {
        let s = Chunk::shutdown(None);
        assert!(s.is_shutdown());
        assert_eq!(s.remaining(), &[] as &[u8]);

        let e = Chunk::inbound_error(7);
        assert_eq!(e.inbound_err(), Some(7));
        assert!(!e.is_shutdown());
    }
}
