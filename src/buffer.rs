//! Growable scratch buffers used as the engine's wrap/unwrap output targets.
//!
//! Modeled as an explicit `(buf, filled_len)` pair rather than a cursor type,
//! per the design notes: on overflow the buffer is doubled and any bytes
//! already written by the engine are preserved (the engine is re-invoked from
//! scratch against the larger buffer, so `filled` is reset before the retry).

/// A fixed-capacity byte buffer that doubles on demand.
#[derive(Debug)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
    filled: usize,
}

impl ScratchBuffer {
    /// Allocate a scratch buffer sized to the engine's packet size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)],
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Full backing slice, for the engine to write into starting at 0.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Record how many bytes of `as_mut_slice()` the engine actually wrote.
    pub fn set_filled(&mut self, n: usize) {
        debug_assert!(n <= self.buf.len());
        self.filled = n;
    }

    /// Double the backing capacity in place. Existing bytes are preserved,
    /// though callers always re-run the engine call after growing since the
    /// engine itself decides how much of the new capacity it fills.
    pub fn grow(&mut self) {
        let new_cap = (self.buf.len() * 2).max(1);
        self.buf.resize(new_cap, 0);
    }

    /// Copy out the filled prefix into a freshly sized buffer and reset.
    pub fn take_filled(&mut self) -> Vec<u8> {
        let out = self.buf[..self.filled].to_vec();
        self.filled = 0;
        out
    }

    pub fn clear(&mut self) {
        self.filled = 0;
    }
}

/// Concatenate the unconsumed tail of one buffer onto the front of another,
/// used when a chunk under-reads and its remainder must be combined with the
/// next queued chunk before retrying `unwrap`.
pub fn concat_front(remainder: &[u8], next: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(remainder.len() + next.len());
    out.extend_from_slice(remainder);
    out.extend_from_slice(next);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_doubles_capacity() {
        let mut buf = ScratchBuffer::with_capacity(16);
        assert_eq!(buf.capacity(), 16);
        buf.grow();
        assert_eq!(buf.capacity(), 32);
        buf.grow();
        assert_eq!(buf.capacity(), 64);
    }

    #[test]
    fn take_filled_resets() {
        let mut buf = ScratchBuffer::with_capacity(8);
        buf.as_mut_slice()[..3].copy_from_slice(b"abc");
        buf.set_filled(3);
        assert_eq!(buf.take_filled(), b"abc");
        assert_eq!(buf.filled(), 0);
    }

    #[test]
    fn concat_front_orders_remainder_first() {
        let out = concat_front(b"tail", b"head");
        assert_eq!(out, b"tailhead");
    }
}
