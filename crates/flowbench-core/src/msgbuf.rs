//! Bounded contiguous byte buffers for per-connection I/O.
//!
//! One buffer per direction on every fake switch. Producers append whole
//! frames only (a frame that does not fit is refused, never split) and
//! the consumer reads from the front. [`MsgBuf::fill_from`] and
//! [`MsgBuf::drain_to`] move bytes to and from a non-blocking socket,
//! treating `WouldBlock` as a clean stop and retrying `Interrupted`.

use std::io::{self, Read, Write};

/// Capacity of every connection buffer.
pub const MSGBUF_CAPACITY: usize = 65536;

/// Result of one [`MsgBuf::fill_from`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// Bytes appended to the buffer.
    pub bytes: usize,
    /// The peer closed the connection (EOF observed).
    pub closed: bool,
}

/// Fixed-capacity byte queue with front compaction.
pub struct MsgBuf {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl MsgBuf {
    pub fn new() -> Self {
        Self::with_capacity(MSGBUF_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Free space for new frames.
    pub fn headroom(&self) -> usize {
        self.capacity() - self.len()
    }

    /// The queued bytes, front first.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Drop `n` bytes from the front.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.start += n;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Append a whole frame. Returns `false` (touching nothing) when the
    /// frame does not fit in the remaining headroom.
    pub fn push(&mut self, frame: &[u8]) -> bool {
        if frame.len() > self.headroom() {
            return false;
        }
        if self.buf.len() - self.end < frame.len() {
            self.compact();
        }
        self.buf[self.end..self.end + frame.len()].copy_from_slice(frame);
        self.end += frame.len();
        true
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
    }

    /// Read from `src` until it would block, the buffer is full, or the
    /// peer closes.
    pub fn fill_from<R: Read>(&mut self, src: &mut R) -> io::Result<FillOutcome> {
        let mut outcome = FillOutcome {
            bytes: 0,
            closed: false,
        };
        loop {
            if self.headroom() == 0 {
                break;
            }
            if self.buf.len() == self.end {
                self.compact();
            }
            match src.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    outcome.closed = true;
                    break;
                }
                Ok(n) => {
                    self.end += n;
                    outcome.bytes += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    /// Write queued bytes to `dst` until it would block or the buffer is
    /// empty. Returns the bytes written.
    pub fn drain_to<W: Write>(&mut self, dst: &mut W) -> io::Result<usize> {
        let mut total = 0;
        while !self.is_empty() {
            match dst.write(self.data()) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "socket accepted zero bytes",
                    ));
                }
                Ok(n) => {
                    self.consume(n);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}

impl Default for MsgBuf {
    fn default() -> Self {
        Self::new()
    }
}
