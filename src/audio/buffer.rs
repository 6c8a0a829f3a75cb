//! Fixed-capacity FIFO ring buffer for samples moving between a cpal
//! callback and the blocking device adapter.
//!
//! When a push would exceed `capacity`, the **oldest** samples are
//! overwritten so the newest audio is always kept.  For live monitoring this
//! bounds latency: a stalled reader loses stale audio rather than falling
//! further and further behind.
//!
//! # Example
//!
//! ```rust
//! use voice_shifter::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! let overwritten = buf.push_slice(&[1, 2, 3, 4, 5]); // oldest sample dropped
//! assert_eq!(overwritten, 1);
//!
//! let mut out = [0i16; 3];
//! assert_eq!(buf.pop_into(&mut out), 3);
//! assert_eq!(out, [2, 3, 4]);
//! assert_eq!(buf.len(), 1);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular FIFO.
///
/// Generic over `T: Copy + Default`; the device adapter uses
/// `RingBuffer<i16>`.  Never allocates after construction.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the oldest stored element.
    read_pos: usize,
    /// Number of valid elements currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            read_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest elements on overflow.
    ///
    /// Returns how many previously stored elements were overwritten.
    pub fn push_slice(&mut self, data: &[T]) -> usize {
        let mut overwritten = 0;
        for &item in data {
            let write_pos = (self.read_pos + self.len) % self.capacity;
            self.buf[write_pos] = item;
            if self.len < self.capacity {
                self.len += 1;
            } else {
                self.read_pos = (self.read_pos + 1) % self.capacity;
                overwritten += 1;
            }
        }
        overwritten
    }

    /// Move up to `out.len()` of the oldest elements into `out`.
    ///
    /// Returns the number of elements written.
    pub fn pop_into(&mut self, out: &mut [T]) -> usize {
        let n = out.len().min(self.len);
        for slot in out.iter_mut().take(n) {
            *slot = self.buf[self.read_pos];
            self.read_pos = (self.read_pos + 1) % self.capacity;
        }
        self.len -= n;
        n
    }

    /// Discard all elements.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elements that can be pushed without overwriting anything.
    pub fn free(&self) -> usize {
        self.capacity - self.len
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
