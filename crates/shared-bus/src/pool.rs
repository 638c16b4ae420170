//! # Payload Buffer Pool
//!
//! Bounded free-list of `Vec<u8>` buffers reused for message payloads.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// `acquire` served from the pool.
    pub hits: u64,
    /// `acquire` that had to allocate.
    pub misses: u64,
    /// Buffers taken back by `release`.
    pub returned: u64,
    /// Buffers dropped by `release` (pool full or buffer too large).
    pub discarded: u64,
    /// Buffers currently pooled.
    pub pooled: usize,
}

/// A bounded pool of reusable payload buffers.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    max_buffer_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    returned: AtomicU64,
    discarded: AtomicU64,
}

impl BufferPool {
    /// Default number of pooled buffers.
    pub const DEFAULT_MAX_POOLED: usize = 64;

    /// Default largest buffer capacity worth keeping.
    pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024;

    #[must_use]
    pub fn new(max_pooled: usize, max_buffer_size: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            max_buffer_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returned: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Take an empty buffer with at least `min_capacity` bytes of capacity.
    pub fn acquire(&self, min_capacity: usize) -> Vec<u8> {
        let reused = self.free.lock().pop();
        match reused {
            Some(mut buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf.clear();
                buf.reserve(min_capacity);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(min_capacity)
            }
        }
    }

    /// Hand a buffer back for reuse.
    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_buffer_size {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut free = self.free.lock();
        if free.len() >= self.max_pooled {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        buf.clear();
        free.push(buf);
        self.returned.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            pooled: self.free.lock().len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_POOLED, Self::DEFAULT_MAX_BUFFER_SIZE)
    }
}
