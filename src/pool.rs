//! Render buffer pool.
//!
//! Every logged request renders into a byte buffer. Allocating one per
//! request is wasteful when the lines are all roughly the same size, so
//! buffers are recycled through a small mutex-guarded free list.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

const INITIAL_CAPACITY: usize = 256;
const MAX_IDLE: usize = 64;
// Buffers that grew past this (huge bodies) are dropped rather than pinned.
const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// A process-wide pool of reusable render buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks out an empty buffer. It returns to the pool when the guard is
    /// dropped, on every exit path.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let mut buf = self.free.lock().pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY));
        buf.clear();
        PooledBuffer { buf, pool: self }
    }

    /// Number of buffers currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < MAX_IDLE {
            free.push(buf);
        }
    }
}

/// Exclusive lease on a pooled buffer.
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> { &self.buf }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> { &mut self.buf }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
