//! Process-wide pooled buffers.
//!
//! Typed columns, frame scratch space, and lazy-string backings rent their
//! storage here instead of allocating per block. The pool is shared across
//! codec instances and internally synchronized; a rented buffer is a
//! ticket that returns its allocation on drop. Leaking a ticket wastes
//! memory but is never a correctness bug.
//!
//! Buffers are bucketed by power-of-two capacity class. Each class retains
//! a bounded number of idle buffers; beyond that, returned allocations are
//! simply freed.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::{Error, Result};

/// Idle buffers retained per capacity class.
const MAX_IDLE_PER_CLASS: usize = 32;
/// Capacity classes: 1 KiB << class, up to 64 MiB.
const CLASS_COUNT: usize = 17;
const MIN_CLASS_CAPACITY: usize = 1024;

struct PoolInner<T> {
    classes: Vec<Vec<Vec<T>>>,
    outstanding: usize,
    limit: usize,
}

impl<T> PoolInner<T> {
    fn new() -> Self {
        Self {
            classes: (0..CLASS_COUNT).map(|_| Vec::new()).collect(),
            outstanding: 0,
            limit: usize::MAX,
        }
    }
}

/// A shared pool of `Vec<T>` allocations.
pub struct Pool<T: Send + 'static> {
    inner: Mutex<PoolInner<T>>,
}

fn class_for(capacity: usize) -> usize {
    let mut class = 0;
    let mut cap = MIN_CLASS_CAPACITY;
    while cap < capacity && class + 1 < CLASS_COUNT {
        cap <<= 1;
        class += 1;
    }
    class
}

fn class_capacity(class: usize) -> usize {
    MIN_CLASS_CAPACITY << class
}

impl<T: Send + 'static> Pool<T> {
    fn new() -> Self {
        Self { inner: Mutex::new(PoolInner::new()) }
    }

    /// Rent a cleared buffer with at least `min_capacity` elements of
    /// capacity. Fails with [`Error::PoolExhausted`] only when a ticket
    /// limit has been configured and reached.
    pub fn rent(
        &'static self,
        min_capacity: usize,
    ) -> Result<Pooled<T>> {
        let class = class_for(min_capacity);
        let mut inner = self.inner.lock();
        if inner.outstanding >= inner.limit {
            return Err(Error::PoolExhausted);
        }
        inner.outstanding += 1;
        let buf = inner.classes[class]
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(class_capacity(class)));
        drop(inner);
        Ok(Pooled { buf, pool: self, released: false })
    }

    /// Cap the number of simultaneously outstanding tickets. Intended for
    /// tests; the default is effectively unlimited.
    pub fn set_ticket_limit(&'static self, limit: usize) {
        self.inner.lock().limit = limit;
    }

    fn give_back(&self, mut buf: Vec<T>) {
        buf.clear();
        let class = class_for(buf.capacity().max(1));
        let mut inner = self.inner.lock();
        inner.outstanding = inner.outstanding.saturating_sub(1);
        if inner.classes[class].len() < MAX_IDLE_PER_CLASS {
            inner.classes[class].push(buf);
        }
    }

    fn forget_ticket(&self) {
        let mut inner = self.inner.lock();
        inner.outstanding = inner.outstanding.saturating_sub(1);
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.inner.lock().outstanding
    }
}

/// A pool ticket: a `Vec<T>` that returns to its pool on drop.
///
/// Releasing happens exactly once; `release()` after drop is
/// unrepresentable (it consumes the ticket), and an internal flag makes a
/// second drop path a checked no-op rather than UB.
pub struct Pooled<T: Send + 'static> {
    buf: Vec<T>,
    pool: &'static Pool<T>,
    released: bool,
}

impl<T: Send + 'static> Pooled<T> {
    /// Explicitly return the buffer to the pool.
    pub fn release(mut self) {
        self.release_inner();
    }

    /// Detach the allocation from the pool, keeping the ticket accounting
    /// straight. Used when a buffer's lifetime must escape the codec.
    pub fn into_vec(mut self) -> Vec<T> {
        self.released = true;
        self.pool.forget_ticket();
        std::mem::take(&mut self.buf)
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

impl<T: Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<T: Send + 'static> std::ops::Deref for Pooled<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.buf
    }
}

impl<T: Send + 'static> std::ops::DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.buf
    }
}

impl<T: Send + std::fmt::Debug + 'static> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled").field("len", &self.buf.len()).finish()
    }
}

/// Process-wide pool of byte buffers (frame scratch, string backings,
/// null masks).
pub static BYTE_POOL: Lazy<Pool<u8>> = Lazy::new(Pool::new);

/// Process-wide pool of u64 buffers (array offsets, dictionary indices).
pub static OFFSET_POOL: Lazy<Pool<u64>> = Lazy::new(Pool::new);

/// Rent a byte buffer from the shared pool.
pub fn rent_bytes(min_capacity: usize) -> Result<Pooled<u8>> {
    BYTE_POOL.rent(min_capacity)
}

/// Rent a u64 buffer from the shared pool.
pub fn rent_offsets(min_capacity: usize) -> Result<Pooled<u64>> {
    OFFSET_POOL.rent(min_capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_and_release_reuses_allocation() {
        let mut buf = rent_bytes(4096).unwrap();
        buf.extend_from_slice(b"abc");
        let cap = buf.capacity();
        assert!(cap >= 4096);
        buf.release();

        let buf2 = rent_bytes(4096).unwrap();
        assert!(buf2.is_empty());
        assert!(buf2.capacity() >= 4096);
    }

    #[test]
    fn drop_returns_ticket() {
        let before = BYTE_POOL.outstanding();
        {
            let _a = rent_bytes(1024).unwrap();
            let _b = rent_bytes(1024).unwrap();
            assert_eq!(BYTE_POOL.outstanding(), before + 2);
        }
        assert_eq!(BYTE_POOL.outstanding(), before);
    }

    #[test]
    fn into_vec_detaches() {
        let mut buf = rent_offsets(64).unwrap();
        buf.push(7);
        let v = buf.into_vec();
        assert_eq!(v, vec![7]);
    }

    #[test]
    fn class_selection_is_monotonic() {
        assert_eq!(class_for(0), 0);
        assert_eq!(class_for(1024), 0);
        assert_eq!(class_for(1025), 1);
        assert!(class_capacity(class_for(1 << 20)) >= (1 << 20));
    }
}
