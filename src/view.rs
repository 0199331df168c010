//! Per-thread allocation view over a stack descriptor.
//!
//! Allocation is a single atomic `fetch_add` on the shared cursor: the value
//! before the add is the caller's start offset. There is no retry loop and no
//! lock. A request that runs past the end fails and leaves the cursor beyond
//! `capacity`, which makes every later request in the same launch fail too.

use std::marker::PhantomData;
use std::ops::Range;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::StackError;
use crate::pointers::StackAllocatorPointers;

/// Lock-free bump allocator over a fixed-capacity record buffer.
///
/// Views are cheap `Copy` wrappers; each worker thread builds or copies its
/// own. Every successful [`allocate`](Self::allocate) hands back a region no
/// other call in the same launch can receive.
pub struct StackAllocatorView<'a, T> {
    pointers: StackAllocatorPointers<T>,
    _borrow: PhantomData<&'a ()>,
}

impl<'a, T> StackAllocatorView<'a, T> {
    /// Bind a view to a raw descriptor.
    ///
    /// # Safety
    /// The descriptor's storage and cursor must stay alive and must not be
    /// accessed except through views for the whole lifetime `'a`.
    #[inline]
    pub unsafe fn new(pointers: StackAllocatorPointers<T>) -> Result<Self, StackError> {
        if !pointers.valid() {
            return Err(StackError::InvalidDescriptor);
        }
        Ok(Self::from_valid(pointers))
    }

    /// Bind a view to a descriptor already known to be valid.
    #[inline]
    pub(crate) unsafe fn from_valid(pointers: StackAllocatorPointers<T>) -> Self {
        debug_assert!(pointers.valid());
        Self {
            pointers,
            _borrow: PhantomData,
        }
    }

    #[inline(always)]
    fn cursor(&self) -> &'a AtomicUsize {
        // Safety: validity was checked at construction and the cursor
        // outlives 'a by the constructor's contract.
        unsafe { &*self.pointers.cursor() }
    }

    /// Reserve `count` consecutive slots and return their index range.
    ///
    /// Returns `None` when the request does not fit. A zero-sized request
    /// always succeeds with an empty range and leaves the cursor alone.
    #[inline(always)]
    pub fn reserve(&self, count: usize) -> Option<Range<usize>> {
        if count == 0 {
            return Some(0..0);
        }

        let capacity = self.pointers.capacity();
        let cursor = self.cursor();

        // Once exhausted, fail without touching the cursor. Only requests
        // already in flight can advance it further, each by at most
        // `capacity + 1`, so it cannot wrap back into the buffer.
        if cursor.load(Ordering::Relaxed) > capacity {
            return None;
        }

        // A request larger than the whole buffer can never succeed; claiming
        // `capacity + 1` still exhausts the arena.
        let claim = count.min(capacity.saturating_add(1));

        // Record visibility is established by the launch barrier, not by this
        // counter, so relaxed ordering is enough for unique offsets.
        let start = cursor.fetch_add(claim, Ordering::Relaxed);

        match start.checked_add(count) {
            Some(end) if end <= capacity => Some(start..end),
            _ => {
                #[cfg(debug_assertions)]
                tracing::trace!(
                    requested = count,
                    start,
                    capacity,
                    "secondary stack exhausted"
                );
                None
            }
        }
    }

    /// Allocate `count` records, returning exclusive access to them.
    ///
    /// The slots hold whatever the host last left there (the default record
    /// after a scrub); callers are expected to overwrite every one. `None`
    /// means the launch's buffer is too small: abort output for this
    /// invocation rather than retrying with a smaller count.
    #[inline(always)]
    pub fn allocate(&self, count: usize) -> Option<&'a mut [T]> {
        let range = self.reserve(count)?;
        // Safety: `range` lies within `[0, capacity)` and the atomic reserve
        // guarantees no other caller holds any slot of it until the host
        // clears the cursor, which requires all views to be gone.
        Some(unsafe {
            slice::from_raw_parts_mut(self.pointers.storage().add(range.start), range.len())
        })
    }

    /// Raw cursor value: records claimed so far, including failed claims.
    ///
    /// May exceed [`capacity`](Self::capacity) after an overflow.
    #[inline]
    pub fn size(&self) -> usize {
        self.cursor().load(Ordering::Relaxed)
    }

    /// Maximum number of records.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pointers.capacity()
    }

    /// Records still available, zero once exhausted.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.size())
    }

    /// Whether some request in this launch has overflowed.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.size() > self.capacity()
    }

    /// Whether the underlying descriptor is assigned.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.pointers.valid()
    }

    /// The descriptor this view allocates from.
    #[inline]
    pub fn pointers(&self) -> StackAllocatorPointers<T> {
        self.pointers
    }

    /// Reset the cursor to zero.
    ///
    /// Prefer [`StackAllocatorStore::clear`](crate::StackAllocatorStore::clear),
    /// which enforces the barrier through `&mut self`.
    ///
    /// # Safety
    /// No other thread may be allocating, and every region previously
    /// returned by this descriptor becomes reusable: none may still be in use.
    #[inline]
    pub unsafe fn clear(&self) {
        self.cursor().store(0, Ordering::Relaxed);
    }
}

impl<T> Clone for StackAllocatorView<'_, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StackAllocatorView<'_, T> {}

impl<T> std::fmt::Debug for StackAllocatorView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackAllocatorView")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .finish()
    }
}
