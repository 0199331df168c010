//! Flat descriptor handed to parallel kernels.

use std::fmt;
use std::ptr;
use std::sync::atomic::AtomicUsize;

/// Raw, trivially copyable handle to a stack allocator's storage and cursor.
///
/// This is the value that crosses the host/kernel boundary: a pointer to
/// `capacity` contiguous records plus a pointer to the shared allocation
/// cursor. It owns nothing and has no `Drop`; the
/// [`StackAllocatorStore`](crate::StackAllocatorStore) it came from keeps both
/// alive. All mutation goes through
/// [`StackAllocatorView::allocate`](crate::StackAllocatorView::allocate).
#[repr(C)]
pub struct StackAllocatorPointers<T> {
    storage: *mut T,
    capacity: usize,
    cursor: *const AtomicUsize,
}

impl<T> StackAllocatorPointers<T> {
    /// Assemble a descriptor from its parts.
    ///
    /// # Safety
    /// If non-null, `storage` must point to `capacity` initialized records and
    /// `cursor` to a live `AtomicUsize`, both outliving every view built from
    /// this descriptor. Nothing else may access the records while views are
    /// allocating from them.
    #[inline]
    pub const unsafe fn from_raw_parts(
        storage: *mut T,
        capacity: usize,
        cursor: *const AtomicUsize,
    ) -> Self {
        Self {
            storage,
            capacity,
            cursor,
        }
    }

    /// Whether the descriptor has been assigned storage.
    #[inline]
    pub fn valid(&self) -> bool {
        !self.storage.is_null() && !self.cursor.is_null() && self.capacity > 0
    }

    /// Maximum number of records.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn storage(&self) -> *mut T {
        self.storage
    }

    #[inline]
    pub(crate) fn cursor(&self) -> *const AtomicUsize {
        self.cursor
    }
}

// Manual impls: deriving would put a `T: Clone` bound on a plain pointer.
impl<T> Clone for StackAllocatorPointers<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StackAllocatorPointers<T> {}

impl<T> Default for StackAllocatorPointers<T> {
    fn default() -> Self {
        Self {
            storage: ptr::null_mut(),
            capacity: 0,
            cursor: ptr::null(),
        }
    }
}

impl<T> fmt::Debug for StackAllocatorPointers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAllocatorPointers")
            .field("storage", &self.storage)
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor)
            .finish()
    }
}

// Safety: the descriptor is replicated to every worker of a launch. Records
// reachable through it are only handed out as disjoint regions, so moving
// `T` between threads is the only requirement; the cursor is atomic.
unsafe impl<T: Send> Send for StackAllocatorPointers<T> {}
unsafe impl<T: Send> Sync for StackAllocatorPointers<T> {}
