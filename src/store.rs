//! Host-side owner of stack storage.
//!
//! `StackAllocatorStore` maps the record buffer from the OS, owns the shared
//! cursor and hands out descriptors and views for kernel launches. Operations
//! that must not race with allocation (`clear`, `scrub`, `grow`, reading the
//! records) take `&mut self`, so the borrow checker enforces the barrier
//! between launches: views borrow the store and must all be gone first.

use std::mem;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::StackConfig;
use crate::error::StackError;
use crate::platform::sys;
use crate::pointers::StackAllocatorPointers;
use crate::view::StackAllocatorView;

/// Usage snapshot of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackStats {
    /// Maximum number of records.
    pub capacity: usize,
    /// Slots handed out, clamped to capacity.
    pub claimed: usize,
    /// Raw cursor value; larger than `capacity` after an overflow.
    pub requested: usize,
    /// Whether some request has failed since the last clear.
    pub overflowed: bool,
}

/// Owning, fixed-capacity record buffer plus its allocation cursor.
pub struct StackAllocatorStore<T> {
    storage: NonNull<T>,
    capacity: usize,
    /// Size of the mapping in bytes.
    bytes: usize,
    /// Boxed so its address survives moves of the store: raw descriptors
    /// point at it.
    cursor: Box<AtomicUsize>,
}

impl<T: Copy + Default> StackAllocatorStore<T> {
    /// Build a store sized by `config`.
    pub fn new(config: &StackConfig) -> Result<Self, StackError> {
        config.validate()?;
        let (storage, bytes) = Self::map(config.capacity)?;
        Ok(Self {
            storage,
            capacity: config.capacity,
            bytes,
            cursor: Box::new(AtomicUsize::new(0)),
        })
    }

    /// Build a store holding `capacity` records with the default policy.
    pub fn with_capacity(capacity: usize) -> Result<Self, StackError> {
        Self::new(&StackConfig::new(capacity))
    }

    /// Map and default-initialize storage for `capacity` records.
    fn map(capacity: usize) -> Result<(NonNull<T>, usize), StackError> {
        let record = mem::size_of::<T>();
        if record == 0 {
            return Err(StackError::ZeroSizedRecord);
        }
        if capacity == 0 {
            return Err(StackError::InvalidConfig {
                reason: "capacity must be non-zero".into(),
            });
        }
        debug_assert!(mem::align_of::<T>() <= crate::platform::PAGE_ALIGN);

        let bytes = record
            .checked_mul(capacity)
            .ok_or(StackError::AllocFailed { bytes: usize::MAX })?;
        let storage = sys::alloc(bytes)?.cast::<T>();
        unsafe { Self::fill_default(storage, capacity) };
        Ok((storage, bytes))
    }

    unsafe fn fill_default(storage: NonNull<T>, capacity: usize) {
        let base = storage.as_ptr();
        for i in 0..capacity {
            base.add(i).write(T::default());
        }
    }

    /// Reset the cursor and overwrite every slot with `T::default()`.
    ///
    /// After an overflowed launch the buffer may contain holes that no
    /// successful request claimed; scrubbing keeps them from carrying stale
    /// records into the next launch.
    pub fn scrub(&mut self) {
        unsafe { Self::fill_default(self.storage, self.capacity) };
        self.clear();
    }

    /// Replace the buffer with one holding `new_capacity` records.
    ///
    /// All records are discarded and the cursor is reset; descriptors taken
    /// before the call are invalidated.
    pub fn grow(&mut self, new_capacity: usize) -> Result<(), StackError> {
        if new_capacity <= self.capacity {
            return Err(StackError::InvalidGrowth {
                current: self.capacity,
                requested: new_capacity,
            });
        }

        let (storage, bytes) = Self::map(new_capacity)?;
        unsafe { sys::free(self.storage.cast::<u8>(), self.bytes) };
        tracing::info!(
            from = self.capacity,
            to = new_capacity,
            "secondary stack grown"
        );

        self.storage = storage;
        self.capacity = new_capacity;
        self.bytes = bytes;
        self.clear();
        Ok(())
    }
}

impl<T> StackAllocatorStore<T> {
    /// Descriptor for this store.
    ///
    /// The descriptor carries no lifetime: it must not be used after the
    /// store is dropped or grown. Prefer [`view`](Self::view) in Rust code.
    #[inline]
    pub fn pointers(&self) -> StackAllocatorPointers<T> {
        unsafe {
            StackAllocatorPointers::from_raw_parts(
                self.storage.as_ptr(),
                self.capacity,
                &*self.cursor,
            )
        }
    }

    /// View for allocating from this store during a launch.
    #[inline]
    pub fn view(&self) -> StackAllocatorView<'_, T> {
        // Safety: the view borrows `self`, so storage and cursor outlive it,
        // and every record accessor needs `&mut self`.
        unsafe { StackAllocatorView::from_valid(self.pointers()) }
    }

    /// Reset the cursor to zero. Records are left in place.
    #[inline]
    pub fn clear(&mut self) {
        self.cursor.store(0, Ordering::Relaxed);
    }

    /// Raw cursor value; exceeds [`capacity`](Self::capacity) after overflow.
    #[inline]
    pub fn size(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Maximum number of records.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a request has failed since the last clear.
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.size() > self.capacity
    }

    /// The slots handed out since the last clear.
    pub fn records(&mut self) -> &[T] {
        let len = self.size().min(self.capacity);
        unsafe { slice::from_raw_parts(self.storage.as_ptr(), len) }
    }

    /// Mutable access to the slots handed out since the last clear.
    pub fn records_mut(&mut self) -> &mut [T] {
        let len = self.size().min(self.capacity);
        unsafe { slice::from_raw_parts_mut(self.storage.as_ptr(), len) }
    }

    /// Usage statistics.
    pub fn stats(&self) -> StackStats {
        let requested = self.size();
        StackStats {
            capacity: self.capacity,
            claimed: requested.min(self.capacity),
            requested,
            overflowed: requested > self.capacity,
        }
    }
}

impl<T> Drop for StackAllocatorStore<T> {
    fn drop(&mut self) {
        // Records are `Copy`: nothing to drop in place.
        unsafe { sys::free(self.storage.cast::<u8>(), self.bytes) };
    }
}

impl<T> std::fmt::Debug for StackAllocatorStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackAllocatorStore")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}

// Safety: the store exclusively owns its mapping. Shared access only yields
// views, which hand out disjoint regions, so `T: Send` is sufficient.
unsafe impl<T: Send> Send for StackAllocatorStore<T> {}
unsafe impl<T: Send> Sync for StackAllocatorStore<T> {}
