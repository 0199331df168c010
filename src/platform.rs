//! Platform-specific backing storage for stack allocators.
//!
//! Record storage is mapped straight from the operating system so that a
//! large store costs nothing until its pages are touched:
//! - **Linux**: `mmap`/`munmap` via `rustix`
//! - **macOS**: `mach_vm_allocate`/`mach_vm_deallocate` via `mach2`
//! - **Other Unix**: `mmap`/`munmap` via `libc`
//! - **Elsewhere**: page-aligned blocks from the system allocator

/// Granularity every mapping is aligned to.
pub const PAGE_ALIGN: usize = 4096;

/// Platform-specific memory mapping functions.
pub mod sys {
    use crate::error::StackError;
    use std::ptr::NonNull;

    fn failed(size: usize) -> StackError {
        tracing::error!(bytes = size, "backing storage mapping failed");
        StackError::AllocFailed { bytes: size }
    }

    /// Map `size` bytes of zeroed, read/write memory.
    ///
    /// The block is aligned to at least [`PAGE_ALIGN`](super::PAGE_ALIGN) and
    /// must be released with [`free`] using the same `size`.
    #[cfg(target_os = "linux")]
    #[inline]
    pub fn alloc(size: usize) -> Result<NonNull<u8>, StackError> {
        use rustix::mm::{mmap_anonymous, MapFlags, ProtFlags};
        use std::ptr;

        debug_assert!(size > 0);

        let raw = unsafe {
            mmap_anonymous(
                ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE | MapFlags::NORESERVE,
            )
        }
        .map_err(|_| failed(size))?;
        NonNull::new(raw as *mut u8).ok_or_else(|| failed(size))
    }

    /// Release a block obtained from [`alloc`].
    ///
    /// # Safety
    /// `ptr` and `size` must come from a single successful [`alloc`] call,
    /// and nothing may reference the block afterwards.
    #[cfg(target_os = "linux")]
    #[inline]
    pub unsafe fn free(ptr: NonNull<u8>, size: usize) {
        if let Err(err) = rustix::mm::munmap(ptr.as_ptr() as *mut _, size) {
            tracing::error!(bytes = size, error = %err, "munmap failed");
        }
    }

    #[cfg(target_vendor = "apple")]
    #[inline]
    pub fn alloc(size: usize) -> Result<NonNull<u8>, StackError> {
        use mach2::kern_return::KERN_SUCCESS;
        use mach2::traps::mach_task_self;
        use mach2::vm::mach_vm_allocate;
        use mach2::vm_statistics::VM_FLAGS_ANYWHERE;
        use mach2::vm_types::{mach_vm_address_t, mach_vm_size_t};

        debug_assert!(size > 0);

        let task = unsafe { mach_task_self() };
        let mut address: mach_vm_address_t = 0;
        let vm_size: mach_vm_size_t = size as mach_vm_size_t;

        let retval = unsafe { mach_vm_allocate(task, &mut address, vm_size, VM_FLAGS_ANYWHERE) };

        if retval == KERN_SUCCESS {
            NonNull::new(address as *mut u8).ok_or_else(|| failed(size))
        } else {
            Err(failed(size))
        }
    }

    #[cfg(target_vendor = "apple")]
    #[inline]
    pub unsafe fn free(ptr: NonNull<u8>, size: usize) {
        use mach2::kern_return::KERN_SUCCESS;
        use mach2::traps::mach_task_self;
        use mach2::vm::mach_vm_deallocate;
        use mach2::vm_types::{mach_vm_address_t, mach_vm_size_t};

        let retval = mach_vm_deallocate(
            mach_task_self(),
            ptr.as_ptr() as mach_vm_address_t,
            size as mach_vm_size_t,
        );
        if retval != KERN_SUCCESS {
            tracing::error!(bytes = size, code = retval, "mach_vm_deallocate failed");
        }
    }

    /// Fallback for other Unix-like systems.
    #[cfg(all(not(target_os = "linux"), not(target_vendor = "apple"), unix))]
    #[inline]
    pub fn alloc(size: usize) -> Result<NonNull<u8>, StackError> {
        use libc::{mmap, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};
        use std::ptr;

        debug_assert!(size > 0);

        let raw = unsafe {
            mmap(
                ptr::null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANON,
                -1,
                0,
            )
        };

        if raw == MAP_FAILED {
            Err(failed(size))
        } else {
            NonNull::new(raw as *mut u8).ok_or_else(|| failed(size))
        }
    }

    #[cfg(all(not(target_os = "linux"), not(target_vendor = "apple"), unix))]
    #[inline]
    pub unsafe fn free(ptr: NonNull<u8>, size: usize) {
        if libc::munmap(ptr.as_ptr() as *mut libc::c_void, size) != 0 {
            tracing::error!(bytes = size, "munmap failed");
        }
    }

    /// Fallback for non-Unix targets: page-aligned zeroed blocks from the
    /// system allocator.
    #[cfg(not(unix))]
    #[inline]
    pub fn alloc(size: usize) -> Result<NonNull<u8>, StackError> {
        use std::alloc::{GlobalAlloc, Layout, System};

        debug_assert!(size > 0);

        let layout =
            Layout::from_size_align(size, super::PAGE_ALIGN).map_err(|_| failed(size))?;
        NonNull::new(unsafe { System.alloc_zeroed(layout) }).ok_or_else(|| failed(size))
    }

    #[cfg(not(unix))]
    #[inline]
    pub unsafe fn free(ptr: NonNull<u8>, size: usize) {
        use std::alloc::{GlobalAlloc, Layout, System};

        let layout = Layout::from_size_align_unchecked(size, super::PAGE_ALIGN);
        System.dealloc(ptr.as_ptr(), layout);
    }
}
