use core::ptr::NonNull;

use super::{AllocError, AllocatorHandle, Strategy};

/// Pure pass-through: every call forwards to `backing`. Its own
/// `total_allocated` (tracked by the owning `Allocator`) lets several
/// proxies over one backing expose independent accounting. `name` is an
/// interned id used only for diagnostic listing.
pub struct ProxyAllocator {
    backing: AllocatorHandle,
    name: u32,
}

impl ProxyAllocator {
    pub fn new(backing: AllocatorHandle, name: u32) -> Self {
        Self { backing, name }
    }

    pub fn name(&self) -> u32 {
        self.name
    }
}

impl Strategy for ProxyAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        self.backing.lock().allocate(size, align)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize, align: usize) {
        self.backing.lock().deallocate(ptr, size, align);
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.backing.lock().reallocate(ptr, old_size, new_size, align)
    }

    fn reset(&mut self) {
        self.backing.lock().reset();
    }
}
