use alloc::alloc::{alloc, dealloc, realloc, Layout};
use core::ptr::NonNull;

use super::{AllocError, Strategy};

/// Thin wrapper over the host allocator, used as the default backing for
/// every other strategy and directly by callers who don't need anything
/// fancier.
#[derive(Default)]
pub struct SystemAllocator;

fn layout_for(size: usize, align: usize) -> Result<Layout, AllocError> {
    Layout::from_size_align(size.max(1), align).map_err(|_| AllocError::OutOfMemory)
}

impl Strategy for SystemAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = layout_for(size, align)?;
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::OutOfMemory)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize, align: usize) {
        let layout = layout_for(size, align).expect("layout was valid at allocation time");
        dealloc(ptr.as_ptr(), layout);
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let old_layout = layout_for(old_size, align)?;
        let raw = realloc(ptr.as_ptr(), old_layout, new_size.max(1));
        NonNull::new(raw).ok_or(AllocError::OutOfMemory)
    }
}
