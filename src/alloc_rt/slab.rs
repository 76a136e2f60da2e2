use alloc::vec::Vec;
use core::ptr::NonNull;

use super::{AllocError, AllocatorHandle, Strategy};

const SLAB_PAGE_SIZE: usize = 4096;

/// Fixed-size-object allocator. Allocate pops the head of a freelist
/// threaded through unused slots; on an empty freelist a fresh page is
/// carved from `backing` into `buf_size`-aligned slots.
pub struct SlabAllocator {
    backing: AllocatorHandle,
    buf_size: usize,
    buf_align: usize,
    slots_per_page: usize,
    pages: Vec<NonNull<u8>>,
    free_list: Option<NonNull<u8>>,
}

impl SlabAllocator {
    pub fn new(backing: AllocatorHandle, buf_size: usize, buf_align: usize) -> Self {
        let buf_size = buf_size.max(core::mem::size_of::<usize>());
        let slots_per_page = (SLAB_PAGE_SIZE / buf_size).max(1);
        Self {
            backing,
            buf_size,
            buf_align,
            slots_per_page,
            pages: Vec::new(),
            free_list: None,
        }
    }

    fn carve_page(&mut self) -> Result<(), AllocError> {
        let page_size = self.slots_per_page * self.buf_size;
        let page = self.backing.lock().allocate(page_size, self.buf_align)?;
        for i in (0..self.slots_per_page).rev() {
            let slot = unsafe { page.as_ptr().add(i * self.buf_size) };
            let slot = unsafe { NonNull::new_unchecked(slot) };
            self.push_free(slot);
        }
        self.pages.push(page);
        Ok(())
    }

    fn push_free(&mut self, slot: NonNull<u8>) {
        unsafe {
            (slot.as_ptr() as *mut *mut u8).write(
                self.free_list.map(|p| p.as_ptr()).unwrap_or(core::ptr::null_mut()),
            );
        }
        self.free_list = Some(slot);
    }
}

impl Strategy for SlabAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(size <= self.buf_size && align <= self.buf_align);
        if self.free_list.is_none() {
            self.carve_page()?;
        }
        let slot = self.free_list.expect("just carved a page");
        let next = unsafe { *(slot.as_ptr() as *mut *mut u8) };
        self.free_list = NonNull::new(next);
        Ok(slot)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, _size: usize, _align: usize) {
        self.push_free(ptr);
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        _old_size: usize,
        new_size: usize,
        _align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if new_size <= self.buf_size {
            return Ok(ptr);
        }
        Err(AllocError::OutOfMemory)
    }

    fn reset(&mut self) {
        self.free_list = None;
        self.pages.clear();
    }
}
