use alloc::vec::Vec;
use core::ptr::NonNull;

use super::{AllocError, AllocatorHandle, Strategy};

/// Hands out whole pages of a fixed size. Freed and reset pages are kept on
/// an internal free list so later allocations (or a `reset`) can reissue
/// them without returning to `backing`.
pub struct PageAllocator {
    backing: AllocatorHandle,
    page_size: usize,
    pages: Vec<NonNull<u8>>,
    free: Vec<usize>,
    issued: Vec<usize>,
}

impl PageAllocator {
    pub fn new(backing: AllocatorHandle, page_size: usize) -> Self {
        Self {
            backing,
            page_size,
            pages: Vec::new(),
            free: Vec::new(),
            issued: Vec::new(),
        }
    }

    fn index_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.pages.iter().position(|p| *p == ptr)
    }
}

impl Strategy for PageAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(size <= self.page_size);
        let idx = if let Some(idx) = self.free.pop() {
            idx
        } else {
            let page = self.backing.lock().allocate(self.page_size, align)?;
            self.pages.push(page);
            self.pages.len() - 1
        };
        self.issued.push(idx);
        Ok(self.pages[idx])
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, _size: usize, _align: usize) {
        if let Some(idx) = self.index_of(ptr) {
            self.issued.retain(|i| *i != idx);
            self.free.push(idx);
        }
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        _old_size: usize,
        new_size: usize,
        _align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if new_size <= self.page_size {
            return Ok(ptr);
        }
        Err(AllocError::OutOfMemory)
    }

    fn reset(&mut self) {
        self.free.append(&mut self.issued);
    }
}
