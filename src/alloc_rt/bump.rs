use alloc::vec::Vec;
use core::ptr::NonNull;

use super::{align_forward, AllocError, AllocatorHandle, Strategy};

struct Chunk {
    base: NonNull<u8>,
    size: usize,
}

/// Allocates by advancing an offset; `deallocate` is a no-op; exhaustion
/// chains a fresh chunk from `backing`.
///
/// `reset` rewinds to the first chunk and zeroes the offset rather than
/// releasing the buffer back to `backing` — see the bump-reset decision in
/// DESIGN.md: this is required for the reset-then-replay round-trip
/// property (same allocation sequence after reset yields the same
/// pointers), even though the original discards the buffer outright.
pub struct BumpAllocator {
    backing: AllocatorHandle,
    chunk_size: usize,
    chunks: Vec<Chunk>,
    current: usize,
    offset: usize,
}

impl BumpAllocator {
    pub fn new(backing: AllocatorHandle, chunk_size: usize) -> Self {
        Self {
            backing,
            chunk_size,
            chunks: Vec::new(),
            current: 0,
            offset: 0,
        }
    }

    fn grow(&mut self, min_size: usize) -> Result<(), AllocError> {
        let size = min_size.max(self.chunk_size);
        let base = self.backing.lock().allocate(size, core::mem::align_of::<usize>())?;
        self.chunks.push(Chunk { base, size });
        self.current = self.chunks.len() - 1;
        self.offset = 0;
        Ok(())
    }
}

impl Strategy for BumpAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        loop {
            if self.chunks.is_empty() {
                self.grow(size)?;
            }
            let chunk = &self.chunks[self.current];
            let base = chunk.base.as_ptr() as usize;
            let start = align_forward(base + self.offset, align) - base;
            if start + size <= chunk.size {
                self.offset = start + size;
                let ptr = unsafe { chunk.base.as_ptr().add(start) };
                return Ok(unsafe { NonNull::new_unchecked(ptr) });
            }
            if self.current + 1 < self.chunks.len() {
                self.current += 1;
                self.offset = 0;
                continue;
            }
            self.grow(size)?;
        }
    }

    unsafe fn deallocate(&mut self, _ptr: NonNull<u8>, _size: usize, _align: usize) {
        // individual deallocation is unsupported; memory is reclaimed in bulk by `reset`.
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if new_size <= old_size {
            return Ok(ptr);
        }
        let new_ptr = self.allocate(new_size, align)?;
        core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size);
        Ok(new_ptr)
    }

    fn reset(&mut self) {
        if !self.chunks.is_empty() {
            self.chunks.truncate(1);
        }
        self.current = 0;
        self.offset = 0;
    }
}
