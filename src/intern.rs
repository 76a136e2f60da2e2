//! Content-addressed byte-slice interning: maps slices to dense `u32` ids,
//! deduplicating by content and copying slice data into pool-owned storage
//! so callers can release their own copy.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::hash::Hasher;
use fnv::FnvHasher;
use spin::Mutex;

use crate::alloc_rt::{Allocator, AllocatorHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternedSlice {
    pub id: u32,
    pub is_new: bool,
}

struct Entry {
    hash: u64,
    ptr: core::ptr::NonNull<u8>,
    len: usize,
}

// SAFETY: `Entry` only ever points into memory owned by the pool's own page
// allocator, which outlives every `Entry` stored here.
unsafe impl Send for Entry {}

struct Inner {
    pages: AllocatorHandle,
    entries: Vec<Entry>,
    buckets: hashbrown::HashMap<u64, Vec<u32>>,
}

/// A single writer is assumed; callers synchronize externally if sharing
/// across threads, matching the "single-writer" resource policy.
pub struct InternPool {
    inner: Mutex<Inner>,
}

impl InternPool {
    pub fn new(backing: AllocatorHandle) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pages: Allocator::new_page(backing, 4096),
                entries: Vec::new(),
                buckets: hashbrown::HashMap::new(),
            }),
        }
    }

    fn hash(slice: &[u8]) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(slice);
        hasher.finish()
    }

    pub fn intern(&self, slice: &[u8]) -> InternedSlice {
        let hash = Self::hash(slice);
        let mut inner = self.inner.lock();

        if let Some(candidates) = inner.buckets.get(&hash) {
            for &id in candidates {
                let entry = &inner.entries[id as usize];
                let existing =
                    unsafe { core::slice::from_raw_parts(entry.ptr.as_ptr(), entry.len) };
                if existing == slice {
                    return InternedSlice { id, is_new: false };
                }
            }
        }

        let ptr = inner
            .pages
            .lock()
            .allocate(slice.len().max(1), 1)
            .expect("intern pool backing allocator exhausted");
        unsafe {
            core::ptr::copy_nonoverlapping(slice.as_ptr(), ptr.as_ptr(), slice.len());
        }
        let id = inner.entries.len() as u32;
        inner.entries.push(Entry {
            hash,
            ptr,
            len: slice.len(),
        });
        inner.buckets.entry(hash).or_default().push(id);
        InternedSlice { id, is_new: true }
    }

    pub fn get(&self, id: u32) -> Option<Arc<[u8]>> {
        let inner = self.inner.lock();
        let entry = inner.entries.get(id as usize)?;
        let slice = unsafe { core::slice::from_raw_parts(entry.ptr.as_ptr(), entry.len) };
        Some(Arc::from(slice))
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.buckets.clear();
        inner.pages.lock().reset();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc_rt::Allocator;

    #[test]
    fn same_bytes_yield_same_id() {
        let pool = InternPool::new(Allocator::new_system());
        let a = pool.intern(b"hello");
        let b = pool.intern(b"hello");
        assert_eq!(a.id, b.id);
        assert!(a.is_new);
        assert!(!b.is_new);
    }

    #[test]
    fn different_bytes_yield_different_ids() {
        let pool = InternPool::new(Allocator::new_system());
        let a = pool.intern(b"hello");
        let b = pool.intern(b"world");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn get_round_trips_the_bytes() {
        let pool = InternPool::new(Allocator::new_system());
        let id = pool.intern(b"round-trip").id;
        assert_eq!(&*pool.get(id).unwrap(), b"round-trip");
    }
}
