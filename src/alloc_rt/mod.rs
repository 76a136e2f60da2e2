//! Pluggable allocator framework: a uniform allocate/deallocate/reallocate
//! contract over several interchangeable backing strategies.
//!
//! A small trait at the seam (`Strategy`), a handle type that erases the
//! concrete strategy (`AllocatorHandle`), and a `Default`-driven config for
//! each strategy.

mod bump;
mod config;
mod context;
mod dlmalloc;
mod page;
mod proxy;
mod registry;
mod slab;
mod system;
mod trace;

pub use bump::BumpAllocator;
pub use config::{AllocatorConfig, Kind};
pub use context::{Context, ContextStack, CONTEXT_MAX_DEPTH};
pub use dlmalloc::DlmallocAllocator;
pub use page::PageAllocator;
pub use proxy::ProxyAllocator;
pub use registry::{make, registered_count, shutdown};
pub use slab::SlabAllocator;
pub use system::SystemAllocator;
pub use trace::{TraceAllocator, TraceEvent};

use alloc::sync::Arc;
use core::fmt::Formatter;
use core::ptr::NonNull;
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory,
    Leak { balance: usize },
    DoubleFree,
    InvalidFree,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of memory"),
            AllocError::Leak { balance } => write!(f, "leak: {balance} bytes outstanding"),
            AllocError::DoubleFree => write!(f, "double free"),
            AllocError::InvalidFree => write!(f, "pointer not owned by this allocator"),
        }
    }
}

/// One strategy implementation. `reset` is a no-op by default; bump/page
/// override it since it's their one cheap bulk-release operation.
pub trait Strategy: Send {
    fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError>;

    /// # Safety
    /// `ptr` must have been returned by a prior `allocate`/`reallocate` on
    /// this same strategy instance, with the same `size`/`align`.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize, align: usize);

    /// # Safety
    /// Same contract as `deallocate` for `ptr`/`old_size`/`align`.
    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError>;

    fn reset(&mut self) {}

    fn release(&mut self, _enforce: bool) -> Result<(), AllocError> {
        Ok(())
    }
}

enum Inner {
    System(SystemAllocator),
    Dlmalloc(DlmallocAllocator),
    Bump(BumpAllocator),
    Slab(SlabAllocator),
    Page(PageAllocator),
    Proxy(ProxyAllocator),
    Trace(TraceAllocator),
}

impl Inner {
    fn as_strategy(&mut self) -> &mut dyn Strategy {
        match self {
            Inner::System(s) => s,
            Inner::Dlmalloc(s) => s,
            Inner::Bump(s) => s,
            Inner::Slab(s) => s,
            Inner::Page(s) => s,
            Inner::Proxy(s) => s,
            Inner::Trace(s) => s,
        }
    }
}

/// A handle to one allocator instance: kind tag, running `total_allocated`
/// counter, and the strategy-specific state. Shared via `Arc<Mutex<_>>` so
/// it can serve as another allocator's backing.
pub struct Allocator {
    kind: Kind,
    total_allocated: usize,
    inner: Inner,
}

pub type AllocatorHandle = Arc<Mutex<Allocator>>;

impl Allocator {
    pub fn new_system() -> AllocatorHandle {
        Self::wrap(Kind::System, Inner::System(SystemAllocator::default()))
    }

    pub fn new_dlmalloc(region_size: usize) -> Result<AllocatorHandle, AllocError> {
        let strategy = DlmallocAllocator::new(region_size)?;
        Ok(Self::wrap(Kind::Dlmalloc, Inner::Dlmalloc(strategy)))
    }

    pub fn new_bump(backing: AllocatorHandle, chunk_size: usize) -> AllocatorHandle {
        let strategy = BumpAllocator::new(backing, chunk_size);
        Self::wrap(Kind::Bump, Inner::Bump(strategy))
    }

    pub fn new_slab(backing: AllocatorHandle, buf_size: usize, buf_align: usize) -> AllocatorHandle {
        let strategy = SlabAllocator::new(backing, buf_size, buf_align);
        Self::wrap(Kind::Slab, Inner::Slab(strategy))
    }

    pub fn new_page(backing: AllocatorHandle, page_size: usize) -> AllocatorHandle {
        let strategy = PageAllocator::new(backing, page_size);
        Self::wrap(Kind::Page, Inner::Page(strategy))
    }

    pub fn new_proxy(backing: AllocatorHandle, name: u32) -> AllocatorHandle {
        let strategy = ProxyAllocator::new(backing, name);
        Self::wrap(Kind::Proxy, Inner::Proxy(strategy))
    }

    pub fn new_trace(backing: AllocatorHandle) -> AllocatorHandle {
        let strategy = TraceAllocator::new(backing);
        Self::wrap(Kind::Trace, Inner::Trace(strategy))
    }

    fn wrap(kind: Kind, inner: Inner) -> AllocatorHandle {
        Arc::new(Mutex::new(Allocator {
            kind,
            total_allocated: 0,
            inner,
        }))
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }

    pub fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.inner.as_strategy().allocate(size, align)?;
        self.total_allocated += size;
        tracing::trace!(kind = ?self.kind, size, align, "allocate");
        Ok(ptr)
    }

    /// # Safety
    /// See [`Strategy::deallocate`].
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize, align: usize) {
        self.inner.as_strategy().deallocate(ptr, size, align);
        self.total_allocated -= size;
        tracing::trace!(kind = ?self.kind, size, "deallocate");
    }

    /// # Safety
    /// See [`Strategy::reallocate`].
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let new_ptr = self
            .inner
            .as_strategy()
            .reallocate(ptr, old_size, new_size, align)?;
        self.total_allocated = self.total_allocated - old_size + new_size;
        Ok(new_ptr)
    }

    pub fn reset(&mut self) {
        self.inner.as_strategy().reset();
        self.total_allocated = 0;
    }

    pub fn release(&mut self, enforce: bool) -> Result<(), AllocError> {
        if enforce && self.total_allocated > 0 {
            return Err(AllocError::Leak {
                balance: self.total_allocated,
            });
        }
        self.inner.as_strategy().release(enforce)
    }
}

/// `align_forward(p, align) = (p + align - 1) & ~(align - 1)`, shared by
/// every strategy that carves contiguous memory by hand.
#[inline]
pub fn align_forward(p: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (p + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_allocations_zero_total() {
        let sys = Allocator::new_system();
        let ptrs: Vec<_> = (0..8)
            .map(|_| sys.lock().allocate(32, 8).unwrap())
            .collect();
        for p in ptrs {
            unsafe { sys.lock().deallocate(p, 32, 8) };
        }
        assert_eq!(sys.lock().total_allocated(), 0);
    }

    #[test]
    fn bump_reset_round_trip() {
        let page = Allocator::new_page(Allocator::new_system(), 4096);
        let bump = Allocator::new_bump(page, 4096);

        let first: Vec<usize> = (0..10)
            .map(|_| bump.lock().allocate(64, 8).unwrap().as_ptr() as usize)
            .collect();
        bump.lock().reset();
        let second: Vec<usize> = (0..10)
            .map(|_| bump.lock().allocate(64, 8).unwrap().as_ptr() as usize)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn slab_free_list_reuses_freed_slot() {
        let page = Allocator::new_page(Allocator::new_system(), 4096);
        let slab = Allocator::new_slab(page, 64, 8);

        let a = slab.lock().allocate(64, 8).unwrap();
        let b = slab.lock().allocate(64, 8).unwrap();
        let _c = slab.lock().allocate(64, 8).unwrap();
        unsafe { slab.lock().deallocate(b, 64, 8) };
        let d = slab.lock().allocate(64, 8).unwrap();
        assert_eq!(b, d);
        let _ = a;
    }

    #[test]
    fn proxy_forwards_and_accounts_independently() {
        let sys = Allocator::new_system();
        let proxy_a = Allocator::new_proxy(sys.clone(), 1);
        let proxy_b = Allocator::new_proxy(sys.clone(), 2);

        let p = proxy_a.lock().allocate(16, 8).unwrap();
        assert_eq!(proxy_a.lock().total_allocated(), 16);
        assert_eq!(proxy_b.lock().total_allocated(), 0);
        unsafe { proxy_a.lock().deallocate(p, 16, 8) };
        assert_eq!(proxy_a.lock().total_allocated(), 0);
    }

    #[test]
    fn release_enforced_fails_on_outstanding_balance() {
        let sys = Allocator::new_system();
        let _p = sys.lock().allocate(16, 8).unwrap();
        assert!(matches!(
            sys.lock().release(true),
            Err(AllocError::Leak { .. })
        ));
    }

    #[test]
    fn context_stack_push_pop_top() {
        let sys = Allocator::new_system();
        assert!(context::top().is_none());
        context::push(sys.clone(), 42);
        assert_eq!(context::top().unwrap().user, 42);
        assert_eq!(context::depth(), 1);
        context::pop();
        assert!(context::top().is_none());
    }
}
