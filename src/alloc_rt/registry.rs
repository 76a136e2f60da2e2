use alloc::vec::Vec;

use super::{AllocError, Allocator, AllocatorConfig, AllocatorHandle, Kind};

/// The process-wide (or, under `std`, thread-local) list of allocators
/// created through `make`, in creation order, so `shutdown` can release
/// them in reverse.
struct Registry {
    allocators: Vec<AllocatorHandle>,
}

impl Registry {
    const fn new() -> Self {
        Self {
            allocators: Vec::new(),
        }
    }
}

#[cfg(feature = "std")]
mod tls {
    use super::Registry;
    use core::cell::RefCell;

    std::thread_local! {
        static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
    }

    pub fn with<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
        REGISTRY.with(|cell| f(&mut cell.borrow_mut()))
    }
}

#[cfg(not(feature = "std"))]
mod tls {
    use super::Registry;
    use spin::Mutex;

    static REGISTRY: Mutex<Registry> = Mutex::new(Registry::new());

    pub fn with<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
        f(&mut REGISTRY.lock())
    }
}

/// Builds a new allocator of `kind` from `config`, registering it so a
/// later `shutdown` releases it. Strategies that wrap another allocator
/// (everything but `System`/`Dlmalloc`) use `backing`, defaulting to a
/// fresh system allocator when none is given.
pub fn make(
    kind: Kind,
    config: &AllocatorConfig,
    backing: Option<AllocatorHandle>,
) -> Result<AllocatorHandle, AllocError> {
    let handle = match kind {
        Kind::System => Allocator::new_system(),
        Kind::Dlmalloc => Allocator::new_dlmalloc(config.dlmalloc_region_size)?,
        Kind::Bump => Allocator::new_bump(
            backing.unwrap_or_else(Allocator::new_system),
            config.bump_chunk_size,
        ),
        Kind::Slab => Allocator::new_slab(
            backing.unwrap_or_else(Allocator::new_system),
            config.slab_buf_size,
            config.slab_buf_align,
        ),
        Kind::Page => Allocator::new_page(
            backing.unwrap_or_else(Allocator::new_system),
            config.page_size,
        ),
        Kind::Proxy => Allocator::new_proxy(backing.unwrap_or_else(Allocator::new_system), 0),
        Kind::Trace => Allocator::new_trace(backing.unwrap_or_else(Allocator::new_system)),
    };
    tls::with(|r| r.allocators.push(handle.clone()));
    Ok(handle)
}

/// Releases every allocator registered through `make` in reverse creation
/// order, stopping at the first failure (an earlier allocator is left
/// registered if a later one in the unwind order fails to release).
pub fn shutdown(enforce: bool) -> Result<(), AllocError> {
    tls::with(|r| {
        while let Some(alloc) = r.allocators.last().cloned() {
            alloc.lock().release(enforce)?;
            r.allocators.pop();
        }
        Ok(())
    })
}

pub fn registered_count() -> usize {
    tls::with(|r| r.allocators.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_registers_and_shutdown_releases_in_reverse_order() {
        let config = AllocatorConfig::default();
        let a = make(Kind::System, &config, None).unwrap();
        let b = make(Kind::Page, &config, Some(a.clone())).unwrap();
        assert_eq!(registered_count(), 2);

        // `b` wraps `a`, so releasing in reverse order (b, then a) is the
        // only order that doesn't try to release a still-in-use backing
        // allocator first.
        shutdown(false).unwrap();
        assert_eq!(registered_count(), 0);
    }
}
