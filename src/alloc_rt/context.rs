use alloc::vec::Vec;

use super::AllocatorHandle;

pub const CONTEXT_MAX_DEPTH: usize = 512;

/// One entry on the allocation-context stack: the allocator that is the
/// implicit default for any API that doesn't take one explicitly, plus an
/// opaque user pointer threaded through by callers (mirrors `context_t`'s
/// `{user, alloc}` pair).
#[derive(Clone)]
pub struct Context {
    pub allocator: AllocatorHandle,
    pub user: usize,
}

/// Per-thread stack of `Context` records. Overflowing `CONTEXT_MAX_DEPTH`
/// is fatal, matching the allocator framework's stance that resource
/// exhaustion here is a programming error, not a recoverable condition.
pub struct ContextStack {
    stack: Vec<Context>,
}

impl ContextStack {
    const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(&mut self, ctx: Context) {
        assert!(
            self.stack.len() < CONTEXT_MAX_DEPTH,
            "allocation context stack exceeded max depth of {CONTEXT_MAX_DEPTH}"
        );
        self.stack.push(ctx);
    }

    pub fn pop(&mut self) -> Option<Context> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&Context> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
mod tls {
    use super::ContextStack;
    use core::cell::RefCell;

    std::thread_local! {
        static STACK: RefCell<ContextStack> = RefCell::new(ContextStack::new());
    }

    pub fn with<R>(f: impl FnOnce(&mut ContextStack) -> R) -> R {
        STACK.with(|cell| f(&mut cell.borrow_mut()))
    }
}

#[cfg(not(feature = "std"))]
mod tls {
    use super::ContextStack;
    use spin::Mutex;

    /// No threads in a `no_std` build without an OS, so the stack is a
    /// single process-wide instance instead of truly thread-local.
    static STACK: Mutex<ContextStack> = Mutex::new(ContextStack { stack: alloc::vec::Vec::new() });

    pub fn with<R>(f: impl FnOnce(&mut ContextStack) -> R) -> R {
        f(&mut STACK.lock())
    }
}

pub fn push(allocator: AllocatorHandle, user: usize) {
    tls::with(|stack| stack.push(Context { allocator, user }));
}

pub fn pop() -> Option<Context> {
    tls::with(|stack| stack.pop())
}

pub fn top() -> Option<Context> {
    tls::with(|stack| stack.top().cloned())
}

pub fn depth() -> usize {
    tls::with(|stack| stack.depth())
}

pub fn current_or(default: &AllocatorHandle) -> AllocatorHandle {
    tls::with(|stack| {
        stack
            .top()
            .map(|ctx| ctx.allocator.clone())
            .unwrap_or_else(|| default.clone())
    })
}
