//! `Context`: per-call cancellation and thread budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Carried by every public entry point. Kernels poll `is_cancelled` at task boundaries only —
/// never per element.
#[derive(Clone, Debug)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    nthreads: Option<usize>,
    chunk: usize,
}

impl Default for Context {
    fn default() -> Self {
        Context { cancelled: Arc::new(AtomicBool::new(false)), nthreads: None, chunk: 4096 }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nthreads(mut self, n: usize) -> Self {
        self.nthreads = Some(n);
        self
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    pub fn nthreads(&self) -> Option<usize> {
        self.nthreads
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// A cloneable handle a worker thread can use to request cancellation, and every other task
    /// checks at its next block boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_visible_through_clone() {
        let ctx = Context::new();
        let handle = ctx.cancel_handle();
        assert!(!ctx.is_cancelled());
        handle.store(true, Ordering::Release);
        assert!(ctx.is_cancelled());
    }
}
