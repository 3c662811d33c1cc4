//! The `Sauna`: a per-thread dense scratch workspace with the hi-watermark reuse trick, pooled so
//! worker threads can check one out, use it, and hand it back instead of allocating fresh scratch
//! for every output vector.

use std::sync::{Condvar, Mutex};

use sparsegb_algebra::Scalar;

/// How many hi-watermark uses are allowed before the marks must be reset to zero. Kept far lower than
/// `u64::MAX` so tests can actually exercise the wraparound branch.
const DEFAULT_WRAP_AT: u64 = 1 << 62;

/// A paired `work`/`mark` workspace: `mark[i] == hiwater` means slot `i` of `work` holds a live
/// value for the *current* output vector.
pub struct Sauna {
    work: Vec<Option<Scalar>>,
    mark: Vec<u64>,
    hiwater: u64,
    wrap_at: u64,
}

impl Sauna {
    pub fn new(inner: usize) -> Self {
        Sauna { work: vec![None; inner], mark: vec![0; inner], hiwater: 1, wrap_at: DEFAULT_WRAP_AT }
    }

    #[cfg(test)]
    fn with_wrap_at(inner: usize, wrap_at: u64) -> Self {
        Sauna { wrap_at, ..Self::new(inner) }
    }

    pub fn len(&self) -> usize {
        self.work.len()
    }

    /// Begins a fresh output vector: bumps the watermark (wrapping and zeroing `mark` first if
    /// the counter has saturated), so every slot reads as "empty" without a per-vector O(inner)
    /// reset.
    pub fn begin_vector(&mut self) {
        if self.hiwater >= self.wrap_at {
            self.mark.iter_mut().for_each(|m| *m = 0);
            self.hiwater = 1;
        } else {
            self.hiwater += 1;
        }
    }

    pub fn is_set(&self, slot: usize) -> bool {
        self.mark[slot] == self.hiwater
    }

    pub fn get(&self, slot: usize) -> Option<&Scalar> {
        if self.is_set(slot) {
            self.work[slot].as_ref()
        } else {
            None
        }
    }

    pub fn set(&mut self, slot: usize, value: Scalar) {
        self.mark[slot] = self.hiwater;
        self.work[slot] = Some(value);
    }

    /// Yields `(slot, value)` for every live slot, in ascending slot order (callers rely on this
    /// for the gather phase of Gustavson multiply, which must emit strictly sorted inner indices).
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &Scalar)> {
        self.mark
            .iter()
            .zip(self.work.iter())
            .enumerate()
            .filter_map(move |(slot, (&mark, value))| {
                (mark == self.hiwater).then(|| (slot, value.as_ref().unwrap()))
            })
    }
}

/// A process-wide pool of `Sauna`s keyed only by availability, not by thread id directly — a
/// worker blocks until one is free, uses it, and returns it.
pub struct SaunaPool {
    inner: usize,
    free: Mutex<Vec<Sauna>>,
    available: Condvar,
}

impl SaunaPool {
    pub fn new(capacity: usize, inner: usize) -> Self {
        let free = (0..capacity).map(|_| Sauna::new(inner)).collect();
        SaunaPool { inner, free: Mutex::new(free), available: Condvar::new() }
    }

    /// Blocks until a `Sauna` is free, then hands it out. The returned guard returns it to the
    /// pool on drop.
    pub fn acquire(&self) -> SaunaGuard<'_> {
        let mut free = self.free.lock().unwrap();
        while free.is_empty() {
            free = self.available.wait(free).unwrap();
        }
        let sauna = free.pop().unwrap();
        SaunaGuard { pool: self, sauna: Some(sauna) }
    }

    pub fn inner_size(&self) -> usize {
        self.inner
    }
}

pub struct SaunaGuard<'a> {
    pool: &'a SaunaPool,
    sauna: Option<Sauna>,
}

impl<'a> std::ops::Deref for SaunaGuard<'a> {
    type Target = Sauna;
    fn deref(&self) -> &Sauna {
        self.sauna.as_ref().unwrap()
    }
}

impl<'a> std::ops::DerefMut for SaunaGuard<'a> {
    fn deref_mut(&mut self) -> &mut Sauna {
        self.sauna.as_mut().unwrap()
    }
}

impl<'a> Drop for SaunaGuard<'a> {
    fn drop(&mut self) {
        if let Some(sauna) = self.sauna.take() {
            self.pool.free.lock().unwrap().push(sauna);
            self.pool.available.notify_one();
        }
    }
}
