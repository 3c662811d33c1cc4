//! The task/thread cost model: how many threads and tasks an operation over `nz` nonzeros gets.
//! This module only computes the counts; the kernels themselves drive the actual `maybe_rayon`
//! iteration over the resulting ranges.

use sparsegb_util::ceil_div_usize;

use crate::context::Context;

/// A concrete `(nthreads, ntasks)` plan for an operation over `nz` nonzeros, derived from the
/// `Context`'s budget: `nthreads = min(nthreads_max, ceil(nz/chunk))`, `ntasks = 1` if
/// `nthreads == 1` else `min(nz, 64*nthreads)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Plan {
    pub nthreads: usize,
    pub ntasks: usize,
}

pub fn plan_for(ctx: &Context, nz: usize) -> Plan {
    let available = ctx.nthreads().unwrap_or_else(num_cpus_fallback).max(1);
    let chunk = ctx.chunk().max(1);
    let needed = ceil_div_usize(nz, chunk).max(1);
    let nthreads = available.min(needed);
    let ntasks = if nthreads == 1 { 1 } else { nz.min(64 * nthreads).max(1) };
    Plan { nthreads, ntasks }
}

/// `available_parallelism` is the stdlib's own core-count estimate, used only as the default
/// when a `Context` doesn't pin a thread count.
fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Splits `len` contiguous work units into `ntasks` near-even, disjoint `[start, end)` ranges.
pub fn partition_ranges(len: usize, ntasks: usize) -> Vec<(usize, usize)> {
    if len == 0 || ntasks == 0 {
        return Vec::new();
    }
    let ntasks = ntasks.min(len.max(1));
    let base = len / ntasks;
    let rem = len % ntasks;
    let mut ranges = Vec::with_capacity(ntasks);
    let mut start = 0;
    for t in 0..ntasks {
        let size = base + usize::from(t < rem);
        if size == 0 {
            continue;
        }
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_thread_context_yields_one_task() {
        let ctx = Context::new().with_nthreads(1);
        let plan = plan_for(&ctx, 1_000_000);
        assert_eq!(plan, Plan { nthreads: 1, ntasks: 1 });
    }

    #[test]
    fn small_input_does_not_oversubscribe() {
        let ctx = Context::new().with_nthreads(8).with_chunk(4096);
        let plan = plan_for(&ctx, 10);
        assert_eq!(plan.nthreads, 1);
    }

    #[test]
    fn partition_covers_every_element_exactly_once() {
        let ranges = partition_ranges(97, 8);
        let mut covered = vec![false; 97];
        for (start, end) in &ranges {
            for slot in covered.iter_mut().take(*end).skip(*start) {
                assert!(!*slot, "range overlap");
                *slot = true;
            }
        }
        assert!(covered.into_iter().all(|c| c));
    }

    #[test]
    fn partition_of_empty_input_is_empty() {
        assert!(partition_ranges(0, 8).is_empty());
    }
}
