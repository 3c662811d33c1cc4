//! Parallel monoid reduction to a scalar, with terminal short-circuit: the nonzero array is
//! partitioned into ranges, each range reduces to a private accumulator, and the partials combine
//! sequentially at the end. A single shared atomic flag lets any range's accumulator hitting the
//! monoid's terminal value cut the others short.

use std::sync::atomic::{AtomicBool, Ordering};

use sparsegb_algebra::{dispatch_binary, BinaryOp, Monoid, Scalar};
use sparsegb_maybe_rayon::*;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::scheduler;
use crate::wait;

/// Reduces `a`'s values through `monoid`, accumulating into `c_out`. The result (and `accum`'s
/// output) is always cast to `monoid.op.z_type`, even if `a`'s declared type differs.
pub fn reduce_scalar(
    ctx: &Context,
    accum: Option<&BinaryOp>,
    c_out: &mut Scalar,
    monoid: &Monoid,
    a: &mut Matrix,
) -> Result<()> {
    if !a.type_code().castable_to(monoid.op.z_type) {
        return Err(Error::DomainMismatch);
    }
    wait::wait(a)?;

    let nz = a.i.len();
    let plan = scheduler::plan_for(ctx, nz);
    let ranges = scheduler::partition_ranges(nz, plan.ntasks);

    let early_exit = AtomicBool::new(false);
    let x = &a.x;

    let partials: Vec<Scalar> = ranges
        .into_par_iter()
        .map(|(start, end)| -> Result<Scalar> {
            let mut acc = monoid.identity.clone();
            // Blocks of this size bound how often the shared flag (and cancellation) is polled —
            // between blocks, never per element.
            const BLOCK: usize = 256;
            let mut pos = start;
            while pos < end {
                if ctx.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if early_exit.load(Ordering::Acquire) {
                    break;
                }
                let block_end = (pos + BLOCK).min(end);
                for v in &x[pos..block_end] {
                    acc = dispatch_binary(&monoid.op, &acc, v)?;
                    if monoid.is_terminal(&acc) {
                        early_exit.store(true, Ordering::Release);
                        break;
                    }
                }
                pos = block_end;
            }
            Ok(acc)
        })
        .collect::<Result<Vec<Scalar>>>()?;

    let mut result = monoid.identity.clone();
    for partial in partials {
        result = dispatch_binary(&monoid.op, &result, &partial)?;
    }

    *c_out = match accum {
        Some(op) => dispatch_binary(op, c_out, &result)?,
        None => result,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsegb_algebra::{OpCode, TypeCode};

    fn plus_monoid() -> Monoid {
        Monoid::new(BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::Int32), Scalar::Int32(0), None)
            .unwrap()
    }

    #[test]
    fn reduce_plus_diag() {
        let ctx = Context::new();
        let mut a = Matrix::new(TypeCode::Int32, 4, 4);
        for (k, v) in [1, 2, 3, 4].into_iter().enumerate() {
            a.set_element(k, k, Scalar::Int32(v)).unwrap();
        }
        let monoid = plus_monoid();
        let mut out = Scalar::Int32(0);
        reduce_scalar(&ctx, None, &mut out, &monoid, &mut a).unwrap();
        assert_eq!(out, Scalar::Int32(10));
    }

    #[test]
    fn empty_matrix_reduces_to_identity() {
        let ctx = Context::new();
        let mut a = Matrix::new(TypeCode::Int32, 3, 3);
        let monoid = plus_monoid();
        let mut out = Scalar::Int32(99);
        reduce_scalar(&ctx, None, &mut out, &monoid, &mut a).unwrap();
        assert_eq!(out, Scalar::Int32(0));
    }

    #[test]
    fn accum_is_applied_even_on_empty_matrix() {
        let ctx = Context::new();
        let mut a = Matrix::new(TypeCode::Int32, 3, 3);
        let monoid = plus_monoid();
        let accum = BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::Int32);
        let mut out = Scalar::Int32(7);
        reduce_scalar(&ctx, Some(&accum), &mut out, &monoid, &mut a).unwrap();
        assert_eq!(out, Scalar::Int32(7));
    }

    #[test]
    fn terminal_short_circuits() {
        let ctx = Context::new();
        let mut a = Matrix::new(TypeCode::UInt8, 1, 2000);
        for c in 0..2000 {
            a.set_element(0, c, Scalar::UInt8((c % 200) as u8)).unwrap();
        }
        a.set_element(0, 1500, Scalar::UInt8(255)).unwrap();
        let monoid = Monoid::new(
            BinaryOp::builtin_same_type(OpCode::Max, TypeCode::UInt8),
            Scalar::UInt8(0),
            Some(Scalar::UInt8(255)),
        )
        .unwrap();
        let mut out = Scalar::UInt8(0);
        reduce_scalar(&ctx, None, &mut out, &monoid, &mut a).unwrap();
        assert_eq!(out, Scalar::UInt8(255));
    }
}
