//! Transpose and orientation conversion via a two-phase bucket scatter: phase 1 counts entries
//! per new outer vector, phase 2 prefix-sums those counts into `p` and scatters values into
//! place.

use sparsegb_algebra::{BinaryOp, Scalar};

use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::matrix::{zombie_decode, Matrix, Orientation};
use crate::wait;

/// `C<M> = accum(C, A')`, the same `(C, M, accum, A, desc)` shape every other orchestrator takes.
/// `desc.transpose_a` selects `INP0:TRANSPOSE`, which applied to an operation that already
/// transposes cancels out — so a `desc.transpose_a` of `true` here means "don't transpose".
pub fn transpose(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    a: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    let net_transpose = !desc.transpose_a;
    let (eff_rows, eff_cols) =
        if net_transpose { (a.ncols, a.nrows) } else { (a.nrows, a.ncols) };
    if c.nrows != eff_rows || c.ncols != eff_cols {
        return Err(Error::DimensionMismatch);
    }

    wait::wait(a)?;
    let t = if net_transpose {
        transpose_oriented(ctx, a, c.orientation)?
    } else {
        reorient(ctx, a, c.orientation)?
    };

    let mask_aligned = match mask {
        Some(m) => Some(reorient(ctx, m, c.orientation)?),
        None => None,
    };
    let mask_ref = mask_aligned.as_ref().map(|m| (m, desc.mask_kind, desc.mask_complement));
    crate::mask::accum_mask(ctx, c, mask_ref, accum, t, desc.output_replace)
}

pub fn transpose_oriented(
    ctx: &Context,
    a: &mut Matrix,
    out_orientation: Orientation,
) -> Result<Matrix> {
    wait::wait(a)?;
    Ok(bucket_scatter(a, out_orientation, true))
}

/// Rebuilds `a`'s logical matrix in the other storage orientation (same `nrows`/`ncols`, same
/// values) — used internally by `mxm` to align `A`'s columns and `B`'s rows before the kernels.
pub(crate) fn reorient(ctx: &Context, a: &mut Matrix, out_orientation: Orientation) -> Result<Matrix> {
    wait::wait(a)?;
    if a.orientation == out_orientation {
        return Ok(a.clone());
    }
    Ok(bucket_scatter(a, out_orientation, false))
}

fn bucket_scatter(a: &Matrix, out_orientation: Orientation, swap_dims: bool) -> Matrix {
    let (out_nrows, out_ncols) = if swap_dims { (a.ncols, a.nrows) } else { (a.nrows, a.ncols) };
    let out_outer_dim = match out_orientation {
        Orientation::ByColumn => out_ncols,
        Orientation::ByRow => out_nrows,
    };

    // Phase 1: count entries per new outer vector.
    let mut counts = vec![0usize; out_outer_dim];
    let mut positions = Vec::with_capacity(a.i.len());
    for vi in 0..a.nvec() {
        let old_outer = if a.hyper { a.h[vi] } else { vi };
        let start = a.p[vi];
        let end = a.p[vi + 1];
        for k in start..end {
            let old_inner = zombie_decode(a.i[k]);
            let (row, col) = match a.orientation {
                Orientation::ByColumn => (old_inner, old_outer),
                Orientation::ByRow => (old_outer, old_inner),
            };
            let (row, col) = if swap_dims { (col, row) } else { (row, col) };
            let (new_outer, new_inner) = match out_orientation {
                Orientation::ByColumn => (col, row),
                Orientation::ByRow => (row, col),
            };
            counts[new_outer] += 1;
            positions.push((new_outer, new_inner, k));
        }
    }

    // Phase 2: prefix sum into `p`, then scatter (with a defensive per-vector sort — the
    // counting-sort ordering trick only falls out "for free" for some orientation/swap
    // combinations, and getting it wrong silently would violate the sorted-index invariant).
    let mut p = Vec::with_capacity(out_outer_dim + 1);
    p.push(0);
    let mut running = 0;
    for c in &counts {
        running += c;
        p.push(running);
    }
    let mut cursor = p.clone();
    let nnz = a.i.len();
    let mut i = vec![0i64; nnz];
    let mut x: Vec<Scalar> = vec![Scalar::Bool(false); nnz];
    for (new_outer, new_inner, old_k) in positions {
        let slot = cursor[new_outer];
        i[slot] = new_inner as i64;
        x[slot] = a.x[old_k].clone();
        cursor[new_outer] += 1;
    }
    for vi in 0..out_outer_dim {
        let start = p[vi];
        let end = p[vi + 1];
        let mut pairs: Vec<(i64, Scalar)> =
            i[start..end].iter().cloned().zip(x[start..end].iter().cloned()).collect();
        pairs.sort_unstable_by_key(|(inner, _)| *inner);
        for (slot, (inner, value)) in pairs.into_iter().enumerate() {
            i[start + slot] = inner;
            x[start + slot] = value;
        }
    }

    Matrix {
        nrows: out_nrows,
        ncols: out_ncols,
        type_code: a.type_code,
        orientation: out_orientation,
        hyper: false,
        h: Vec::new(),
        p,
        i,
        x,
        pending: Vec::new(),
        zombies: 0,
        pending_op: a.pending_op.clone(),
        hiwater_wrap_at: a.hiwater_wrap_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsegb_algebra::TypeCode;

    fn dense(rows: &[&[f64]]) -> Matrix {
        let nrows = rows.len();
        let ncols = rows[0].len();
        let mut m = Matrix::new(TypeCode::FP64, nrows, ncols);
        for (r, row) in rows.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    m.set_element(r, c, Scalar::FP64(v)).unwrap();
                }
            }
        }
        m
    }

    #[test]
    fn transpose_is_an_involution() {
        let ctx = Context::new();
        let mut a = dense(&[&[1.0, 2.0, 0.0], &[0.0, 0.0, 3.0]]);
        let desc = Descriptor::default();
        let mut at = Matrix::new(TypeCode::FP64, a.ncols, a.nrows);
        transpose(&ctx, &mut at, None, None, &mut a, &desc).unwrap();
        let mut att = Matrix::new(TypeCode::FP64, a.nrows, a.ncols);
        transpose(&ctx, &mut att, None, None, &mut at, &desc).unwrap();
        assert_eq!(att.nrows, a.nrows);
        assert_eq!(att.ncols, a.ncols);
        for r in 0..a.nrows {
            for c in 0..a.ncols {
                assert_eq!(
                    a.extract_element(r, c).unwrap(),
                    att.clone().extract_element(r, c).unwrap()
                );
            }
        }
    }

    #[test]
    fn transpose_swaps_indices() {
        let ctx = Context::new();
        let mut a = dense(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        let desc = Descriptor::default();
        let mut at = Matrix::new(TypeCode::FP64, 2, 3);
        transpose(&ctx, &mut at, None, None, &mut a, &desc).unwrap();
        assert_eq!(at.nrows, 2);
        assert_eq!(at.ncols, 3);
        assert_eq!(at.extract_element(0, 2).unwrap(), Some(Scalar::FP64(5.0)));
        assert_eq!(at.extract_element(1, 1).unwrap(), Some(Scalar::FP64(4.0)));
    }
}
