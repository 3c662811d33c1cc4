//! Element-wise set-union (`ewise_add`) and set-intersection (`ewise_mult`), both built on the
//! same two-cursor merge: the difference is only what happens when one side lacks an entry —
//! union keeps it unchanged, intersection drops it.

use std::cmp::Ordering;

use sparsegb_algebra::{dispatch_binary, BinaryOp, Scalar};
use sparsegb_maybe_rayon::*;

use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::matrix::{zombie_decode, Matrix, Orientation};

enum Variant {
    Union,
    Intersection,
}

pub fn ewise_add(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    op: &BinaryOp,
    a: &mut Matrix,
    b: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    ewise(ctx, c, mask, accum, op, a, b, desc, Variant::Union)
}

pub fn ewise_mult(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    op: &BinaryOp,
    a: &mut Matrix,
    b: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    ewise(ctx, c, mask, accum, op, a, b, desc, Variant::Intersection)
}

fn ewise(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    op: &BinaryOp,
    a: &mut Matrix,
    b: &mut Matrix,
    desc: &Descriptor,
    variant: Variant,
) -> Result<()> {
    if !a.type_code().castable_to(op.x_type) || !b.type_code().castable_to(op.y_type) {
        return Err(Error::DomainMismatch);
    }
    let (eff_a_rows, eff_a_cols) =
        if desc.transpose_a { (a.ncols, a.nrows) } else { (a.nrows, a.ncols) };
    let (eff_b_rows, eff_b_cols) =
        if desc.transpose_b { (b.ncols, b.nrows) } else { (b.nrows, b.ncols) };
    if eff_a_rows != eff_b_rows || eff_a_cols != eff_b_cols {
        return Err(Error::DimensionMismatch);
    }
    if c.nrows != eff_a_rows || c.ncols != eff_a_cols {
        return Err(Error::DimensionMismatch);
    }

    let a_aligned = prepare(ctx, a, desc.transpose_a, c.orientation)?;
    let b_aligned = prepare(ctx, b, desc.transpose_b, c.orientation)?;
    let outer_dim = match c.orientation {
        Orientation::ByColumn => c.ncols,
        Orientation::ByRow => c.nrows,
    };

    let columns: Vec<(usize, Vec<(usize, Scalar)>)> = (0..outer_dim)
        .into_par_iter()
        .map(|outer| -> Result<(usize, Vec<(usize, Scalar)>)> {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let a_entries = vector_entries(&a_aligned, outer);
            let b_entries = vector_entries(&b_aligned, outer);
            Ok((outer, merge(&a_entries, &b_entries, op, &variant)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let t = assemble(c.nrows, c.ncols, c.orientation, c.type_code, columns);
    let mask_aligned = match mask {
        Some(m) => Some(crate::transpose::reorient(ctx, m, c.orientation)?),
        None => None,
    };
    let mask_ref = mask_aligned.as_ref().map(|m| (m, desc.mask_kind, desc.mask_complement));
    crate::mask::accum_mask(ctx, c, mask_ref, accum, t, desc.output_replace)
}

fn prepare(ctx: &Context, m: &mut Matrix, transpose: bool, want: Orientation) -> Result<Matrix> {
    if transpose {
        crate::transpose::transpose_oriented(ctx, m, want)
    } else {
        crate::transpose::reorient(ctx, m, want)
    }
}

fn vector_entries(m: &Matrix, outer: usize) -> Vec<(usize, Scalar)> {
    match m.outer_pos(outer) {
        Some(pos) => {
            let start = m.p[pos];
            let end = m.p[pos + 1];
            m.i[start..end]
                .iter()
                .zip(m.x[start..end].iter())
                .map(|(&idx, v)| (zombie_decode(idx), v.clone()))
                .collect()
        }
        None => Vec::new(),
    }
}

/// Two-cursor walk over sorted `(inner, value)` slices. Ties favor the left
/// operand when the op needs an argument order.
fn merge(
    a: &[(usize, Scalar)],
    b: &[(usize, Scalar)],
    op: &BinaryOp,
    variant: &Variant,
) -> Result<Vec<(usize, Scalar)>> {
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut ai, mut bi) = (0, 0);
    while ai < a.len() && bi < b.len() {
        match a[ai].0.cmp(&b[bi].0) {
            Ordering::Less => {
                if let Variant::Union = variant {
                    out.push(a[ai].clone());
                }
                ai += 1;
            }
            Ordering::Greater => {
                if let Variant::Union = variant {
                    out.push(b[bi].clone());
                }
                bi += 1;
            }
            Ordering::Equal => {
                let value = dispatch_binary(op, &a[ai].1, &b[bi].1)?;
                out.push((a[ai].0, value));
                ai += 1;
                bi += 1;
            }
        }
    }
    if let Variant::Union = variant {
        out.extend_from_slice(&a[ai..]);
        out.extend_from_slice(&b[bi..]);
    }
    Ok(out)
}

pub(crate) fn assemble(
    nrows: usize,
    ncols: usize,
    orientation: Orientation,
    type_code: sparsegb_algebra::TypeCode,
    mut columns: Vec<(usize, Vec<(usize, Scalar)>)>,
) -> Matrix {
    columns.sort_unstable_by_key(|(outer, _)| *outer);
    let mut p = Vec::with_capacity(columns.len() + 1);
    let mut i = Vec::new();
    let mut x = Vec::new();
    p.push(0);
    for (_, entries) in columns {
        for (inner, value) in entries {
            i.push(inner as i64);
            x.push(value);
        }
        p.push(i.len());
    }
    Matrix {
        nrows,
        ncols,
        type_code,
        orientation,
        hyper: false,
        h: Vec::new(),
        p,
        i,
        x,
        pending: Vec::new(),
        zombies: 0,
        pending_op: None,
        hiwater_wrap_at: u64::MAX - 1_000_000,
    }
}
