//! `select`: a two-phase filter over `A`'s entries by predicate `p(i, j, x)` — the same
//! count-then-scatter shape `transpose.rs` uses, with a predicate gate instead of a bucket remap.

use sparsegb_algebra::{ops::eval_builtin_binary, BinaryOp, OpCode, Scalar};
use sparsegb_maybe_rayon::*;

use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::matrix::{zombie_decode, Matrix, Orientation};
use crate::wait;

/// Built-in selectors: shape predicates over `(row, col)`, zero tests, and scalar comparisons.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Selector {
    Triu,
    Tril,
    Diag,
    OffDiag,
    Nonzero,
    EqZero,
    Gt,
    Lt,
    Ge,
    Le,
}

/// `thunk` is the scalar comparator argument for `Gt`/`Lt`/`Ge`/`Le`/`Diag`'s offset; unused by shape-only selectors.
fn admits(selector: Selector, row: usize, col: usize, value: &Scalar, thunk: Option<&Scalar>) -> bool {
    match selector {
        Selector::Triu => col as isize - row as isize >= thunk.map(scalar_as_isize).unwrap_or(0),
        Selector::Tril => col as isize - row as isize <= thunk.map(scalar_as_isize).unwrap_or(0),
        Selector::Diag => row as isize + thunk.map(scalar_as_isize).unwrap_or(0) == col as isize,
        Selector::OffDiag => row as isize + thunk.map(scalar_as_isize).unwrap_or(0) != col as isize,
        Selector::Nonzero => !value.is_zero_numeric(),
        Selector::EqZero => value.is_zero_numeric(),
        Selector::Gt => thunk.is_some_and(|t| compare(value, t) == std::cmp::Ordering::Greater),
        Selector::Lt => thunk.is_some_and(|t| compare(value, t) == std::cmp::Ordering::Less),
        Selector::Ge => thunk.is_some_and(|t| compare(value, t) != std::cmp::Ordering::Less),
        Selector::Le => thunk.is_some_and(|t| compare(value, t) != std::cmp::Ordering::Greater),
    }
}

fn scalar_as_isize(s: &Scalar) -> isize {
    match s {
        Scalar::Int32(v) => *v as isize,
        Scalar::Int64(v) => *v as isize,
        Scalar::UInt32(v) => *v as isize,
        Scalar::UInt64(v) => *v as isize,
        _ => 0,
    }
}

fn compare(a: &Scalar, b: &Scalar) -> std::cmp::Ordering {
    // Built-in selectors only ever compare same-typed scalars (the orchestrator entry check below
    // enforces this), so routing through the generic `Lt`/`Gt` evaluator is exact.
    let is_lt = matches!(eval_builtin_binary(OpCode::Lt, a, b), Scalar::Bool(true));
    let is_gt = matches!(eval_builtin_binary(OpCode::Gt, a, b), Scalar::Bool(true));
    if is_lt {
        std::cmp::Ordering::Less
    } else if is_gt {
        std::cmp::Ordering::Greater
    } else {
        std::cmp::Ordering::Equal
    }
}

pub fn select(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    selector: Selector,
    a: &mut Matrix,
    thunk: Option<&Scalar>,
    desc: &Descriptor,
) -> Result<()> {
    if c.nrows != a.nrows || c.ncols != a.ncols {
        return Err(Error::DimensionMismatch);
    }
    wait::wait(a)?;
    let a_aligned = crate::transpose::reorient(ctx, a, c.orientation)?;

    let outer_dim = match c.orientation {
        Orientation::ByColumn => c.ncols,
        Orientation::ByRow => c.nrows,
    };

    let columns: Vec<(usize, Vec<(usize, Scalar)>)> = (0..outer_dim)
        .into_par_iter()
        .map(|outer| {
            let Some(pos) = a_aligned.outer_pos(outer) else { return (outer, Vec::new()) };
            let start = a_aligned.p[pos];
            let end = a_aligned.p[pos + 1];
            let mut kept = Vec::new();
            for k in start..end {
                let inner = zombie_decode(a_aligned.i[k]);
                let (row, col) = match c.orientation {
                    Orientation::ByColumn => (inner, outer),
                    Orientation::ByRow => (outer, inner),
                };
                if admits(selector, row, col, &a_aligned.x[k], thunk) {
                    kept.push((inner, a_aligned.x[k].clone()));
                }
            }
            (outer, kept)
        })
        .collect();

    let t = crate::ewise::assemble(c.nrows, c.ncols, c.orientation, c.type_code, columns);
    let mask_aligned = match mask {
        Some(m) => Some(crate::transpose::reorient(ctx, m, c.orientation)?),
        None => None,
    };
    let mask_ref = mask_aligned.as_ref().map(|m| (m, desc.mask_kind, desc.mask_complement));
    crate::mask::accum_mask(ctx, c, mask_ref, accum, t, desc.output_replace)
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
            for (col, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    m.set_element(r, col, Scalar::FP64(v)).unwrap();
                }
            }
        }
        m
    }

    #[test]
    fn select_triu() {
        let ctx = Context::new();
        let mut a = dense(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[7.0, 8.0, 9.0]]);
        let mut c = Matrix::new(TypeCode::FP64, 3, 3);
        let desc = Descriptor::default();
        select(&ctx, &mut c, None, None, Selector::Triu, &mut a, Some(&Scalar::Int32(0)), &desc).unwrap();
        assert_eq!(c.extract_element(0, 0).unwrap(), Some(Scalar::FP64(1.0)));
        assert_eq!(c.extract_element(1, 0).unwrap(), None);
        assert_eq!(c.extract_element(2, 2).unwrap(), Some(Scalar::FP64(9.0)));
    }
}
