//! Masked accumulation: folding a freshly computed `T` into `C`, a sorted linear merge keyed by
//! outer vector, the same shape finalization itself uses.

use std::collections::BTreeMap;

use sparsegb_algebra::{dispatch_binary, BinaryOp, Scalar};

use crate::context::Context;
use crate::descriptor::MaskKind;
use crate::error::Result;
use crate::matrix::{zombie_decode, Matrix};

const HYPER_DENSITY_THRESHOLD: f64 = 1.0 / 16.0;

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

fn mask_admits(mask: Option<(&Matrix, MaskKind, bool)>, outer: usize, inner: usize) -> bool {
    let Some((m, kind, complement)) = mask else { return true };
    let raw = m
        .outer_pos(outer)
        .and_then(|pos| {
            let start = m.p[pos];
            let end = m.p[pos + 1];
            m.i[start..end].binary_search(&(inner as i64)).ok().map(|rel| &m.x[start + rel])
        })
        .is_some_and(|v| match kind {
            MaskKind::Structure => true,
            MaskKind::Value => !v.is_zero_numeric(),
        });
    if complement {
        !raw
    } else {
        raw
    }
}

/// `accum_mask`: `C <mask> = accum(C, T)`, with `replace` clearing the rejected
/// region of `C` first. `mask`, when given, must already be expressed in the same orientation as
/// `c` — callers (`mxm`, `ewise`, `apply`, `select`) are responsible for that alignment.
pub(crate) fn accum_mask(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<(&Matrix, MaskKind, bool)>,
    accum: Option<&BinaryOp>,
    mut t: Matrix,
    replace: bool,
) -> Result<()> {
    crate::wait::wait(c)?;
    crate::wait::wait(&mut t)?;
    if t.orientation != c.orientation {
        t = crate::transpose::reorient(ctx, &mut t, c.orientation)?;
    }

    let outer_dim = c.outer_dim();
    let mut by_outer: BTreeMap<usize, Vec<(usize, Scalar)>> = BTreeMap::new();

    for outer in 0..outer_dim {
        let c_map: BTreeMap<usize, Scalar> = vector_entries(c, outer).into_iter().collect();
        let t_map: BTreeMap<usize, Scalar> = vector_entries(&t, outer).into_iter().collect();
        let mut rows: Vec<usize> = c_map.keys().chain(t_map.keys()).copied().collect();
        rows.sort_unstable();
        rows.dedup();

        let mut out_row = Vec::new();
        for row in rows {
            if !mask_admits(mask, outer, row) {
                if !replace {
                    if let Some(v) = c_map.get(&row) {
                        out_row.push((row, v.clone()));
                    }
                }
                continue;
            }
            match (c_map.get(&row), t_map.get(&row)) {
                (Some(cv), Some(tv)) => {
                    let v = match accum {
                        Some(op) => dispatch_binary(op, cv, tv)?,
                        None => tv.clone(),
                    };
                    out_row.push((row, v));
                }
                (None, Some(tv)) => out_row.push((row, tv.clone())),
                (Some(cv), None) => out_row.push((row, cv.clone())),
                (None, None) => unreachable!("row only collected when present in one map"),
            }
        }
        if !out_row.is_empty() {
            by_outer.insert(outer, out_row);
        }
    }

    rebuild_from_outer_map(c, by_outer, outer_dim);
    Ok(())
}

fn rebuild_from_outer_map(
    c: &mut Matrix,
    by_outer: BTreeMap<usize, Vec<(usize, Scalar)>>,
    outer_dim: usize,
) {
    let used_vecs = by_outer.len();
    let hyper = outer_dim > 0 && (used_vecs as f64) < HYPER_DENSITY_THRESHOLD * (outer_dim as f64);

    let mut h = Vec::new();
    let mut p = Vec::new();
    let mut i = Vec::new();
    let mut x = Vec::new();
    p.push(0);

    if hyper {
        for (outer, entries) in by_outer {
            h.push(outer);
            for (inner, value) in entries {
                i.push(inner as i64);
                x.push(value);
            }
            p.push(i.len());
        }
    } else {
        let mut by_outer = by_outer;
        for outer in 0..outer_dim {
            if let Some(entries) = by_outer.remove(&outer) {
                for (inner, value) in entries {
                    i.push(inner as i64);
                    x.push(value);
                }
            }
            p.push(i.len());
        }
    }

    c.hyper = hyper;
    c.h = h;
    c.p = p;
    c.i = i;
    c.x = x;
    c.zombies = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsegb_algebra::{OpCode, TypeCode};

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
    fn ewise_add_then_accum_under_mask() {
        let ctx = Context::new();
        let mut c = dense(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let t = dense(&[&[0.0, 2.0], &[3.0, 4.0]]);
        let accum = BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::FP64);
        accum_mask(&ctx, &mut c, None, Some(&accum), t, false).unwrap();
        assert_eq!(c.extract_element(0, 0).unwrap(), Some(Scalar::FP64(1.0)));
        assert_eq!(c.extract_element(0, 1).unwrap(), Some(Scalar::FP64(2.0)));
        assert_eq!(c.extract_element(1, 0).unwrap(), Some(Scalar::FP64(3.0)));
        assert_eq!(c.extract_element(1, 1).unwrap(), Some(Scalar::FP64(5.0)));
    }

    #[test]
    fn no_accum_means_t_overwrites_admitted_positions() {
        let ctx = Context::new();
        let mut c = dense(&[&[9.0, 0.0]]);
        let t = dense(&[&[0.0, 2.0]]);
        accum_mask(&ctx, &mut c, None, None, t, false).unwrap();
        assert_eq!(c.extract_element(0, 0).unwrap(), Some(Scalar::FP64(9.0)));
        assert_eq!(c.extract_element(0, 1).unwrap(), Some(Scalar::FP64(2.0)));
    }
}
