//! Masked sparse matrix multiply `C<M> = A*B` over a semiring, with three algorithm variants and
//! a cost-based planner choosing between them: a dense-scratch scatter (Gustavson), a two-pointer
//! dot product, and a `BinaryHeap`-driven k-way merge for hypersparse operands.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use sparsegb_algebra::{dispatch_binary, Scalar, Semiring};
use sparsegb_maybe_rayon::*;

use crate::context::Context;
use crate::descriptor::{AxbMethod, Descriptor, MaskKind};
use crate::error::{Error, Result};
use crate::matrix::{zombie_decode, Matrix, Orientation};
use crate::sauna::SaunaPool;
use crate::scheduler;
use crate::wait;

struct MaskView<'a> {
    m: &'a Matrix,
    kind: MaskKind,
    complement: bool,
}

impl<'a> MaskView<'a> {
    /// Evaluates the admit decision for output position `(row, col)`.
    fn admits(&self, row: usize, col: usize) -> bool {
        let raw = self.m.outer_pos(col).and_then(|pos| {
            let start = self.m.p[pos];
            let end = self.m.p[pos + 1];
            self.m.i[start..end]
                .binary_search(&(row as i64))
                .ok()
                .map(|rel| &self.m.x[start + rel])
        });
        let admitted = match raw {
            Some(value) => match self.kind {
                MaskKind::Structure => true,
                MaskKind::Value => !value.is_zero_numeric(),
            },
            None => false,
        };
        if self.complement { !admitted } else { admitted }
    }
}

/// `C<M> = accum(C, A@B)` under `semiring`.
pub fn mxm(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&sparsegb_algebra::BinaryOp>,
    semiring: &Semiring,
    a: &mut Matrix,
    b: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    if !a.type_code().castable_to(semiring.mul.x_type) || !b.type_code().castable_to(semiring.mul.y_type) {
        return Err(Error::DomainMismatch);
    }
    let inner_a = if desc.transpose_a { a.nrows } else { a.ncols };
    let inner_b = if desc.transpose_b { b.ncols } else { b.nrows };
    if inner_a != inner_b {
        return Err(Error::DimensionMismatch);
    }
    let out_rows = if desc.transpose_a { a.ncols } else { a.nrows };
    let out_cols = if desc.transpose_b { b.nrows } else { b.ncols };
    if c.nrows != out_rows || c.ncols != out_cols {
        return Err(Error::DimensionMismatch);
    }

    let b_csc = prepare_operand(ctx, b, desc.transpose_b, Orientation::ByColumn)?;
    let method = choose_method(desc, a, &b_csc);

    let mask_csc = match mask {
        Some(m) => Some(crate::transpose::reorient(ctx, m, Orientation::ByColumn)?),
        None => None,
    };
    let mask_view = mask_csc.as_ref().map(|m| MaskView { m, kind: desc.mask_kind, complement: desc.mask_complement });

    let t = match method {
        AxbMethod::Dot => {
            let a_csr = prepare_operand(ctx, a, desc.transpose_a, Orientation::ByRow)?;
            dot_mxm(ctx, &a_csr, &b_csc, semiring, mask_view.as_ref(), out_rows, out_cols)?
        }
        AxbMethod::Heap => {
            let a_csc = prepare_operand(ctx, a, desc.transpose_a, Orientation::ByColumn)?;
            heap_mxm(ctx, &a_csc, &b_csc, semiring, mask_view.as_ref(), out_rows, out_cols)?
        }
        AxbMethod::Gustavson | AxbMethod::Auto => {
            let a_csc = prepare_operand(ctx, a, desc.transpose_a, Orientation::ByColumn)?;
            let plan = scheduler::plan_for(ctx, out_cols);
            let pool = SaunaPool::new(plan.nthreads.max(1), out_rows);
            gustavson_mxm(ctx, &a_csc, &b_csc, semiring, mask_view.as_ref(), out_rows, out_cols, &pool)?
        }
    };

    crate::mask::accum_mask(ctx, c, None, accum, t, desc.output_replace)
}

fn prepare_operand(
    ctx: &Context,
    m: &mut Matrix,
    transpose: bool,
    want: Orientation,
) -> Result<Matrix> {
    if transpose {
        crate::transpose::transpose_oriented(ctx, m, want)
    } else {
        crate::transpose::reorient(ctx, m, want)
    }
}

/// Picks an algorithm when the descriptor leaves it to `Auto`: hypersparse operands favor the
/// heap merge (no O(inner) workspace to pay for), otherwise Gustavson's dense scatter wins.
/// `Dot` is only chosen explicitly, since it needs `A` pre-oriented by row.
fn choose_method(desc: &Descriptor, a: &Matrix, b: &Matrix) -> AxbMethod {
    match desc.axb_method {
        AxbMethod::Auto => {
            if a.is_hyper() && b.is_hyper() {
                AxbMethod::Heap
            } else {
                AxbMethod::Gustavson
            }
        }
        other => other,
    }
}

/// Iterates the full `0..out_cols` range (not `0..b.nvec()`) and looks up each column's position
/// via `outer_pos` so a hypersparse `b` still yields one `(j, entries)` pair per true column index,
/// matching the layout `assemble` (and `ewise::assemble`) require.
fn gustavson_mxm(
    ctx: &Context,
    a: &Matrix,
    b: &Matrix,
    semiring: &Semiring,
    mask: Option<&MaskView>,
    out_rows: usize,
    out_cols: usize,
    pool: &SaunaPool,
) -> Result<Matrix> {
    let columns: Vec<(usize, Vec<(usize, Scalar)>)> = (0..out_cols)
        .into_par_iter()
        .map(|j| -> Result<(usize, Vec<(usize, Scalar)>)> {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(bj) = b.outer_pos(j) else { return Ok((j, Vec::new())) };
            let mut sauna = pool.acquire();
            sauna.begin_vector();
            let bstart = b.p[bj];
            let bend = b.p[bj + 1];
            for bk in bstart..bend {
                let k = zombie_decode(b.i[bk]);
                let bval = &b.x[bk];
                let Some(apos) = a.outer_pos(k) else { continue };
                let astart = a.p[apos];
                let aend = a.p[apos + 1];
                for ak in astart..aend {
                    let i = zombie_decode(a.i[ak]);
                    if let Some(mv) = mask {
                        if !mv.admits(i, j) {
                            continue;
                        }
                    }
                    let prod = dispatch_binary(&semiring.mul, &a.x[ak], bval)?;
                    if sauna.is_set(i) {
                        let combined = dispatch_binary(&semiring.add.op, sauna.get(i).unwrap(), &prod)?;
                        sauna.set(i, combined);
                    } else {
                        sauna.set(i, prod);
                    }
                }
            }
            let entries: Vec<(usize, Scalar)> =
                sauna.live_entries().map(|(i, v)| (i, v.clone())).collect();
            Ok((j, entries))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(out_rows, out_cols, columns, semiring.add.op.z_type))
}

fn dot_mxm(
    ctx: &Context,
    a_csr: &Matrix,
    b_csc: &Matrix,
    semiring: &Semiring,
    mask: Option<&MaskView>,
    out_rows: usize,
    out_cols: usize,
) -> Result<Matrix> {
    let columns: Vec<(usize, Vec<(usize, Scalar)>)> = (0..out_cols)
        .into_par_iter()
        .map(|j| -> Result<(usize, Vec<(usize, Scalar)>)> {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(bj) = b_csc.outer_pos(j) else { return Ok((j, Vec::new())) };
            let bstart = b_csc.p[bj];
            let bend = b_csc.p[bj + 1];
            let mut entries = Vec::new();
            for ai in 0..a_csr.nvec() {
                let i = if a_csr.hyper { a_csr.h[ai] } else { ai };
                if let Some(mv) = mask {
                    if !mv.admits(i, j) {
                        continue;
                    }
                }
                let astart = a_csr.p[ai];
                let aend = a_csr.p[ai + 1];
                if astart == aend || bstart == bend {
                    continue;
                }
                if let Some(value) =
                    dot_product(a_csr, astart, aend, b_csc, bstart, bend, semiring)?
                {
                    entries.push((i, value));
                }
            }
            Ok((j, entries))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(out_rows, out_cols, columns, semiring.add.op.z_type))
}

fn dot_product(
    a_csr: &Matrix,
    mut astart: usize,
    aend: usize,
    b_csc: &Matrix,
    mut bstart: usize,
    bend: usize,
    semiring: &Semiring,
) -> Result<Option<Scalar>> {
    let mut acc: Option<Scalar> = None;
    while astart < aend && bstart < bend {
        let ak = zombie_decode(a_csr.i[astart]);
        let bk = zombie_decode(b_csc.i[bstart]);
        match ak.cmp(&bk) {
            Ordering::Less => astart += 1,
            Ordering::Greater => bstart += 1,
            Ordering::Equal => {
                let prod = dispatch_binary(&semiring.mul, &a_csr.x[astart], &b_csc.x[bstart])?;
                acc = Some(match acc {
                    Some(prev) => dispatch_binary(&semiring.add.op, &prev, &prod)?,
                    None => prod,
                });
                if let Some(value) = &acc {
                    if semiring.add.is_terminal(value) {
                        break;
                    }
                }
                astart += 1;
                bstart += 1;
            }
        }
    }
    Ok(acc)
}

#[derive(PartialEq)]
struct HeapEntry {
    inner: usize,
    col_slot: usize,
    value_pos: usize,
}

impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; reverse to get the smallest inner index out first.
        other.inner.cmp(&self.inner)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn heap_mxm(
    ctx: &Context,
    a: &Matrix,
    b: &Matrix,
    semiring: &Semiring,
    mask: Option<&MaskView>,
    out_rows: usize,
    out_cols: usize,
) -> Result<Matrix> {
    let columns: Vec<(usize, Vec<(usize, Scalar)>)> = (0..out_cols)
        .into_par_iter()
        .map(|j| -> Result<(usize, Vec<(usize, Scalar)>)> {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(bj) = b.outer_pos(j) else { return Ok((j, Vec::new())) };
            let bstart = b.p[bj];
            let bend = b.p[bj + 1];

            // One cursor per contributing column of `A`, paired with `B(k,j)`.
            let mut cursors: Vec<(usize, usize, Scalar)> = Vec::new(); // (pos, end, bval)
            let mut heap = BinaryHeap::new();
            for bk in bstart..bend {
                let k = zombie_decode(b.i[bk]);
                let Some(apos) = a.outer_pos(k) else { continue };
                let astart = a.p[apos];
                let aend = a.p[apos + 1];
                if astart == aend {
                    continue;
                }
                let slot = cursors.len();
                cursors.push((astart, aend, b.x[bk].clone()));
                heap.push(HeapEntry { inner: zombie_decode(a.i[astart]), col_slot: slot, value_pos: astart });
            }

            let mut merged: Vec<(usize, Scalar)> = Vec::new();
            while let Some(HeapEntry { inner, col_slot, value_pos }) = heap.pop() {
                let (_, end, bval) = &cursors[col_slot];
                let prod = dispatch_binary(&semiring.mul, &a.x[value_pos], bval)?;
                match merged.last_mut() {
                    Some((last_inner, acc)) if *last_inner == inner => {
                        *acc = dispatch_binary(&semiring.add.op, acc, &prod)?;
                    }
                    _ => merged.push((inner, prod)),
                }
                let next_pos = value_pos + 1;
                if next_pos < *end {
                    cursors[col_slot].0 = next_pos;
                    heap.push(HeapEntry {
                        inner: zombie_decode(a.i[next_pos]),
                        col_slot,
                        value_pos: next_pos,
                    });
                }
            }

            let filtered = match mask {
                Some(mv) => merged.into_iter().filter(|(i, _)| mv.admits(*i, j)).collect(),
                None => merged,
            };
            Ok((j, filtered))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(out_rows, out_cols, columns, semiring.add.op.z_type))
}

/// Shared assembly step for all three kernels: `columns` need not arrive in `j` order (parallel
/// map), so sort by `j` before laying out `p`/`i`/`x`.
fn assemble(
    out_rows: usize,
    out_cols: usize,
    mut columns: Vec<(usize, Vec<(usize, Scalar)>)>,
    type_code: sparsegb_algebra::TypeCode,
) -> Matrix {
    columns.sort_unstable_by_key(|(j, _)| *j);
    let mut p = Vec::with_capacity(out_cols + 1);
    let mut i = Vec::new();
    let mut x = Vec::new();
    p.push(0);
    for (_, entries) in columns {
        for (row, value) in entries {
            i.push(row as i64);
            x.push(value);
        }
        p.push(i.len());
    }
    Matrix {
        nrows: out_rows,
        ncols: out_cols,
        type_code,
        orientation: Orientation::ByColumn,
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

#[cfg(test)]
mod tests {
    use super::*;
    use sparsegb_algebra::{BinaryOp, Monoid, OpCode, TypeCode};

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

    fn plus_times_fp64() -> Semiring {
        let add =
            Monoid::new(BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::FP64), Scalar::FP64(0.0), None)
                .unwrap();
        let mul = BinaryOp::builtin_same_type(OpCode::Times, TypeCode::FP64);
        Semiring::new(add, mul).unwrap()
    }

    #[test]
    fn mxm_plus_times_fp64() {
        let ctx = Context::new();
        let mut a = dense(&[&[1.0, 2.0], &[0.0, 3.0]]);
        let mut b = dense(&[&[4.0, 0.0], &[0.0, 5.0]]);
        let mut c = Matrix::new(TypeCode::FP64, 2, 2);
        let sr = plus_times_fp64();
        let desc = Descriptor::default();
        mxm(&ctx, &mut c, None, None, &sr, &mut a, &mut b, &desc).unwrap();
        assert_eq!(c.extract_element(0, 0).unwrap(), Some(Scalar::FP64(4.0)));
        assert_eq!(c.extract_element(0, 1).unwrap(), Some(Scalar::FP64(10.0)));
        assert_eq!(c.extract_element(1, 0).unwrap(), None);
        assert_eq!(c.extract_element(1, 1).unwrap(), Some(Scalar::FP64(15.0)));
    }

    #[test]
    fn gustavson_and_dot_agree() {
        let ctx = Context::new();
        let mut a1 = dense(&[&[1.0, 2.0, 0.0], &[0.0, 3.0, 4.0]]);
        let mut b1 = dense(&[&[5.0, 0.0], &[0.0, 6.0], &[7.0, 8.0]]);
        let mut a2 = dense(&[&[1.0, 2.0, 0.0], &[0.0, 3.0, 4.0]]);
        let mut b2 = dense(&[&[5.0, 0.0], &[0.0, 6.0], &[7.0, 8.0]]);
        let sr = plus_times_fp64();

        let mut c1 = Matrix::new(TypeCode::FP64, 2, 2);
        let mut desc1 = Descriptor::default();
        desc1.axb_method = AxbMethod::Gustavson;
        mxm(&ctx, &mut c1, None, None, &sr, &mut a1, &mut b1, &desc1).unwrap();

        let mut c2 = Matrix::new(TypeCode::FP64, 2, 2);
        let mut desc2 = Descriptor::default();
        desc2.axb_method = AxbMethod::Dot;
        mxm(&ctx, &mut c2, None, None, &sr, &mut a2, &mut b2, &desc2).unwrap();

        for r in 0..2 {
            for c in 0..2 {
                assert_eq!(c1.extract_element(r, c).unwrap(), c2.extract_element(r, c).unwrap());
            }
        }
    }
}
