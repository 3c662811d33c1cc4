//! Finalization: folding `pending` tuples and zombies back into sorted CSC/CSR storage. Each
//! outer vector's contribution is built independently in parallel, then assembled into the whole
//! array in one pass.

use std::collections::BTreeMap;

use sparsegb_algebra::Scalar;
use sparsegb_maybe_rayon::*;

use crate::error::Result;
use crate::matrix::{is_zombie, zombie_decode, Matrix};

/// Below this outer-dimension occupancy fraction, a matrix flips to hypersparse storage.
const HYPER_DENSITY_THRESHOLD: f64 = 1.0 / 16.0;

/// Drains `pending` and compacts `zombies`, leaving the matrix's `(h, p, i, x)` sorted and clean.
/// Idempotent: a matrix with no pending tuples and no zombies returns immediately.
pub fn wait(m: &mut Matrix) -> Result<()> {
    if m.pending.is_empty() && m.zombies == 0 {
        return Ok(());
    }

    let nvec = m.nvec();
    let mut by_outer: BTreeMap<usize, Vec<(usize, Scalar)>> = BTreeMap::new();

    // Seed with the live (non-zombie) entries, per vector. Only shared references cross into the
    // closure so it stays `Sync`-clean regardless of whether `rayon` is actually driving it.
    let hyper = m.hyper;
    let h = &m.h;
    let p = &m.p;
    let i = &m.i;
    let x = &m.x;
    let live: Vec<(usize, Vec<(usize, Scalar)>)> = (0..nvec)
        .into_par_iter()
        .map(|vi| {
            let outer = if hyper { h[vi] } else { vi };
            let start = p[vi];
            let end = p[vi + 1];
            let mut entries = Vec::with_capacity(end - start);
            for k in start..end {
                if !is_zombie(i[k]) {
                    entries.push((zombie_decode(i[k]), x[k].clone()));
                }
            }
            (outer, entries)
        })
        .collect();
    for (outer, entries) in live {
        if !entries.is_empty() {
            by_outer.entry(outer).or_default().extend(entries);
        }
    }

    // Fold the pending tuples on top, combining duplicates (including duplicates against an
    // already-live value) with the matrix's dup operator, or overwriting if none was given.
    for pending in m.pending.drain(..) {
        let slot = by_outer.entry(pending.outer).or_default();
        match slot.iter_mut().find(|(inner, _)| *inner == pending.inner) {
            Some((_, existing)) => {
                *existing = match &m.pending_op {
                    Some(op) => op.apply(existing, &pending.value),
                    None => pending.value,
                };
            }
            None => slot.push((pending.inner, pending.value)),
        }
    }

    let outer_dim = m.outer_dim();
    let used_vecs = by_outer.len();
    let hyper = outer_dim > 0 && (used_vecs as f64) < HYPER_DENSITY_THRESHOLD * (outer_dim as f64);

    let mut h = Vec::new();
    let mut p = Vec::with_capacity(if hyper { used_vecs + 1 } else { outer_dim + 1 });
    let mut i = Vec::new();
    let mut x = Vec::new();
    p.push(0);

    if hyper {
        for (outer, mut entries) in by_outer {
            entries.sort_unstable_by_key(|(inner, _)| *inner);
            h.push(outer);
            for (inner, value) in entries {
                i.push(inner as i64);
                x.push(value);
            }
            p.push(i.len());
        }
    } else {
        for outer in 0..outer_dim {
            if let Some(mut entries) = by_outer.remove(&outer) {
                entries.sort_unstable_by_key(|(inner, _)| *inner);
                for (inner, value) in entries {
                    i.push(inner as i64);
                    x.push(value);
                }
            }
            p.push(i.len());
        }
    }

    m.hyper = hyper;
    m.h = h;
    m.p = p;
    m.i = i;
    m.x = x;
    m.zombies = 0;
    Ok(())
}

/// Marks the element at `(outer, inner)` as a zombie, without triggering a full `wait`: deletion
/// only flips the sentinel bit, compaction is deferred to the next finalization.
pub(crate) fn mark_zombie(m: &mut Matrix, outer: usize, inner: usize) -> bool {
    let Some(pos) = m.outer_pos(outer) else { return false };
    let start = m.p[pos];
    let end = m.p[pos + 1];
    match m.i[start..end].binary_search(&(inner as i64)) {
        Ok(rel) => {
            let k = start + rel;
            if !is_zombie(m.i[k]) {
                m.i[k] = crate::matrix::zombie_encode(inner);
                m.zombies += 1;
            }
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsegb_algebra::{BinaryOp, OpCode, TypeCode};

    #[test]
    fn pending_tuples_merge_sorted() {
        let mut m = Matrix::new(TypeCode::Int32, 4, 4);
        m.set_element(2, 0, Scalar::Int32(1)).unwrap();
        m.set_element(0, 0, Scalar::Int32(2)).unwrap();
        m.set_element(1, 0, Scalar::Int32(3)).unwrap();
        wait(&mut m).unwrap();
        assert_eq!(m.nvals().unwrap(), 3);
        assert_eq!(m.extract_element(0, 0).unwrap(), Some(Scalar::Int32(2)));
        assert_eq!(m.extract_element(1, 0).unwrap(), Some(Scalar::Int32(3)));
        assert_eq!(m.extract_element(2, 0).unwrap(), Some(Scalar::Int32(1)));
    }

    #[test]
    fn duplicate_pending_tuples_combine_via_dup_operator() {
        let mut m = Matrix::new(TypeCode::Int32, 2, 2);
        m.pending_op = Some(BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::Int32));
        m.set_element(0, 0, Scalar::Int32(1)).unwrap();
        m.set_element(0, 0, Scalar::Int32(4)).unwrap();
        wait(&mut m).unwrap();
        assert_eq!(m.extract_element(0, 0).unwrap(), Some(Scalar::Int32(5)));
    }

    #[test]
    fn zombie_then_wait_removes_the_entry() {
        let mut m = Matrix::new(TypeCode::Bool, 2, 2);
        m.set_element(0, 0, Scalar::Bool(true)).unwrap();
        m.set_element(1, 1, Scalar::Bool(true)).unwrap();
        wait(&mut m).unwrap();
        assert!(mark_zombie(&mut m, 0, 0));
        assert_eq!(m.zombies, 1);
        wait(&mut m).unwrap();
        assert_eq!(m.nvals().unwrap(), 1);
        assert_eq!(m.extract_element(0, 0).unwrap(), None);
        assert_eq!(m.extract_element(1, 1).unwrap(), Some(Scalar::Bool(true)));
    }

    #[test]
    fn sparse_matrix_flips_to_hypersparse() {
        let mut m = Matrix::new(TypeCode::FP64, 1000, 1000);
        m.set_element(0, 0, Scalar::FP64(1.0)).unwrap();
        wait(&mut m).unwrap();
        assert!(m.is_hyper());
    }
}
