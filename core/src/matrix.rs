//! The sparse matrix data model: a hypersparse-capable CSC/CSR store with deferred mutation
//! (pending tuples) and deferred deletion (zombies).
//!
//! The arrays themselves are plain owning `Vec`s rather than a raw buffer, since `Scalar` values
//! carry arbitrary payload and aren't `Copy`.

use sparsegb_algebra::{Scalar, TypeCode};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Orientation {
    ByColumn,
    ByRow,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::ByColumn
    }
}

/// An unsorted `(outer, inner, value)` tuple awaiting merge into the sorted representation.
#[derive(Clone, Debug)]
pub(crate) struct PendingTuple {
    pub outer: usize,
    pub inner: usize,
    pub value: Scalar,
}

/// Encodes a live inner index as the zombie sentinel: bitwise complement, always negative for a
/// non-negative `idx`.
pub(crate) fn zombie_encode(idx: usize) -> i64 {
    !(idx as i64)
}

pub(crate) fn is_zombie(stored: i64) -> bool {
    stored < 0
}

pub(crate) fn zombie_decode(stored: i64) -> usize {
    if stored < 0 {
        !stored as usize
    } else {
        sparsegb_util::assume(stored >= 0);
        stored as usize
    }
}

#[derive(Clone, Debug)]
pub struct Matrix {
    pub(crate) nrows: usize,
    pub(crate) ncols: usize,
    pub(crate) type_code: TypeCode,
    pub(crate) orientation: Orientation,
    pub(crate) hyper: bool,
    /// Present iff `hyper`; strictly sorted outer indices.
    pub(crate) h: Vec<usize>,
    /// Length `nvec + 1`.
    pub(crate) p: Vec<usize>,
    /// Inner indices, zombie-encoded where deleted.
    pub(crate) i: Vec<i64>,
    pub(crate) x: Vec<Scalar>,
    pub(crate) pending: Vec<PendingTuple>,
    pub(crate) zombies: usize,
    /// Combines duplicate pending tuples at the same position; `None` means "last write wins".
    pub(crate) pending_op: Option<sparsegb_algebra::BinaryOp>,
    /// Threshold above which the hi-watermark counter in a borrowed `Sauna` must be reset,
    /// stored per-matrix only so tests can shrink it without touching `sauna.rs`.
    pub(crate) hiwater_wrap_at: u64,
}

impl Matrix {
    /// `matrix_new`: an empty matrix, orientation defaults to by-column.
    pub fn new(type_code: TypeCode, nrows: usize, ncols: usize) -> Self {
        Self::new_with_orientation(type_code, nrows, ncols, Orientation::ByColumn)
    }

    pub fn new_with_orientation(
        type_code: TypeCode,
        nrows: usize,
        ncols: usize,
        orientation: Orientation,
    ) -> Self {
        let nvec = Self::outer_dim_for(orientation, nrows, ncols);
        Matrix {
            nrows,
            ncols,
            type_code,
            orientation,
            hyper: false,
            h: Vec::new(),
            p: vec![0; nvec + 1],
            i: Vec::new(),
            x: Vec::new(),
            pending: Vec::new(),
            zombies: 0,
            pending_op: None,
            hiwater_wrap_at: u64::MAX - 1_000_000,
        }
    }

    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    pub const fn type_code(&self) -> TypeCode {
        self.type_code
    }

    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub const fn is_hyper(&self) -> bool {
        self.hyper
    }

    fn outer_dim_for(orientation: Orientation, nrows: usize, ncols: usize) -> usize {
        match orientation {
            Orientation::ByColumn => ncols,
            Orientation::ByRow => nrows,
        }
    }

    pub(crate) fn outer_dim(&self) -> usize {
        Self::outer_dim_for(self.orientation, self.nrows, self.ncols)
    }

    pub(crate) fn inner_dim(&self) -> usize {
        match self.orientation {
            Orientation::ByColumn => self.nrows,
            Orientation::ByRow => self.ncols,
        }
    }

    pub(crate) fn nvec(&self) -> usize {
        if self.hyper {
            self.h.len()
        } else {
            self.outer_dim()
        }
    }

    /// The number of structural, non-pending, non-zombie entries (clean `nvals`, without
    /// triggering `wait`). Use `nvals` for the always-accurate count.
    pub(crate) fn clean_nvals(&self) -> usize {
        self.i.len() - self.zombies
    }

    /// Drains `pending`/`zombies` first — `wait` is triggered lazily at the start of any op that
    /// requires a clean matrix.
    pub fn nvals(&mut self) -> Result<usize> {
        crate::wait::wait(self)?;
        Ok(self.i.len())
    }

    /// Maps an outer index to its position in `p`/`h`, or `None` if that vector is absent
    /// (only possible when `hyper`).
    pub(crate) fn outer_pos(&self, outer: usize) -> Option<usize> {
        if self.hyper {
            self.h.binary_search(&outer).ok()
        } else {
            Some(outer)
        }
    }

    /// Queues a pending tuple rather than mutating `(p,i,x)` in place, so a burst of calls doesn't
    /// re-sort the whole vector on every single one.
    pub fn set_element(&mut self, row: usize, col: usize, value: Scalar) -> Result<()> {
        if row >= self.nrows || col >= self.ncols {
            return Err(Error::DimensionMismatch);
        }
        let value = value.cast_to(self.type_code).map_err(|_| Error::DomainMismatch)?;
        let (outer, inner) = match self.orientation {
            Orientation::ByColumn => (col, row),
            Orientation::ByRow => (row, col),
        };
        self.pending.push(PendingTuple { outer, inner, value });
        Ok(())
    }

    /// `extract_element`: triggers `wait` if the matrix is not already clean, then
    /// binary-searches the sorted vector.
    pub fn extract_element(&mut self, row: usize, col: usize) -> Result<Option<Scalar>> {
        if row >= self.nrows || col >= self.ncols {
            return Err(Error::DimensionMismatch);
        }
        crate::wait::wait(self)?;
        let (outer, inner) = match self.orientation {
            Orientation::ByColumn => (col, row),
            Orientation::ByRow => (row, col),
        };
        let Some(pos) = self.outer_pos(outer) else {
            return Ok(None);
        };
        let start = self.p[pos];
        let end = self.p[pos + 1];
        let slice = &self.i[start..end];
        match slice.binary_search(&(inner as i64)) {
            Ok(rel) => Ok(Some(self.x[start + rel].clone())),
            Err(_) => Ok(None),
        }
    }

    /// `matrix_free` is just `Drop`, which `Vec`/`Scalar` already give us for free —
    /// there is no raw allocation to release by hand in the Rust rendition.
    pub fn dup(&mut self) -> Result<Matrix> {
        crate::wait::wait(self)?;
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsegb_algebra::Scalar;

    #[test]
    fn new_matrix_is_empty() {
        let mut m = Matrix::new(TypeCode::FP64, 3, 3);
        assert_eq!(m.nvals().unwrap(), 0);
    }

    #[test]
    fn set_then_extract_roundtrips_after_implicit_wait() {
        let mut m = Matrix::new(TypeCode::FP64, 3, 3);
        m.set_element(1, 2, Scalar::FP64(9.0)).unwrap();
        let v = m.extract_element(1, 2).unwrap();
        assert_eq!(v, Some(Scalar::FP64(9.0)));
        assert_eq!(m.extract_element(0, 0).unwrap(), None);
    }

    #[test]
    fn set_element_casts_into_the_matrix_type() {
        let mut m = Matrix::new(TypeCode::FP64, 1, 1);
        m.set_element(0, 0, Scalar::Int32(3)).unwrap();
        assert_eq!(m.extract_element(0, 0).unwrap(), Some(Scalar::FP64(3.0)));
    }

    #[test]
    fn out_of_bounds_is_dimension_mismatch() {
        let mut m = Matrix::new(TypeCode::Bool, 2, 2);
        assert_eq!(m.set_element(5, 0, Scalar::Bool(true)).unwrap_err(), Error::DimensionMismatch);
    }
}
