#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::return_self_not_must_use)]

//! A sparse-matrix GraphBLAS engine: semirings, masks, accumulation, and in-place output
//! replacement, over a hypersparse CSC/CSR store with zombies and pending tuples.
//!
//! Each entry point waits its input operands to a materialized state before dispatching, so
//! pending tuples and zombies stay private to the implementation and callers never observe
//! either.

use log::debug;

mod apply;
mod context;
mod descriptor;
mod error;
mod ewise;
mod mask;
mod matrix;
mod mxm;
mod reduce;
mod sauna;
mod scheduler;
mod select;
mod transpose;
mod wait;

pub use context::Context;
pub use descriptor::{AxbMethod, Descriptor, MaskKind};
pub use error::{Error, Result};
pub use matrix::{Matrix, Orientation};
pub use select::Selector;

pub use sparsegb_algebra::{BinaryOp, Monoid, OpCode, Scalar, Semiring, TypeCode, UnaryOp, UnaryOpCode};

/// Creates an empty matrix of the given type and shape.
pub fn matrix_new(type_code: TypeCode, nrows: usize, ncols: usize) -> Matrix {
    Matrix::new(type_code, nrows, ncols)
}

/// Queues a single entry for the next `wait`.
pub fn set_element(m: &mut Matrix, row: usize, col: usize, value: Scalar) -> Result<()> {
    m.set_element(row, col, value)
}

/// Reads a single entry, forcing a `wait` first if needed.
pub fn extract_element(m: &mut Matrix, row: usize, col: usize) -> Result<Option<Scalar>> {
    m.extract_element(row, col)
}

/// Forces resolution of pending tuples and zombies.
pub fn wait(m: &mut Matrix) -> Result<()> {
    wait::wait(m)
}

/// `C<M> = accum(C, A@B)` over `semiring`.
pub fn mxm(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    semiring: &Semiring,
    a: &mut Matrix,
    b: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    debug!("mxm: {}x{} @ {}x{}", a.nrows(), a.ncols(), b.nrows(), b.ncols());
    mxm::mxm(ctx, c, mask, accum, semiring, a, b, desc)
}

/// Set-union element-wise combine: `C<M> = accum(C, A op B)`.
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
    ewise::ewise_add(ctx, c, mask, accum, op, a, b, desc)
}

/// Set-intersection element-wise combine: `C<M> = accum(C, A op B)`.
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
    ewise::ewise_mult(ctx, c, mask, accum, op, a, b, desc)
}

/// Parallel monoid reduction to a scalar, with terminal short-circuit.
pub fn reduce_scalar(
    ctx: &Context,
    accum: Option<&BinaryOp>,
    c_out: &mut Scalar,
    monoid: &Monoid,
    a: &mut Matrix,
) -> Result<()> {
    reduce::reduce_scalar(ctx, accum, c_out, monoid, a)
}

/// `C<M> = accum(C, unary(A))`.
pub fn apply(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    unary: &UnaryOp,
    a: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    apply::apply(ctx, c, mask, accum, unary, a, desc)
}

/// `C<M> = accum(C, select(A))` under a built-in predicate.
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
    select::select(ctx, c, mask, accum, selector, a, thunk, desc)
}

/// `C<M> = accum(C, A^T)`, materializing the permuted store into `c`.
pub fn transpose(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    a: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    transpose::transpose(ctx, c, mask, accum, a, desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_round_trips_a_value() {
        let mut m = matrix_new(TypeCode::FP64, 2, 2);
        set_element(&mut m, 0, 1, Scalar::FP64(4.5)).unwrap();
        assert_eq!(extract_element(&mut m, 0, 1).unwrap(), Some(Scalar::FP64(4.5)));
        assert_eq!(extract_element(&mut m, 1, 1).unwrap(), None);
    }

    #[test]
    fn public_transpose_swaps_a_rectangular_shape() {
        let ctx = Context::new();
        let mut m = matrix_new(TypeCode::Int32, 2, 3);
        set_element(&mut m, 0, 2, Scalar::Int32(7)).unwrap();
        let mut t = matrix_new(TypeCode::Int32, 3, 2);
        let desc = Descriptor::default();
        transpose(&ctx, &mut t, None, None, &mut m, &desc).unwrap();
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
    }
}
