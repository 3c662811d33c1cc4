//! `apply`: `C<M> = accum(C, unary(A))`, iterated in parallel chunks.

use sparsegb_algebra::batch::batch_apply_unary;
use sparsegb_algebra::{BinaryOp, Scalar, TypeCode, UnaryOp};
use sparsegb_maybe_rayon::*;

use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::matrix::{zombie_decode, Matrix, Orientation};
use crate::wait;

pub fn apply(
    ctx: &Context,
    c: &mut Matrix,
    mask: Option<&mut Matrix>,
    accum: Option<&BinaryOp>,
    unary: &UnaryOp,
    a: &mut Matrix,
    desc: &Descriptor,
) -> Result<()> {
    if !a.type_code().castable_to(unary.x_type) {
        return Err(Error::DomainMismatch);
    }
    let (eff_rows, eff_cols) =
        if desc.transpose_a { (a.ncols, a.nrows) } else { (a.nrows, a.ncols) };
    if c.nrows != eff_rows || c.ncols != eff_cols {
        return Err(Error::DimensionMismatch);
    }

    wait::wait(a)?;
    let a_aligned = if desc.transpose_a {
        crate::transpose::transpose_oriented(ctx, a, c.orientation)?
    } else {
        crate::transpose::reorient(ctx, a, c.orientation)?
    };

    let out_type = unary.z_type;
    let i: Vec<i64> = a_aligned.i.clone();
    let x: Vec<Scalar> = a_aligned
        .x
        .par_chunks(ctx.chunk().max(1))
        .map(|chunk| -> Result<Vec<Scalar>> {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Ok(batch_apply_unary(unary, chunk)?)
        })
        .collect::<Result<Vec<Vec<Scalar>>>>()?
        .into_iter()
        .flatten()
        .collect();

    let t = Matrix {
        nrows: c.nrows,
        ncols: c.ncols,
        type_code: out_type,
        orientation: c.orientation,
        hyper: a_aligned.hyper,
        h: a_aligned.h.clone(),
        p: a_aligned.p.clone(),
        i,
        x,
        pending: Vec::new(),
        zombies: 0,
        pending_op: None,
        hiwater_wrap_at: a_aligned.hiwater_wrap_at,
    };

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
    use sparsegb_algebra::UnaryOpCode;

    #[test]
    fn negate_every_value() {
        let ctx = Context::new();
        let mut a = Matrix::new(TypeCode::Int32, 2, 2);
        a.set_element(0, 0, Scalar::Int32(3)).unwrap();
        a.set_element(1, 1, Scalar::Int32(-5)).unwrap();
        let mut c = Matrix::new(TypeCode::Int32, 2, 2);
        let neg = UnaryOp::builtin(UnaryOpCode::AdditiveInverse, TypeCode::Int32, TypeCode::Int32);
        let desc = Descriptor::default();
        apply(&ctx, &mut c, None, None, &neg, &mut a, &desc).unwrap();
        assert_eq!(c.extract_element(0, 0).unwrap(), Some(Scalar::Int32(-3)));
        assert_eq!(c.extract_element(1, 1).unwrap(), Some(Scalar::Int32(5)));
    }
}
