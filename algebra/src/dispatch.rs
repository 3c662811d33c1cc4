//! The switch factory: given an operator and the runtime types of its operands, pick a
//! specialized kernel keyed by `(opcode, type_code)` if one exists and no typecast is needed,
//! otherwise fall back to the generic, always-correct evaluator in `ops.rs`.
//!
//! A type picks its own best specialized representative, with a blanket default for everything
//! else.

use anyhow::Result;

use crate::ops::{eval_builtin_binary, eval_builtin_unary, OpCode, OpKind, UnaryOpCode};
use crate::types::{Scalar, TypeCode};
use crate::{BinaryOp, UnaryOp};

/// Attempts the specialized worker for `(opcode, type)`. Returns `None` when the combination is
/// outside the hand-tuned table below, asking the caller to fall back to the generic path. Both
/// paths are required to agree; this table exists purely to let common combinations skip the
/// generic evaluator's extra branching and the mixed-width float detour.
fn specialized_binary(op: OpCode, t: TypeCode, x: &Scalar, y: &Scalar) -> Option<Scalar> {
    use OpCode::*;
    use Scalar::*;
    use TypeCode::*;
    match (op, t) {
        (Plus, Int32) => match (x, y) {
            (Int32(a), Int32(b)) => Some(Int32(a.wrapping_add(*b))),
            _ => None,
        },
        (Plus, Int64) => match (x, y) {
            (Int64(a), Int64(b)) => Some(Int64(a.wrapping_add(*b))),
            _ => None,
        },
        (Plus, FP32) => match (x, y) {
            (FP32(a), FP32(b)) => Some(FP32(a + b)),
            _ => None,
        },
        (Plus, FP64) => match (x, y) {
            (FP64(a), FP64(b)) => Some(FP64(a + b)),
            _ => None,
        },
        (Times, Int32) => match (x, y) {
            (Int32(a), Int32(b)) => Some(Int32(a.wrapping_mul(*b))),
            _ => None,
        },
        (Times, FP32) => match (x, y) {
            (FP32(a), FP32(b)) => Some(FP32(a * b)),
            _ => None,
        },
        (Times, FP64) => match (x, y) {
            (FP64(a), FP64(b)) => Some(FP64(a * b)),
            _ => None,
        },
        (Min, Int32) => match (x, y) {
            (Int32(a), Int32(b)) => Some(Int32(*a.min(b))),
            _ => None,
        },
        (Min, FP64) => match (x, y) {
            (FP64(a), FP64(b)) => Some(FP64(a.min(*b))),
            _ => None,
        },
        (Max, UInt8) => match (x, y) {
            (UInt8(a), UInt8(b)) => Some(UInt8(*a.max(b))),
            _ => None,
        },
        (Max, FP64) => match (x, y) {
            (FP64(a), FP64(b)) => Some(FP64(a.max(*b))),
            _ => None,
        },
        (Land, Bool) => match (x, y) {
            (Bool(a), Bool(b)) => Some(Bool(*a && *b)),
            _ => None,
        },
        (Lor, Bool) => match (x, y) {
            (Bool(a), Bool(b)) => Some(Bool(*a || *b)),
            _ => None,
        },
        _ => None,
    }
}

fn specialized_unary(op: UnaryOpCode, t: TypeCode, x: &Scalar) -> Option<Scalar> {
    use Scalar::*;
    use TypeCode::*;
    use UnaryOpCode::*;
    match (op, t) {
        (AdditiveInverse, Int32) => match x {
            Int32(v) => Some(Int32(v.wrapping_neg())),
            _ => None,
        },
        (AdditiveInverse, FP64) => match x {
            FP64(v) => Some(FP64(-v)),
            _ => None,
        },
        (Identity, _) => Some(x.clone()),
        _ => None,
    }
}

/// Dispatches a binary operator over `x`/`y`: try the specialized worker when the operand types
/// already match the operator's declared types, else (mismatched types, user-defined opcode, or
/// no specialized entry) take the generic path, which casts as required.
pub fn dispatch_binary(op: &BinaryOp, x: &Scalar, y: &Scalar) -> Result<Scalar> {
    if x.type_code() == op.x_type && y.type_code() == op.y_type {
        if let OpKind::Builtin(code) = &op.kind {
            if let Some(z) = specialized_binary(*code, op.x_type, x, y) {
                return Ok(z);
            }
            return Ok(eval_builtin_binary(*code, x, y));
        }
        return Ok(op.apply(x, y));
    }
    // Rule 4 of §4.2: any typecast requirement forces the generic path unconditionally.
    let xc = x.cast_to(op.x_type)?;
    let yc = y.cast_to(op.y_type)?;
    Ok(op.apply(&xc, &yc))
}

/// Dispatches a unary operator over `x`, the unary analogue of [`dispatch_binary`].
pub fn dispatch_unary(op: &UnaryOp, x: &Scalar) -> Result<Scalar> {
    if x.type_code() == op.x_type {
        if let OpKind::Builtin(code) = &op.kind {
            if let Some(z) = specialized_unary(*code, op.x_type, x) {
                return Ok(z);
            }
            return Ok(eval_builtin_unary(*code, x));
        }
        return Ok(op.apply(x));
    }
    let xc = x.cast_to(op.x_type)?;
    Ok(op.apply(&xc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpCode;

    #[test]
    fn specialized_path_agrees_with_generic_path() {
        let op = BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::Int32);
        let z = dispatch_binary(&op, &Scalar::Int32(2), &Scalar::Int32(5)).unwrap();
        assert_eq!(z, Scalar::Int32(7));
    }

    #[test]
    fn typecast_forces_generic_path() {
        let op = BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::FP64);
        // `x` is Int32 but the op wants FP64: must cast, must still be correct.
        let z = dispatch_binary(&op, &Scalar::Int32(2), &Scalar::FP64(5.0)).unwrap();
        assert_eq!(z, Scalar::FP64(7.0));
    }
}
