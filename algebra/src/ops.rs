//! Operators and algebraic objects: `UnaryOp`, `BinaryOp`, `Monoid`, `Semiring`.

use std::fmt;
use std::sync::Arc;

use anyhow::{ensure, Result};

use crate::types::{Scalar, TypeCode};

/// Stable small integers identifying a built-in binary operator.
/// `UserDefined` is the reserved opcode that forces the generic path.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OpCode {
    Plus,
    Minus,
    Times,
    Div,
    Min,
    Max,
    First,
    Second,
    Pair,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Land,
    Lor,
    Lxor,
    UserDefined,
}

/// Stable small integers identifying a built-in unary operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOpCode {
    Identity,
    AdditiveInverse,
    Abs,
    LogicalNot,
    Square,
    One,
    UserDefined,
}

type BinaryFn = Arc<dyn Fn(&Scalar, &Scalar) -> Scalar + Send + Sync>;
type UnaryFn = Arc<dyn Fn(&Scalar) -> Scalar + Send + Sync>;

/// Either a built-in opcode (eligible for the specialized dispatch table in `dispatch.rs`) or a
/// user-supplied closure (always routed through the generic path — user-defined operators carry
/// the reserved opcode that forces it).
#[derive(Clone)]
pub enum OpKind<Code, F> {
    Builtin(Code),
    UserDefined(F),
}

impl<Code: fmt::Debug, F> fmt::Debug for OpKind<Code, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Builtin(op) => write!(f, "Builtin({op:?})"),
            OpKind::UserDefined(_) => write!(f, "UserDefined(..)"),
        }
    }
}

#[derive(Clone)]
pub struct BinaryOp {
    pub kind: OpKind<OpCode, BinaryFn>,
    pub x_type: TypeCode,
    pub y_type: TypeCode,
    pub z_type: TypeCode,
}

impl fmt::Debug for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryOp")
            .field("kind", &self.kind)
            .field("x_type", &self.x_type)
            .field("y_type", &self.y_type)
            .field("z_type", &self.z_type)
            .finish()
    }
}

impl BinaryOp {
    pub fn builtin(opcode: OpCode, x: TypeCode, y: TypeCode, z: TypeCode) -> Self {
        assert_ne!(opcode, OpCode::UserDefined, "use `BinaryOp::user_defined` instead");
        BinaryOp { kind: OpKind::Builtin(opcode), x_type: x, y_type: y, z_type: z }
    }

    /// A homogeneous builtin op (`x == y == z`), the common case for semiring `mul`/monoid `add`.
    pub fn builtin_same_type(opcode: OpCode, t: TypeCode) -> Self {
        Self::builtin(opcode, t, t, t)
    }

    pub fn user_defined(
        x: TypeCode,
        y: TypeCode,
        z: TypeCode,
        f: impl Fn(&Scalar, &Scalar) -> Scalar + Send + Sync + 'static,
    ) -> Self {
        BinaryOp { kind: OpKind::UserDefined(Arc::new(f)), x_type: x, y_type: y, z_type: z }
    }

    pub fn opcode(&self) -> OpCode {
        match &self.kind {
            OpKind::Builtin(op) => *op,
            OpKind::UserDefined(_) => OpCode::UserDefined,
        }
    }

    /// Evaluates the operator assuming `x`/`y` already match `x_type`/`y_type` exactly (no cast).
    /// This is the generic worker: always correct, not necessarily fast.
    pub fn apply(&self, x: &Scalar, y: &Scalar) -> Scalar {
        match &self.kind {
            OpKind::Builtin(op) => eval_builtin_binary(*op, x, y),
            OpKind::UserDefined(f) => f(x, y),
        }
    }
}

#[derive(Clone)]
pub struct UnaryOp {
    pub kind: OpKind<UnaryOpCode, UnaryFn>,
    pub x_type: TypeCode,
    pub z_type: TypeCode,
}

impl fmt::Debug for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryOp")
            .field("kind", &self.kind)
            .field("x_type", &self.x_type)
            .field("z_type", &self.z_type)
            .finish()
    }
}

impl UnaryOp {
    pub fn builtin(code: UnaryOpCode, x: TypeCode, z: TypeCode) -> Self {
        assert_ne!(code, UnaryOpCode::UserDefined, "use `UnaryOp::user_defined` instead");
        UnaryOp { kind: OpKind::Builtin(code), x_type: x, z_type: z }
    }

    pub fn user_defined(
        x: TypeCode,
        z: TypeCode,
        f: impl Fn(&Scalar) -> Scalar + Send + Sync + 'static,
    ) -> Self {
        UnaryOp { kind: OpKind::UserDefined(Arc::new(f)), x_type: x, z_type: z }
    }

    pub fn opcode(&self) -> UnaryOpCode {
        match &self.kind {
            OpKind::Builtin(op) => *op,
            OpKind::UserDefined(_) => UnaryOpCode::UserDefined,
        }
    }

    pub fn apply(&self, x: &Scalar) -> Scalar {
        match &self.kind {
            OpKind::Builtin(op) => eval_builtin_unary(*op, x),
            OpKind::UserDefined(f) => f(x),
        }
    }
}

/// Evaluates a built-in unary opcode. Total over every builtin type; user types only support
/// `Identity` (anything else is meaningless without a caller-supplied closure).
pub fn eval_builtin_unary(op: UnaryOpCode, x: &Scalar) -> Scalar {
    match op {
        UnaryOpCode::Identity => x.clone(),
        UnaryOpCode::One => scalar_one_like(x),
        UnaryOpCode::UserDefined => unreachable!("UserDefined unary ops carry their own closure"),
        UnaryOpCode::AdditiveInverse => match x {
            Scalar::Bool(b) => Scalar::Bool(*b),
            Scalar::Int8(v) => Scalar::Int8(v.wrapping_neg()),
            Scalar::UInt8(v) => Scalar::UInt8(v.wrapping_neg()),
            Scalar::Int16(v) => Scalar::Int16(v.wrapping_neg()),
            Scalar::UInt16(v) => Scalar::UInt16(v.wrapping_neg()),
            Scalar::Int32(v) => Scalar::Int32(v.wrapping_neg()),
            Scalar::UInt32(v) => Scalar::UInt32(v.wrapping_neg()),
            Scalar::Int64(v) => Scalar::Int64(v.wrapping_neg()),
            Scalar::UInt64(v) => Scalar::UInt64(v.wrapping_neg()),
            Scalar::FP32(v) => Scalar::FP32(-v),
            Scalar::FP64(v) => Scalar::FP64(-v),
            Scalar::User { .. } => x.clone(),
        },
        UnaryOpCode::Abs => match x {
            Scalar::Int8(v) => Scalar::Int8(v.wrapping_abs()),
            Scalar::Int16(v) => Scalar::Int16(v.wrapping_abs()),
            Scalar::Int32(v) => Scalar::Int32(v.wrapping_abs()),
            Scalar::Int64(v) => Scalar::Int64(v.wrapping_abs()),
            Scalar::FP32(v) => Scalar::FP32(v.abs()),
            Scalar::FP64(v) => Scalar::FP64(v.abs()),
            other => other.clone(),
        },
        UnaryOpCode::LogicalNot => match x {
            Scalar::Bool(b) => Scalar::Bool(!b),
            other => Scalar::Bool(other.is_zero_numeric()),
        },
        UnaryOpCode::Square => eval_builtin_binary(OpCode::Times, x, x),
    }
}

/// A monoid: an associative, commutative binary op with an identity and an optional terminal
/// (absorbing) value.
#[derive(Clone, Debug)]
pub struct Monoid {
    pub op: BinaryOp,
    pub identity: Scalar,
    pub terminal: Option<Scalar>,
}

impl Monoid {
    pub fn new(op: BinaryOp, identity: Scalar, terminal: Option<Scalar>) -> Result<Self> {
        ensure!(
            op.x_type == op.y_type && op.y_type == op.z_type,
            "monoid operator must be homogeneous (x={:?}, y={:?}, z={:?})",
            op.x_type,
            op.y_type,
            op.z_type
        );
        ensure!(
            identity.type_code() == op.z_type,
            "monoid identity type ({:?}) must match operator type ({:?})",
            identity.type_code(),
            op.z_type
        );
        if let Some(t) = &terminal {
            ensure!(
                t.type_code() == op.z_type,
                "monoid terminal type ({:?}) must match operator type ({:?})",
                t.type_code(),
                op.z_type
            );
        }
        Ok(Monoid { op, identity, terminal })
    }

    pub fn is_terminal(&self, value: &Scalar) -> bool {
        self.terminal.as_ref().is_some_and(|t| t == value)
    }
}

/// A semiring: an additive monoid paired with a multiplicative binary operator whose output type
/// feeds the monoid's input type.
#[derive(Clone, Debug)]
pub struct Semiring {
    pub add: Monoid,
    pub mul: BinaryOp,
}

impl Semiring {
    pub fn new(add: Monoid, mul: BinaryOp) -> Result<Self> {
        ensure!(
            mul.z_type == add.op.x_type,
            "semiring multiply output ({:?}) must match the additive monoid's type ({:?})",
            mul.z_type,
            add.op.x_type
        );
        Ok(Semiring { add, mul })
    }
}

/// Evaluates a built-in binary opcode against same-typed scalars. This is the crate's single
/// "interpreter" path: every combination of opcode and builtin type is covered here so the
/// generic worker is always total, even where `dispatch::specialized_binary` declines to
/// special-case a combination.
pub fn eval_builtin_binary(op: OpCode, x: &Scalar, y: &Scalar) -> Scalar {
    use Scalar::*;
    match op {
        OpCode::First => return x.clone(),
        OpCode::Second => return y.clone(),
        OpCode::Pair => return scalar_one_like(x),
        _ => {}
    }

    if let (Bool(a), Bool(b)) = (x, y) {
        return match op {
            OpCode::Land | OpCode::Times | OpCode::Min => Bool(*a && *b),
            OpCode::Lor | OpCode::Plus | OpCode::Max => Bool(*a || *b),
            OpCode::Lxor => Bool(*a ^ *b),
            OpCode::Eq => Bool(a == b),
            OpCode::Ne => Bool(a != b),
            OpCode::Lt => Bool(!*a & *b),
            OpCode::Le => Bool(!*a | *b),
            OpCode::Gt => Bool(*a & !*b),
            OpCode::Ge => Bool(*a | !*b),
            OpCode::Minus => Bool(*a ^ *b),
            OpCode::Div => Bool(*a || !*b),
            OpCode::First | OpCode::Second | OpCode::Pair | OpCode::UserDefined => unreachable!(),
        };
    }

    // Same-width integer types stay in integer (wrapping) arithmetic; everything else (mixed
    // width, or any float involved) is evaluated in `f64`, which is exact for the values this
    // generic fallback is expected to see. The specialized path in `dispatch.rs` covers the hot,
    // width-correct integer combinations directly.
    if let Some(result) = try_eval_same_width_integer(op, x, y) {
        return result;
    }

    let a = x.as_f64_lossy();
    let b = y.as_f64_lossy();
    let z = match op {
        OpCode::Plus => a + b,
        OpCode::Minus => a - b,
        OpCode::Times => a * b,
        OpCode::Div => a / b,
        OpCode::Min => a.min(b),
        OpCode::Max => a.max(b),
        OpCode::Eq => return Scalar::Bool(a == b),
        OpCode::Ne => return Scalar::Bool(a != b),
        OpCode::Lt => return Scalar::Bool(a < b),
        OpCode::Le => return Scalar::Bool(a <= b),
        OpCode::Gt => return Scalar::Bool(a > b),
        OpCode::Ge => return Scalar::Bool(a >= b),
        OpCode::Land => return Scalar::Bool(a != 0.0 && b != 0.0),
        OpCode::Lor => return Scalar::Bool(a != 0.0 || b != 0.0),
        OpCode::Lxor => return Scalar::Bool((a != 0.0) ^ (b != 0.0)),
        OpCode::First | OpCode::Second | OpCode::Pair | OpCode::UserDefined => unreachable!(),
    };
    scalar_from_f64_like(z, x)
}

fn scalar_one_like(x: &Scalar) -> Scalar {
    match x {
        Scalar::Bool(_) => Scalar::Bool(true),
        Scalar::Int8(_) => Scalar::Int8(1),
        Scalar::UInt8(_) => Scalar::UInt8(1),
        Scalar::Int16(_) => Scalar::Int16(1),
        Scalar::UInt16(_) => Scalar::UInt16(1),
        Scalar::Int32(_) => Scalar::Int32(1),
        Scalar::UInt32(_) => Scalar::UInt32(1),
        Scalar::Int64(_) => Scalar::Int64(1),
        Scalar::UInt64(_) => Scalar::UInt64(1),
        Scalar::FP32(_) => Scalar::FP32(1.0),
        Scalar::FP64(_) => Scalar::FP64(1.0),
        Scalar::User { .. } => x.clone(),
    }
}

fn try_eval_same_width_integer(op: OpCode, x: &Scalar, y: &Scalar) -> Option<Scalar> {
    use Scalar::*;
    macro_rules! int_arm {
        ($a:expr, $b:expr, $ctor:expr) => {{
            let a = $a;
            let b = $b;
            Some(match op {
                OpCode::Plus => $ctor(a.wrapping_add(b)),
                OpCode::Minus => $ctor(a.wrapping_sub(b)),
                OpCode::Times => $ctor(a.wrapping_mul(b)),
                OpCode::Div => $ctor(if b == 0 { a } else { a.wrapping_div(b) }),
                OpCode::Min => $ctor(a.min(b)),
                OpCode::Max => $ctor(a.max(b)),
                OpCode::Eq => return Some(Bool(a == b)),
                OpCode::Ne => return Some(Bool(a != b)),
                OpCode::Lt => return Some(Bool(a < b)),
                OpCode::Le => return Some(Bool(a <= b)),
                OpCode::Gt => return Some(Bool(a > b)),
                OpCode::Ge => return Some(Bool(a >= b)),
                _ => return None,
            })
        }};
    }
    match (x, y) {
        (Int8(a), Int8(b)) => int_arm!(*a, *b, Int8),
        (UInt8(a), UInt8(b)) => int_arm!(*a, *b, UInt8),
        (Int16(a), Int16(b)) => int_arm!(*a, *b, Int16),
        (UInt16(a), UInt16(b)) => int_arm!(*a, *b, UInt16),
        (Int32(a), Int32(b)) => int_arm!(*a, *b, Int32),
        (UInt32(a), UInt32(b)) => int_arm!(*a, *b, UInt32),
        (Int64(a), Int64(b)) => int_arm!(*a, *b, Int64),
        (UInt64(a), UInt64(b)) => int_arm!(*a, *b, UInt64),
        _ => None,
    }
}

fn scalar_from_f64_like(v: f64, like: &Scalar) -> Scalar {
    match like {
        Scalar::FP32(_) => Scalar::FP32(v as f32),
        _ => Scalar::FP64(v),
    }
}

impl Scalar {
    fn as_f64_lossy(&self) -> f64 {
        match self {
            Scalar::Bool(b) => *b as u8 as f64,
            Scalar::Int8(x) => *x as f64,
            Scalar::UInt8(x) => *x as f64,
            Scalar::Int16(x) => *x as f64,
            Scalar::UInt16(x) => *x as f64,
            Scalar::Int32(x) => *x as f64,
            Scalar::UInt32(x) => *x as f64,
            Scalar::Int64(x) => *x as f64,
            Scalar::UInt64(x) => *x as f64,
            Scalar::FP32(x) => *x as f64,
            Scalar::FP64(x) => *x,
            Scalar::User { .. } => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_times_fp64() {
        let z = eval_builtin_binary(OpCode::Plus, &Scalar::FP64(2.0), &Scalar::FP64(3.0));
        assert_eq!(z, Scalar::FP64(5.0));
        let z = eval_builtin_binary(OpCode::Times, &Scalar::FP64(2.0), &Scalar::FP64(3.0));
        assert_eq!(z, Scalar::FP64(6.0));
    }

    #[test]
    fn min_plus_int32() {
        let z = eval_builtin_binary(OpCode::Plus, &Scalar::Int32(1), &Scalar::Int32(3));
        assert_eq!(z, Scalar::Int32(4));
        let z = eval_builtin_binary(OpCode::Min, &Scalar::Int32(5), &Scalar::Int32(2));
        assert_eq!(z, Scalar::Int32(2));
    }

    #[test]
    fn semiring_rejects_mismatched_mul_output() {
        let add = Monoid::new(
            BinaryOp::builtin_same_type(OpCode::Plus, TypeCode::FP64),
            Scalar::FP64(0.0),
            None,
        )
        .unwrap();
        let mul = BinaryOp::builtin(OpCode::Times, TypeCode::Int32, TypeCode::Int32, TypeCode::Int32);
        assert!(Semiring::new(add, mul).is_err());
    }

    #[test]
    fn monoid_terminal_detection() {
        let m = Monoid::new(
            BinaryOp::builtin_same_type(OpCode::Max, TypeCode::UInt8),
            Scalar::UInt8(0),
            Some(Scalar::UInt8(255)),
        )
        .unwrap();
        assert!(m.is_terminal(&Scalar::UInt8(255)));
        assert!(!m.is_terminal(&Scalar::UInt8(10)));
    }

    #[test]
    fn unary_negate_and_square() {
        let neg = UnaryOp::builtin(UnaryOpCode::AdditiveInverse, TypeCode::Int32, TypeCode::Int32);
        assert_eq!(neg.apply(&Scalar::Int32(5)), Scalar::Int32(-5));
        let sq = UnaryOp::builtin(UnaryOpCode::Square, TypeCode::FP64, TypeCode::FP64);
        assert_eq!(sq.apply(&Scalar::FP64(3.0)), Scalar::FP64(9.0));
    }
}
