//! Built-in type codes and the `Scalar` tagged union.
//!
//! A closed list of types the engine specializes for, plus room for a user-supplied type that
//! only promises a byte size and copy semantics.

use std::sync::Arc;

use anyhow::{ensure, Result};

/// Stable small integers, matching the engine's wire/build-constant table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TypeCode {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    FP32,
    FP64,
    /// Carries the opaque user type id registered via [`UserType`].
    UserDefined(u32),
}

impl TypeCode {
    /// The stable wire code (`Bool=0 .. FP64=10, UserDefined=11`).
    pub const fn wire_code(self) -> u8 {
        match self {
            TypeCode::Bool => 0,
            TypeCode::Int8 => 1,
            TypeCode::UInt8 => 2,
            TypeCode::Int16 => 3,
            TypeCode::UInt16 => 4,
            TypeCode::Int32 => 5,
            TypeCode::UInt32 => 6,
            TypeCode::Int64 => 7,
            TypeCode::UInt64 => 8,
            TypeCode::FP32 => 9,
            TypeCode::FP64 => 10,
            TypeCode::UserDefined(_) => 11,
        }
    }

    pub const fn is_user_defined(self) -> bool {
        matches!(self, TypeCode::UserDefined(_))
    }

    /// Whether a value declared as `self` can be typecast to `target`, without needing an actual
    /// `Scalar` in hand. Builtin-to-builtin is always possible (`Scalar::cast_to`'s `as`-truncation
    /// path); a user-defined type only casts to itself. Used by orchestrator entry checks, which
    /// only have the matrix's declared type, not a value, to validate against an operator's type.
    pub const fn castable_to(self, target: TypeCode) -> bool {
        match (self, target) {
            (TypeCode::UserDefined(a), TypeCode::UserDefined(b)) => a == b,
            (TypeCode::UserDefined(_), _) | (_, TypeCode::UserDefined(_)) => false,
            _ => true,
        }
    }

    /// Byte size of one value of this type. User-defined sizes are carried by the `UserType`
    /// registry rather than by the code itself, so callers that need it must look it up there;
    /// this only covers the built-ins, which is all the matrix storage layer needs to size `x`.
    pub fn builtin_size(self) -> Option<usize> {
        use TypeCode::*;
        Some(match self {
            Bool | Int8 | UInt8 => 1,
            Int16 | UInt16 => 2,
            Int32 | UInt32 | FP32 => 4,
            Int64 | UInt64 | FP64 => 8,
            UserDefined(_) => return None,
        })
    }
}

/// A single typed value. User-defined values are an opaque byte blob shared by `Arc` so that
/// `Scalar::clone()` gives copy semantics without actually duplicating the bytes on every move.
#[derive(Clone, Debug)]
pub enum Scalar {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    FP32(f32),
    FP64(f64),
    User { type_id: u32, bytes: Arc<[u8]> },
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        use Scalar::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int8(a), Int8(b)) => a == b,
            (UInt8(a), UInt8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (UInt16(a), UInt16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (UInt32(a), UInt32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (UInt64(a), UInt64(b)) => a == b,
            (FP32(a), FP32(b)) => a.to_bits() == b.to_bits(),
            (FP64(a), FP64(b)) => a.to_bits() == b.to_bits(),
            (User { type_id: t1, bytes: b1 }, User { type_id: t2, bytes: b2 }) => {
                t1 == t2 && b1 == b2
            }
            _ => false,
        }
    }
}

impl Scalar {
    pub fn type_code(&self) -> TypeCode {
        use Scalar::*;
        match self {
            Bool(_) => TypeCode::Bool,
            Int8(_) => TypeCode::Int8,
            UInt8(_) => TypeCode::UInt8,
            Int16(_) => TypeCode::Int16,
            UInt16(_) => TypeCode::UInt16,
            Int32(_) => TypeCode::Int32,
            UInt32(_) => TypeCode::UInt32,
            Int64(_) => TypeCode::Int64,
            UInt64(_) => TypeCode::UInt64,
            FP32(_) => TypeCode::FP32,
            FP64(_) => TypeCode::FP64,
            User { type_id, .. } => TypeCode::UserDefined(*type_id),
        }
    }

    /// Returns this value as an `f64`, for the builtin numeric types. Used by the generic
    /// operator evaluator (`ops::eval_builtin_binary`) so it does not need one match arm per
    /// `(type, type)` pair.
    fn as_f64(&self) -> Option<f64> {
        use Scalar::*;
        Some(match *self {
            Bool(b) => b as u8 as f64,
            Int8(x) => x as f64,
            UInt8(x) => x as f64,
            Int16(x) => x as f64,
            UInt16(x) => x as f64,
            Int32(x) => x as f64,
            UInt32(x) => x as f64,
            Int64(x) => x as f64,
            UInt64(x) => x as f64,
            FP32(x) => x as f64,
            FP64(x) => x,
            User { .. } => return None,
        })
    }

    pub fn is_zero_numeric(&self) -> bool {
        use Scalar::*;
        match self {
            Bool(b) => !b,
            Int8(x) => *x == 0,
            UInt8(x) => *x == 0,
            Int16(x) => *x == 0,
            UInt16(x) => *x == 0,
            Int32(x) => *x == 0,
            UInt32(x) => *x == 0,
            Int64(x) => *x == 0,
            UInt64(x) => *x == 0,
            FP32(x) => *x == 0.0,
            FP64(x) => *x == 0.0,
            User { .. } => false,
        }
    }

    /// Typecasts `self` to `target`. Builtin-to-builtin casts follow `as` truncation/rounding
    /// semantics; a user-defined value only casts to its own type id.
    pub fn cast_to(&self, target: TypeCode) -> Result<Scalar> {
        if self.type_code() == target {
            return Ok(self.clone());
        }
        match (self, target) {
            (Scalar::User { type_id, .. }, TypeCode::UserDefined(t)) if *type_id == t => {
                Ok(self.clone())
            }
            (Scalar::User { .. }, _) | (_, TypeCode::UserDefined(_)) => {
                anyhow::bail!("cannot typecast a user-defined value to/from a different type")
            }
            _ => {
                let v = self
                    .as_f64()
                    .expect("non-user scalar always has an f64 projection");
                Ok(scalar_from_f64(v, target))
            }
        }
    }
}

fn scalar_from_f64(v: f64, target: TypeCode) -> Scalar {
    use TypeCode::*;
    match target {
        Bool => Scalar::Bool(v != 0.0),
        Int8 => Scalar::Int8(v as i8),
        UInt8 => Scalar::UInt8(v as u8),
        Int16 => Scalar::Int16(v as i16),
        UInt16 => Scalar::UInt16(v as u16),
        Int32 => Scalar::Int32(v as i32),
        UInt32 => Scalar::UInt32(v as u32),
        Int64 => Scalar::Int64(v as i64),
        UInt64 => Scalar::UInt64(v as u64),
        FP32 => Scalar::FP32(v as f32),
        FP64 => Scalar::FP64(v),
        UserDefined(_) => unreachable!("user-defined casts are rejected before reaching here"),
    }
}

/// Registration record for a user-defined type: a byte size and copy semantics, which
/// `Scalar::User`'s `Arc<[u8]>` already gives us "for free".
#[derive(Clone, Debug)]
pub struct UserType {
    pub id: u32,
    pub size: usize,
    pub name: &'static str,
}

impl UserType {
    pub fn new_value(&self, bytes: Vec<u8>) -> Result<Scalar> {
        ensure!(
            bytes.len() == self.size,
            "value for user type {} must be {} bytes, got {}",
            self.name,
            self.size,
            bytes.len()
        );
        Ok(Scalar::User {
            type_id: self.id,
            bytes: bytes.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(TypeCode::Bool.wire_code(), 0);
        assert_eq!(TypeCode::Int8.wire_code(), 1);
        assert_eq!(TypeCode::UInt8.wire_code(), 2);
        assert_eq!(TypeCode::FP64.wire_code(), 10);
        assert_eq!(TypeCode::UserDefined(7).wire_code(), 11);
    }

    #[test]
    fn cast_roundtrips_through_f64() {
        let x = Scalar::Int32(42);
        let y = x.cast_to(TypeCode::FP64).unwrap();
        assert_eq!(y, Scalar::FP64(42.0));
        let z = y.cast_to(TypeCode::Int32).unwrap();
        assert_eq!(z, x);
    }

    #[test]
    fn user_defined_cast_requires_same_id() {
        let ut = UserType { id: 3, size: 2, name: "pair_u8" };
        let v = ut.new_value(vec![1, 2]).unwrap();
        assert!(v.cast_to(TypeCode::UserDefined(3)).is_ok());
        assert!(v.cast_to(TypeCode::UserDefined(4)).is_err());
        assert!(v.cast_to(TypeCode::Int32).is_err());
    }

    #[test]
    fn nan_scalars_compare_by_bit_pattern() {
        let a = Scalar::FP64(f64::NAN);
        let b = Scalar::FP64(f64::NAN);
        assert_eq!(a, b);
    }

    #[test]
    fn castable_to_allows_any_builtin_pair_but_only_matching_user_ids() {
        assert!(TypeCode::Int32.castable_to(TypeCode::FP64));
        assert!(TypeCode::Bool.castable_to(TypeCode::UInt8));
        assert!(TypeCode::UserDefined(3).castable_to(TypeCode::UserDefined(3)));
        assert!(!TypeCode::UserDefined(3).castable_to(TypeCode::UserDefined(4)));
        assert!(!TypeCode::UserDefined(3).castable_to(TypeCode::Int32));
        assert!(!TypeCode::Int32.castable_to(TypeCode::UserDefined(3)));
    }
}
