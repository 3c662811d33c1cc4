//! Type codes, scalar values, and operator objects shared by every `sparsegb_core` orchestrator.
//!
//! This crate defines the small set of types the engine understands natively, a generic fallback
//! for anything else, and the machinery a caller uses to ask "is there a specialized kernel for
//! this (operator, type) pair, or do I need the generic path?".

#![allow(clippy::too_many_arguments)]

pub mod batch;
pub mod dispatch;
pub mod ops;
pub mod types;

pub use dispatch::{dispatch_binary, dispatch_unary};
pub use ops::{BinaryOp, Monoid, OpCode, OpKind, Semiring, UnaryOp, UnaryOpCode};
pub use types::{Scalar, TypeCode, UserType};
