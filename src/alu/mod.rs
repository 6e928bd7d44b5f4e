//! Arithmetic/logic unit.
//!
//! This module provides:
//! - [`Flags`] - the FLAGS status register and its bit masks
//! - [`AluOp`] - the sixteen operation selects
//! - [`arith`] - pure combinational arithmetic and the multi-step algorithms
//! - [`ArithmeticUnit`] - the clocked unit with its `done` handshake

pub mod flags;
mod op;
pub mod arith;
mod unit;

pub use flags::Flags;
pub use op::AluOp;
pub use unit::{ArithmeticUnit, AluRequest, AluResult, AluState, next_state};
