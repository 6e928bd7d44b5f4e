//! Arithmetic unit operation codes.

use std::fmt;
use serde::{Serialize, Deserialize};

/// One of the sixteen operations the arithmetic unit understands.
///
/// The discriminant is the 4-bit operation select driven by the control unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AluOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    And = 4,
    Or = 5,
    Xor = 6,
    Not = 7,
    Shl = 8,
    Shr = 9,
    Rol = 10,
    Ror = 11,
    Inc = 12,
    Dec = 13,
    Cmp = 14,
    Sqrt = 15,
}

impl AluOp {
    /// All operations in select-code order.
    pub const ALL: [AluOp; 16] = [
        AluOp::Add, AluOp::Sub, AluOp::Mul, AluOp::Div,
        AluOp::And, AluOp::Or, AluOp::Xor, AluOp::Not,
        AluOp::Shl, AluOp::Shr, AluOp::Rol, AluOp::Ror,
        AluOp::Inc, AluOp::Dec, AluOp::Cmp, AluOp::Sqrt,
    ];

    /// Decode a 4-bit select code. The upper nibble is ignored.
    #[inline]
    pub const fn from_code(code: u8) -> Self {
        Self::ALL[(code & 0x0F) as usize]
    }

    /// The 4-bit select code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Number of internal steps, the first of which runs on the issue edge.
    /// 0 for operations that complete on the issue edge itself.
    #[inline]
    pub const fn step_count(self) -> u8 {
        match self {
            AluOp::Mul | AluOp::Div => 8,
            AluOp::Sqrt => 1,
            _ => 0,
        }
    }

    /// True for MUL, DIV and SQRT.
    #[inline]
    pub const fn is_multi_step(self) -> bool {
        self.step_count() > 0
    }

    /// True if the result should be written back to the accumulator.
    #[inline]
    pub const fn writes_result(self) -> bool {
        !matches!(self, AluOp::Cmp)
    }

    /// Upper-case mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::Mul => "MUL",
            AluOp::Div => "DIV",
            AluOp::And => "AND",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::Not => "NOT",
            AluOp::Shl => "SHL",
            AluOp::Shr => "SHR",
            AluOp::Rol => "ROL",
            AluOp::Ror => "ROR",
            AluOp::Inc => "INC",
            AluOp::Dec => "DEC",
            AluOp::Cmp => "CMP",
            AluOp::Sqrt => "SQRT",
        }
    }
}

impl fmt::Debug for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for op in AluOp::ALL {
            assert_eq!(AluOp::from_code(op.code()), op);
        }
    }

    #[test]
    fn test_multi_step_set() {
        let multi: Vec<_> = AluOp::ALL.iter().filter(|op| op.is_multi_step()).collect();
        assert_eq!(multi, [&AluOp::Mul, &AluOp::Div, &AluOp::Sqrt]);
    }

    #[test]
    fn test_cmp_does_not_write_back() {
        assert!(!AluOp::Cmp.writes_result());
        assert!(AluOp::Sub.writes_result());
    }
}
