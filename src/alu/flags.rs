//! The FLAGS status register.
//!
//! Bit layout (bit 0 = LSB):
//! - 0: Carry (C)
//! - 1: Zero (Z)
//! - 2: Negative (N)
//! - 3: Overflow (V)
//! - 4: IRQ-disable (I)
//! - 5: Decimal (D)
//! - 6: Break (B)
//! - 7: Extended (E)
//!
//! Only the low nibble is ever computed by the arithmetic unit. The high
//! nibble is written by `PLP` and is otherwise inert.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Carry out of bit 7, or borrow for subtraction.
pub const CARRY: u8 = 1 << 0;
/// Result was zero (or, for CMP, the operands were equal).
pub const ZERO: u8 = 1 << 1;
/// Bit 7 of the result.
pub const NEGATIVE: u8 = 1 << 2;
/// Signed overflow.
pub const OVERFLOW: u8 = 1 << 3;
/// Interrupt disable. Inert.
pub const IRQ_DISABLE: u8 = 1 << 4;
/// Decimal mode. Inert.
pub const DECIMAL: u8 = 1 << 5;
/// Break. Inert.
pub const BREAK: u8 = 1 << 6;
/// Extended. Inert.
pub const EXTENDED: u8 = 1 << 7;

/// Bits the arithmetic unit is allowed to change.
pub const ALU_MASK: u8 = CARRY | ZERO | NEGATIVE | OVERFLOW;

/// An 8-bit FLAGS value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// All flags clear.
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wrap a raw byte.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw byte.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit in `mask` is set.
    #[inline]
    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    /// Set or clear the bits in `mask`.
    #[inline]
    pub fn set(&mut self, mask: u8, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Builder form of [`Flags::set`].
    #[inline]
    #[must_use]
    pub fn with(mut self, mask: u8, on: bool) -> Self {
        self.set(mask, on);
        self
    }

    #[inline]
    pub const fn carry(self) -> bool {
        self.contains(CARRY)
    }

    #[inline]
    pub const fn zero(self) -> bool {
        self.contains(ZERO)
    }

    #[inline]
    pub const fn negative(self) -> bool {
        self.contains(NEGATIVE)
    }

    #[inline]
    pub const fn overflow(self) -> bool {
        self.contains(OVERFLOW)
    }

    /// Update Z and N from a result byte.
    #[inline]
    #[must_use]
    pub fn with_zn(self, result: u8) -> Self {
        self.with(ZERO, result == 0).with(NEGATIVE, result & 0x80 != 0)
    }

    /// Replace the ALU-owned low nibble with the one from `computed`,
    /// keeping the software-owned high nibble.
    #[inline]
    #[must_use]
    pub const fn merge_alu(self, computed: Flags) -> Self {
        Self((self.0 & !ALU_MASK) | (computed.0 & ALU_MASK))
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#04x} {})", self.0, self)
    }
}

/// Renders as `EBDIVNZC`, upper case for set bits and `-` for clear ones.
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [char; 8] = ['C', 'Z', 'N', 'V', 'I', 'D', 'B', 'E'];
        for bit in (0..8).rev() {
            let c = if self.0 & (1 << bit) != 0 { NAMES[bit] } else { '-' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl From<u8> for Flags {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<Flags> for u8 {
    fn from(flags: Flags) -> Self {
        flags.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zn_from_result() {
        let f = Flags::empty().with_zn(0);
        assert!(f.zero());
        assert!(!f.negative());

        let f = Flags::empty().with_zn(0x80);
        assert!(!f.zero());
        assert!(f.negative());
    }

    #[test]
    fn test_merge_keeps_high_nibble() {
        let current = Flags::from_bits(IRQ_DISABLE | BREAK | CARRY);
        let computed = Flags::from_bits(ZERO | EXTENDED);
        let merged = current.merge_alu(computed);
        assert_eq!(merged.bits(), IRQ_DISABLE | BREAK | ZERO);
    }

    #[test]
    fn test_display() {
        let f = Flags::from_bits(CARRY | NEGATIVE | EXTENDED);
        assert_eq!(f.to_string(), "E----N-C");
    }
}
