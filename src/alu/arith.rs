//! Combinational arithmetic.
//!
//! Every function here is pure: operands and incoming flags in, result and
//! outgoing flags out. The clocked [`ArithmeticUnit`](super::ArithmeticUnit)
//! sequences these into single- and multi-step operations.

use crate::alu::flags::{Flags, CARRY, OVERFLOW, ZERO};
use crate::alu::AluOp;

/// Add two bytes. C is the carry out of bit 7; V is set when both operands
/// share a sign and the result does not.
pub fn add(a: u8, b: u8, flags: Flags) -> (u8, Flags) {
    let (result, carry) = a.overflowing_add(b);
    let overflow = !(a ^ b) & (a ^ result) & 0x80 != 0;
    let flags = flags
        .with(CARRY, carry)
        .with(OVERFLOW, overflow)
        .with_zn(result);
    (result, flags)
}

/// Subtract `b` from `a` in two's complement. C is a borrow (set when `a < b`).
pub fn sub(a: u8, b: u8, flags: Flags) -> (u8, Flags) {
    let (result, borrow) = a.overflowing_sub(b);
    let overflow = (a ^ b) & (a ^ result) & 0x80 != 0;
    let flags = flags
        .with(CARRY, borrow)
        .with(OVERFLOW, overflow)
        .with_zn(result);
    (result, flags)
}

/// Compare: subtract for N, V and C, but Z is `a == b` taken directly.
/// The result is returned for tracing only; it is never written back.
pub fn compare(a: u8, b: u8, flags: Flags) -> (u8, Flags) {
    let (result, flags) = sub(a, b, flags);
    (result, flags.with(ZERO, a == b))
}

/// Logical shift left. C takes the old bit 7.
pub fn shift_left(a: u8, flags: Flags) -> (u8, Flags) {
    let result = a << 1;
    (result, flags.with(CARRY, a & 0x80 != 0).with_zn(result))
}

/// Logical shift right. C takes the old bit 0.
pub fn shift_right(a: u8, flags: Flags) -> (u8, Flags) {
    let result = a >> 1;
    (result, flags.with(CARRY, a & 0x01 != 0).with_zn(result))
}

/// Rotate left through carry.
pub fn rotate_left(a: u8, flags: Flags) -> (u8, Flags) {
    let result = (a << 1) | u8::from(flags.carry());
    (result, flags.with(CARRY, a & 0x80 != 0).with_zn(result))
}

/// Rotate right through carry.
pub fn rotate_right(a: u8, flags: Flags) -> (u8, Flags) {
    let result = (a >> 1) | (u8::from(flags.carry()) << 7);
    (result, flags.with(CARRY, a & 0x01 != 0).with_zn(result))
}

/// Increment. V flags the 0x7F -> 0x80 signed wrap; C is untouched.
pub fn increment(a: u8, flags: Flags) -> (u8, Flags) {
    let result = a.wrapping_add(1);
    (result, flags.with(OVERFLOW, a == 0x7F).with_zn(result))
}

/// Decrement. V flags the 0x80 -> 0x7F signed wrap; C is untouched.
pub fn decrement(a: u8, flags: Flags) -> (u8, Flags) {
    let result = a.wrapping_sub(1);
    (result, flags.with(OVERFLOW, a == 0x80).with_zn(result))
}

/// Evaluate a single-cycle operation.
///
/// Returns `None` for the multi-step operations, which must be sequenced
/// through [`mul_step`], [`div_step`] and [`isqrt`].
pub fn evaluate(op: AluOp, a: u8, b: u8, flags: Flags) -> Option<(u8, Flags)> {
    let out = match op {
        AluOp::Add => add(a, b, flags),
        AluOp::Sub => sub(a, b, flags),
        AluOp::Cmp => compare(a, b, flags),
        AluOp::And => logic(a & b, flags),
        AluOp::Or => logic(a | b, flags),
        AluOp::Xor => logic(a ^ b, flags),
        AluOp::Not => logic(!a, flags),
        AluOp::Shl => shift_left(a, flags),
        AluOp::Shr => shift_right(a, flags),
        AluOp::Rol => rotate_left(a, flags),
        AluOp::Ror => rotate_right(a, flags),
        AluOp::Inc => increment(a, flags),
        AluOp::Dec => decrement(a, flags),
        AluOp::Mul | AluOp::Div | AluOp::Sqrt => return None,
    };
    Some(out)
}

#[inline]
fn logic(result: u8, flags: Flags) -> (u8, Flags) {
    (result, flags.with_zn(result))
}

// ============================================================================
// Multi-step algorithms
// ============================================================================

/// One step of the shift-and-add multiplier.
///
/// `step` selects the bit of `b` under test (LSB first). When that bit is set,
/// `a` is added into the running total. `a` is never shifted, so eight steps
/// produce `a * popcount(b)` rather than `a * b`.
#[inline]
pub fn mul_step(total: u8, a: u8, b: u8, step: u8) -> u8 {
    if (b >> step) & 1 == 1 {
        total.wrapping_add(a)
    } else {
        total
    }
}

/// Run all eight multiplier steps at once.
pub fn multiply(a: u8, b: u8) -> u8 {
    (0..8).fold(0, |total, step| mul_step(total, a, b, step))
}

/// One step of restoring division.
///
/// The partial remainder is shifted left taking the next dividend bit from the
/// top of `quotient`; if the divisor fits it is subtracted and a 1 enters the
/// quotient, otherwise the remainder is kept (restored).
#[inline]
pub fn div_step(remainder: u16, quotient: u8, divisor: u8) -> (u16, u8) {
    let remainder = (remainder << 1) | u16::from(quotient >> 7);
    let quotient = quotient << 1;
    if remainder >= u16::from(divisor) {
        (remainder - u16::from(divisor), quotient | 1)
    } else {
        (remainder, quotient)
    }
}

/// Run all eight division steps at once, returning `(quotient, remainder)`.
///
/// A zero divisor always "fits", so the quotient comes out as 0xFF.
pub fn divide(dividend: u8, divisor: u8) -> (u8, u8) {
    let (remainder, quotient) =
        (0..8).fold((0u16, dividend), |(r, q), _| div_step(r, q, divisor));
    (quotient, remainder as u8)
}

/// Integer square root by binary search over `[0, 16]`.
pub fn isqrt(a: u8) -> u8 {
    let a = u16::from(a);
    let (mut lo, mut hi) = (0u16, 16u16);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if mid * mid <= a {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo as u8
}

/// Flags for a finished multi-step result. MUL and SQRT only touch Z and N;
/// DIV also reports a zero divisor through V.
pub fn finish_flags(op: AluOp, result: u8, divisor: u8, flags: Flags) -> Flags {
    let flags = flags.with_zn(result);
    match op {
        AluOp::Div => flags.with(OVERFLOW, divisor == 0),
        _ => flags,
    }
}

/// Sign of a byte interpreted as two's complement.
#[inline]
pub const fn is_negative(value: u8) -> bool {
    value & 0x80 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_carry_and_overflow() {
        let (r, f) = add(0xFF, 0x01, Flags::empty());
        assert_eq!(r, 0x00);
        assert!(f.carry());
        assert!(f.zero());
        assert!(!f.overflow());

        let (r, f) = add(0x7F, 0x01, Flags::empty());
        assert_eq!(r, 0x80);
        assert!(!f.carry());
        assert!(f.overflow());
        assert!(f.negative());
    }

    #[test]
    fn test_sub_borrow_and_overflow() {
        let (r, f) = sub(0x03, 0x05, Flags::empty());
        assert_eq!(r, 0xFE);
        assert!(f.carry());
        assert!(f.negative());

        let (r, f) = sub(0x80, 0x01, Flags::empty());
        assert_eq!(r, 0x7F);
        assert!(f.overflow());
        assert!(!f.carry());
    }

    #[test]
    fn test_compare_zero_is_equality() {
        let (_, f) = compare(0x42, 0x42, Flags::empty());
        assert!(f.zero());
        assert!(!f.carry());

        let (_, f) = compare(0x10, 0x20, Flags::from_bits(ZERO));
        assert!(!f.zero());
        assert!(f.carry());
    }

    #[test]
    fn test_shift_boundaries() {
        assert_eq!(shift_left(0x80, Flags::empty()), (0x00, Flags::from_bits(CARRY | ZERO)));
        assert_eq!(shift_right(0x01, Flags::empty()), (0x00, Flags::from_bits(CARRY | ZERO)));
    }

    #[test]
    fn test_rotate_through_carry() {
        let (r, f) = rotate_left(0x80, Flags::from_bits(CARRY));
        assert_eq!(r, 0x01);
        assert!(f.carry());

        let (r, f) = rotate_right(0x01, Flags::empty());
        assert_eq!(r, 0x00);
        assert!(f.carry());
        assert!(f.zero());
    }

    #[test]
    fn test_inc_dec_overflow_keeps_carry() {
        let (r, f) = increment(0x7F, Flags::from_bits(CARRY));
        assert_eq!(r, 0x80);
        assert!(f.overflow());
        assert!(f.carry());

        let (r, f) = decrement(0x80, Flags::empty());
        assert_eq!(r, 0x7F);
        assert!(f.overflow());
        assert!(!f.carry());

        let (r, f) = decrement(0x00, Flags::empty());
        assert_eq!(r, 0xFF);
        assert!(!f.overflow());
    }

    #[test]
    fn test_logic_preserves_carry_and_overflow() {
        let start = Flags::from_bits(CARRY | OVERFLOW);
        let (r, f) = evaluate(AluOp::And, 0xF0, 0x0F, start).unwrap();
        assert_eq!(r, 0);
        assert!(f.zero());
        assert!(f.carry());
        assert!(f.overflow());
    }

    #[test]
    fn test_multiply_is_popcount_weighted() {
        assert_eq!(multiply(3, 0b0000_0111), 9);
        assert_eq!(multiply(7, 6), 14);
        assert_eq!(multiply(0x80, 0xFF), 0x00);
        assert_eq!(multiply(5, 0), 0);
    }

    #[test]
    fn test_divide() {
        assert_eq!(divide(100, 7), (14, 2));
        assert_eq!(divide(255, 1), (255, 0));
        assert_eq!(divide(3, 10), (0, 3));
        assert_eq!(divide(42, 0).0, 0xFF);
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(255), 15);
        for a in 0..=255u8 {
            let r = u16::from(isqrt(a));
            assert!(r * r <= u16::from(a) && (r + 1) * (r + 1) > u16::from(a));
        }
    }

    #[test]
    fn test_multi_step_ops_are_not_evaluated() {
        assert!(evaluate(AluOp::Mul, 1, 1, Flags::empty()).is_none());
        assert!(evaluate(AluOp::Div, 1, 1, Flags::empty()).is_none());
        assert!(evaluate(AluOp::Sqrt, 1, 1, Flags::empty()).is_none());
    }
}
