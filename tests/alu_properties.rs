//! Property tests for the arithmetic unit and reset behavior.

use acc8::alu::{arith, AluOp, AluRequest, ArithmeticUnit, Flags};
use acc8::cpu::Phase;
use acc8::Cpu;
use proptest::prelude::*;

/// Issue one request and clock until `done`.
fn run_alu(op: AluOp, a: u8, b: u8, flags: Flags) -> (u8, Flags, u32) {
    let mut alu = ArithmeticUnit::new();
    alu.clock(Some(AluRequest::new(op, a, b)), flags);
    let mut edges = 1;
    while !alu.done() {
        alu.clock(None, flags);
        edges += 1;
        assert!(edges < 64, "{} never finished", op);
    }
    (alu.result(), alu.flags(), edges)
}

proptest! {
    #[test]
    fn property_add_wraps_and_carries(a in any::<u8>(), b in any::<u8>()) {
        let (result, flags) = arith::add(a, b, Flags::empty());
        prop_assert_eq!(result, a.wrapping_add(b));
        prop_assert_eq!(flags.carry(), u16::from(a) + u16::from(b) > 255);
        prop_assert_eq!(flags.zero(), result == 0);
        prop_assert_eq!(flags.negative(), result & 0x80 != 0);
    }

    #[test]
    fn property_sub_and_compare(a in any::<u8>(), b in any::<u8>()) {
        let (result, _) = arith::sub(a, b, Flags::empty());
        prop_assert_eq!(result, a.wrapping_sub(b));

        let (_, flags) = arith::compare(a, b, Flags::empty());
        prop_assert_eq!(flags.zero(), a == b);
    }

    #[test]
    fn property_rotate_round_trip(x in any::<u8>(), carry in any::<bool>()) {
        let start = Flags::empty().with(acc8::alu::flags::CARRY, carry);

        let (left, mid) = arith::rotate_left(x, start);
        let (back, end) = arith::rotate_right(left, mid);
        prop_assert_eq!(back, x);
        prop_assert_eq!(end.carry(), carry);

        let (right, mid) = arith::rotate_right(x, start);
        let (back, end) = arith::rotate_left(right, mid);
        prop_assert_eq!(back, x);
        prop_assert_eq!(end.carry(), carry);
    }

    #[test]
    fn property_mul_counts_set_bits(a in any::<u8>(), b in any::<u8>()) {
        let expected = (u32::from(a) * b.count_ones() % 256) as u8;
        let (result, flags, edges) = run_alu(AluOp::Mul, a, b, Flags::empty());
        prop_assert_eq!(result, expected);
        prop_assert_eq!(flags.zero(), expected == 0);
        prop_assert_eq!(edges, 9);
    }

    #[test]
    fn property_div_matches_integer_division(a in any::<u8>(), b in 1u8..) {
        let (result, flags, edges) = run_alu(AluOp::Div, a, b, Flags::empty());
        prop_assert_eq!(result, a / b);
        prop_assert!(!flags.overflow());
        prop_assert_eq!(edges, 9);
        prop_assert_eq!(arith::divide(a, b), (a / b, a % b));
    }

    #[test]
    fn property_sqrt_is_floor_root(a in any::<u8>()) {
        let (root, _, edges) = run_alu(AluOp::Sqrt, a, 0, Flags::empty());
        prop_assert!(u16::from(root) * u16::from(root) <= u16::from(a));
        prop_assert!((u16::from(root) + 1) * (u16::from(root) + 1) > u16::from(a));
        prop_assert_eq!(edges, 2);
    }

    #[test]
    fn property_single_cycle_ops_finish_on_issue(op in 0u8..16, a in any::<u8>(), b in any::<u8>()) {
        let op = AluOp::from_code(op);
        prop_assume!(!op.is_multi_step());
        let (result, flags, edges) = run_alu(op, a, b, Flags::empty());
        prop_assert_eq!(edges, 1);
        prop_assert_eq!(Some((result, flags)), arith::evaluate(op, a, b, Flags::empty()));
    }

    #[test]
    fn property_reset_from_any_state(
        program in proptest::collection::vec(any::<u8>(), 0..=256),
        ticks in 0usize..400,
    ) {
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        for _ in 0..ticks {
            cpu.tick();
        }
        cpu.reset();

        prop_assert_eq!(cpu.phase(), Phase::Idle);
        prop_assert_eq!(cpu.regs.acc(), 0);
        prop_assert_eq!(cpu.regs.x(), 0);
        prop_assert_eq!(cpu.regs.y(), 0);
        prop_assert_eq!(cpu.regs.ir(), 0);
        prop_assert_eq!(cpu.regs.flags().bits(), 0);
        prop_assert_eq!(cpu.regs.pc(), 0);
        prop_assert_eq!(cpu.regs.sp(), 0xFF);
        prop_assert_eq!(cpu.regs.address(), 0);
        prop_assert!(!cpu.alu.busy());
    }
}

#[test]
fn test_shift_edges() {
    assert_eq!(arith::shift_left(0x80, Flags::empty()).0, 0x00);
    assert!(arith::shift_left(0x80, Flags::empty()).1.carry());
    assert_eq!(arith::shift_right(0x01, Flags::empty()).0, 0x00);
    assert!(arith::shift_right(0x01, Flags::empty()).1.carry());
}

#[test]
fn test_div_by_zero() {
    let (result, flags, edges) = run_alu(AluOp::Div, 42, 0, Flags::empty());
    assert_eq!(result, 0xFF);
    assert!(flags.overflow());
    assert_eq!(edges, 9);
}
