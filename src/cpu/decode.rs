//! Opcode decoding.
//!
//! Every instruction is one opcode byte followed by zero, one or two operand
//! bytes. The operand shape is fixed per opcode:
//! - immediate: one literal byte (`LDA #$0A`)
//! - direct: one address byte into the data page (`LDA $10` reads 0x0210)
//! - relative: one signed branch offset (`BEQ label`)
//! - absolute: two address bytes, low first (`JMP $0040`)
//!
//! Opcodes that are not in the table decode to [`Instruction::Illegal`] and
//! execute as NOP.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::alu::{AluOp, Flags};
use crate::cpu::registers::Register;

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Z set
    Equal,
    /// Z clear
    NotEqual,
    /// N set
    Minus,
    /// N clear
    Plus,
    /// C set
    CarrySet,
    /// C clear
    CarryClear,
    /// V set
    OverflowSet,
    /// V clear
    OverflowClear,
    Always,
}

impl Condition {
    /// Evaluate against the current flags.
    pub fn holds(self, flags: Flags) -> bool {
        match self {
            Condition::Equal => flags.zero(),
            Condition::NotEqual => !flags.zero(),
            Condition::Minus => flags.negative(),
            Condition::Plus => !flags.negative(),
            Condition::CarrySet => flags.carry(),
            Condition::CarryClear => !flags.carry(),
            Condition::OverflowSet => flags.overflow(),
            Condition::OverflowClear => !flags.overflow(),
            Condition::Always => true,
        }
    }
}

/// Shape of the bytes following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    None,
    Immediate,
    Direct,
    Relative,
    Absolute,
}

impl OperandKind {
    /// Number of operand bytes.
    pub const fn len(self) -> u16 {
        match self {
            OperandKind::None => 0,
            OperandKind::Immediate | OperandKind::Direct | OperandKind::Relative => 1,
            OperandKind::Absolute => 2,
        }
    }
}

/// Decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Transfer ====================

    /// No operation
    Nop,
    /// reg := #imm
    LoadImmediate(Register),
    /// reg := [DATA_PAGE | dir]
    LoadDirect(Register),
    /// [DATA_PAGE | dir] := reg
    StoreDirect(Register),

    // ==================== Arithmetic / logic ====================

    /// A := A op #imm (CMP only sets flags)
    AluImmediate(AluOp),
    /// A := A op [DATA_PAGE | dir]
    AluDirect(AluOp),
    /// A := op A, or A op X for MUL and DIV
    AluImplied(AluOp),
    /// A := |A| (two's complement)
    Abs,
    /// A := -A (two's complement)
    Neg,

    // ==================== Control flow ====================

    /// if cond then PC := PC + offset
    Branch(Condition),
    /// PC := abs
    Jmp,
    /// push return address, PC := abs
    Jsr,
    /// pull return address
    Rts,

    // ==================== Stack ====================

    Push(Register),
    Pull(Register),

    /// Not in the table. Executes as NOP.
    Illegal(u8),
}

/// Decode an opcode byte.
pub fn decode(opcode: u8) -> Instruction {
    use Instruction::*;
    use Register::{Acc, X, Y};

    match opcode {
        0x00 => Nop,
        0x01 => LoadImmediate(Acc),
        0x02 => LoadDirect(Acc),
        0x04 => StoreDirect(Acc),
        0x06 => LoadImmediate(X),
        0x07 => LoadDirect(X),
        0x08 => StoreDirect(X),
        0x09 => LoadImmediate(Y),
        0x0A => LoadDirect(Y),
        0x0B => StoreDirect(Y),

        0x10 => AluImmediate(AluOp::Add),
        0x11 => AluDirect(AluOp::Add),
        0x12 => AluImmediate(AluOp::Sub),
        0x13 => AluDirect(AluOp::Sub),
        0x14 => AluImplied(AluOp::Mul),
        0x15 => AluImplied(AluOp::Div),
        0x16 => AluImplied(AluOp::Inc),
        0x17 => AluImplied(AluOp::Dec),

        0x20 => AluImmediate(AluOp::And),
        0x21 => AluDirect(AluOp::And),
        0x22 => AluImmediate(AluOp::Or),
        0x23 => AluDirect(AluOp::Or),
        0x24 => AluImmediate(AluOp::Xor),
        0x25 => AluDirect(AluOp::Xor),
        0x26 => AluImplied(AluOp::Not),
        0x28 => AluImplied(AluOp::Shl),
        0x29 => AluImplied(AluOp::Shr),
        0x2A => AluImplied(AluOp::Rol),
        0x2B => AluImplied(AluOp::Ror),

        0x30 => AluImmediate(AluOp::Cmp),
        0x31 => AluDirect(AluOp::Cmp),

        0x40 => Branch(Condition::Equal),
        0x41 => Branch(Condition::NotEqual),
        0x42 => Branch(Condition::Minus),
        0x43 => Branch(Condition::Plus),
        0x44 => Branch(Condition::CarrySet),
        0x45 => Branch(Condition::CarryClear),
        0x46 => Branch(Condition::OverflowSet),
        0x47 => Branch(Condition::OverflowClear),
        0x48 => Branch(Condition::Always),

        0x50 => Jmp,
        0x52 => Jsr,
        0x53 => Rts,

        0x60 => Push(Acc),
        0x61 => Pull(Acc),
        0x62 => Push(X),
        0x63 => Pull(X),
        0x64 => Push(Y),
        0x65 => Pull(Y),
        0x66 => Push(Register::Flags),
        0x67 => Pull(Register::Flags),

        0x70 => AluImplied(AluOp::Sqrt),
        0x72 => Abs,
        0x73 => Neg,

        other => Illegal(other),
    }
}

/// Encode an instruction back to its opcode byte.
///
/// Combinations with no opcode (for example `AluImplied(AluOp::Add)`)
/// encode as NOP.
pub fn encode(instr: &Instruction) -> u8 {
    (0..=0xFFu8)
        .find(|&op| decode(op) == *instr)
        .unwrap_or(match instr {
            Instruction::Illegal(op) => *op,
            _ => 0x00,
        })
}

/// Find the opcode for a mnemonic and operand shape.
pub fn lookup(mnemonic: &str, kind: OperandKind) -> Option<u8> {
    (0..=0xFFu8).find(|&op| {
        let instr = decode(op);
        !matches!(instr, Instruction::Illegal(_))
            && instr.mnemonic().eq_ignore_ascii_case(mnemonic)
            && instr.operand_kind() == kind
    })
}

/// True if any opcode uses this mnemonic.
pub fn is_mnemonic(mnemonic: &str) -> bool {
    (0..=0xFFu8).any(|op| {
        let instr = decode(op);
        !matches!(instr, Instruction::Illegal(_)) && instr.mnemonic().eq_ignore_ascii_case(mnemonic)
    })
}

impl Instruction {
    /// Operand shape.
    pub const fn operand_kind(&self) -> OperandKind {
        match self {
            Instruction::LoadImmediate(_) | Instruction::AluImmediate(_) => OperandKind::Immediate,
            Instruction::LoadDirect(_) | Instruction::StoreDirect(_) | Instruction::AluDirect(_) => {
                OperandKind::Direct
            }
            Instruction::Branch(_) => OperandKind::Relative,
            Instruction::Jmp | Instruction::Jsr => OperandKind::Absolute,
            _ => OperandKind::None,
        }
    }

    /// Total encoded length in bytes.
    pub const fn len(&self) -> u16 {
        1 + self.operand_kind().len()
    }

    /// Nominal cycle class from the instruction set table. For conditional
    /// branches this is the taken count; not-taken branches cost one.
    pub const fn cycle_class(&self) -> u8 {
        match self {
            Instruction::Nop | Instruction::Illegal(_) => 1,
            Instruction::LoadImmediate(_) | Instruction::AluImmediate(_) => 2,
            Instruction::LoadDirect(_) | Instruction::StoreDirect(_) | Instruction::AluDirect(_) => 3,
            Instruction::AluImplied(AluOp::Mul) | Instruction::AluImplied(AluOp::Div) => 9,
            Instruction::AluImplied(_) | Instruction::Abs | Instruction::Neg => 2,
            Instruction::Branch(_) => 2,
            Instruction::Jmp => 3,
            Instruction::Jsr => 5,
            Instruction::Rts => 4,
            Instruction::Push(_) | Instruction::Pull(_) => 3,
        }
    }

    /// Assembler mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "NOP",
            Instruction::LoadImmediate(r) | Instruction::LoadDirect(r) => match r {
                Register::Acc => "LDA",
                Register::X => "LDX",
                Register::Y => "LDY",
                Register::Flags => "LDP",
            },
            Instruction::StoreDirect(r) => match r {
                Register::Acc => "STA",
                Register::X => "STX",
                Register::Y => "STY",
                Register::Flags => "STP",
            },
            Instruction::AluImmediate(op)
            | Instruction::AluDirect(op)
            | Instruction::AluImplied(op) => op.name(),
            Instruction::Abs => "ABS",
            Instruction::Neg => "NEG",
            Instruction::Branch(cond) => match cond {
                Condition::Equal => "BEQ",
                Condition::NotEqual => "BNE",
                Condition::Minus => "BMI",
                Condition::Plus => "BPL",
                Condition::CarrySet => "BCS",
                Condition::CarryClear => "BCC",
                Condition::OverflowSet => "BVS",
                Condition::OverflowClear => "BVC",
                Condition::Always => "BRA",
            },
            Instruction::Jmp => "JMP",
            Instruction::Jsr => "JSR",
            Instruction::Rts => "RTS",
            Instruction::Push(r) => match r {
                Register::Acc => "PHA",
                Register::X => "PHX",
                Register::Y => "PHY",
                Register::Flags => "PHP",
            },
            Instruction::Pull(r) => match r {
                Register::Acc => "PLA",
                Register::X => "PLX",
                Register::Y => "PLY",
                Register::Flags => "PLP",
            },
            Instruction::Illegal(_) => "???",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_table_spot_checks() {
        assert_eq!(decode(0x00), Instruction::Nop);
        assert_eq!(decode(0x01), Instruction::LoadImmediate(Register::Acc));
        assert_eq!(decode(0x14), Instruction::AluImplied(AluOp::Mul));
        assert_eq!(decode(0x30), Instruction::AluImmediate(AluOp::Cmp));
        assert_eq!(decode(0x48), Instruction::Branch(Condition::Always));
        assert_eq!(decode(0x67), Instruction::Pull(Register::Flags));
        assert_eq!(decode(0x70), Instruction::AluImplied(AluOp::Sqrt));
    }

    #[test]
    fn test_unlisted_opcodes_are_illegal() {
        for op in [0x03, 0x05, 0x18, 0x27, 0x51, 0x71, 0x90, 0xFF] {
            assert_eq!(decode(op), Instruction::Illegal(op));
        }
    }

    #[test]
    fn test_encode_inverts_decode() {
        for op in 0..=0xFFu8 {
            assert_eq!(encode(&decode(op)), op, "opcode {:#04x}", op);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("lda", OperandKind::Immediate), Some(0x01));
        assert_eq!(lookup("LDA", OperandKind::Direct), Some(0x02));
        assert_eq!(lookup("JMP", OperandKind::Absolute), Some(0x50));
        assert_eq!(lookup("BEQ", OperandKind::Relative), Some(0x40));
        assert_eq!(lookup("NOT", OperandKind::None), Some(0x26));
        assert_eq!(lookup("STA", OperandKind::Immediate), None);
        assert!(is_mnemonic("sqrt"));
        assert!(!is_mnemonic("HLT"));
    }

    #[test]
    fn test_lengths() {
        assert_eq!(decode(0x00).len(), 1);
        assert_eq!(decode(0x01).len(), 2);
        assert_eq!(decode(0x40).len(), 2);
        assert_eq!(decode(0x50).len(), 3);
        assert_eq!(decode(0x90).len(), 1);
    }

    #[test]
    fn test_conditions() {
        let z = Flags::from_bits(crate::alu::flags::ZERO);
        assert!(Condition::Equal.holds(z));
        assert!(!Condition::NotEqual.holds(z));
        assert!(Condition::Always.holds(Flags::empty()));
        assert!(Condition::CarryClear.holds(Flags::empty()));
    }
}
