//! Disassembler.
//!
//! Converts a program image back to readable assembly. Branch targets are
//! printed as absolute addresses so the listing can be read without doing
//! offset arithmetic.

use crate::cpu::decode::{decode, Instruction, OperandKind};

/// One decoded line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Disassemble the instruction at `addr` in `image`.
///
/// Missing operand bytes past the end of the image are treated as zero.
pub fn disassemble_at(image: &[u8], addr: u16) -> Line {
    let byte = |a: u16| image.get(a as usize).copied().unwrap_or(0);
    let opcode = byte(addr);
    let instr = decode(opcode);
    let len = instr.len();
    let bytes: Vec<u8> = (0..len).map(|i| byte(addr.wrapping_add(i))).collect();
    let text = format_instruction(&instr, addr, &bytes);
    Line { addr, bytes, text }
}

/// Disassemble a whole image.
pub fn disassemble(image: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; acc8 disassembly\n");
    output.push_str("; -----------------\n\n");

    for line in listing(image) {
        let hex: Vec<String> = line.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        output.push_str(&format!("{:04X}: {:<9} {}\n", line.addr, hex.join(" "), line.text));
    }

    output
}

/// Linear sweep over `image`.
pub fn listing(image: &[u8]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut addr = 0usize;
    while addr < image.len() {
        let line = disassemble_at(image, addr as u16);
        addr += line.bytes.len();
        lines.push(line);
    }
    lines
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction, addr: u16, bytes: &[u8]) -> String {
    let mnemonic = instr.mnemonic();
    match instr.operand_kind() {
        OperandKind::None => match instr {
            Instruction::Illegal(op) => format!("DB ${:02X}", op),
            _ => mnemonic.to_string(),
        },
        OperandKind::Immediate => format!("{} #${:02X}", mnemonic, bytes[1]),
        OperandKind::Direct => format!("{} ${:02X}", mnemonic, bytes[1]),
        OperandKind::Relative => {
            let target = addr.wrapping_add(2).wrapping_add_signed(i16::from(bytes[1] as i8));
            format!("{} ${:04X}", mnemonic, target)
        }
        OperandKind::Absolute => {
            format!("{} ${:04X}", mnemonic, u16::from_le_bytes([bytes[1], bytes[2]]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_disassemble_implied() {
        assert_eq!(disassemble_at(&[0x14], 0).text, "MUL");
    }

    #[test]
    fn test_disassemble_operands() {
        let image = [0x01, 0x0A, 0x11, 0x10, 0x52, 0x34, 0x12];
        let lines = listing(&image);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "LDA #$0A");
        assert_eq!(lines[1].text, "ADD $10");
        assert_eq!(lines[2].text, "JSR $1234");
        assert_eq!(lines[2].addr, 4);
    }

    #[test]
    fn test_branch_shows_target() {
        assert_eq!(disassemble_at(&[0x00, 0x00, 0x48, 0xFC], 2).text, "BRA $0000");
    }

    #[test]
    fn test_illegal_as_data() {
        assert_eq!(disassemble_at(&[0x90], 0).text, "DB $90");
    }

    #[test]
    fn test_listing_reassembles() {
        let source = "start: LDX #2\nloop: DEC\nBNE loop\nPHA\nJMP start";
        let image = assemble(source).unwrap();
        let text: Vec<String> = listing(&image).into_iter().map(|l| l.text).collect();
        assert_eq!(assemble(&text.join("\n")).unwrap(), image);
    }
}
