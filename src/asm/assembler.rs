//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LABEL:            ; Define a label
//!     LDA #$0A      ; Immediate
//!     ADD $10       ; Direct: data page byte 0x0210
//!     BNE LABEL     ; Relative branch
//!     JSR ROUTINE   ; Absolute
//!     MUL           ; Implied
//!
//!     .org $40      ; Move the location counter forward (ORG also works)
//!     .byte 1, $FF  ; Raw bytes (DB and DAT also work)
//! ```
//!
//! Numbers may be decimal, `$hex`, `0xhex` or `%binary`. Mnemonics,
//! directives and labels are case-insensitive.

use std::collections::HashMap;
use thiserror::Error;

use crate::cpu::decode::{self, OperandKind};

/// Assemble source text into a program image starting at 0x0000.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// An operand before label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Number(i32),
    Label(String),
}

#[derive(Debug, Clone)]
enum Item {
    Instr { opcode: u8, kind: OperandKind, operand: Option<Expr> },
    Bytes(Vec<Expr>),
}

/// One past the highest addressable byte.
const ADDRESS_LIMIT: u32 = 0x1_0000;

/// One statement placed at a known address.
#[derive(Debug, Clone)]
struct Placed {
    addr: u16,
    line: usize,
    item: Item,
}

/// The assembler state.
struct Assembler {
    /// Location counter. May sit at `ADDRESS_LIMIT` after the last byte.
    current_addr: u32,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    /// Statements in source order.
    placed: Vec<Placed>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            placed: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: sizes and labels
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: encode with every label known
        let mut output = Vec::new();
        for placed in &self.placed {
            let start = placed.addr as usize;
            if output.len() < start {
                output.resize(start, 0);
            }
            let bytes = self.encode(placed)?;
            output.extend_from_slice(&bytes);
        }
        Ok(output)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        // Label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !is_identifier(&label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", &line[..colon_idx]),
                });
            }
            let addr = self.location(line_num)?;
            if self.symbols.insert(label.clone(), addr).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        let (head, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let head = head.to_uppercase();
        let rest = if rest.is_empty() { None } else { Some(rest) };

        match head.as_str() {
            ".ORG" | "ORG" => {
                let operand = require(rest, line_num, "ORG requires an address")?;
                let addr = match parse_expr(operand, line_num)? {
                    Expr::Number(n) => n,
                    Expr::Label(label) => *self.symbols.get(&label).ok_or(
                        AssemblerError::UndefinedLabel { line: line_num, label },
                    )? as i32,
                };
                let addr = u16::try_from(addr)
                    .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value: addr })?;
                if u32::from(addr) < self.current_addr {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("ORG ${:04X} is behind the current address ${:04X}", addr, self.current_addr),
                    });
                }
                self.current_addr = u32::from(addr);
            }

            ".BYTE" | "DB" | "DAT" => {
                let operand = require(rest, line_num, "DB requires at least one value")?;
                let values = operand
                    .split(',')
                    .map(|part| parse_expr(part, line_num))
                    .collect::<Result<Vec<_>, _>>()?;
                let len = values.len();
                self.place(line_num, Item::Bytes(values), len)?;
            }

            _ => {
                let item = self.parse_instruction(&head, rest, line_num)?;
                let len = match &item {
                    Item::Instr { kind, .. } => 1 + usize::from(kind.len()),
                    Item::Bytes(values) => values.len(),
                };
                self.place(line_num, item, len)?;
            }
        }

        Ok(())
    }

    fn parse_instruction(&self, mnemonic: &str, operand: Option<&str>, line_num: usize)
        -> Result<Item, AssemblerError>
    {
        if !decode::is_mnemonic(mnemonic) {
            return Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.to_string(),
            });
        }

        let (kind, operand) = match operand {
            None => (OperandKind::None, None),
            Some(text) => {
                if let Some(imm) = text.strip_prefix('#') {
                    (OperandKind::Immediate, Some(parse_expr(imm, line_num)?))
                } else {
                    // A bare operand means whichever memory form the mnemonic has.
                    let kind = [OperandKind::Relative, OperandKind::Absolute, OperandKind::Direct]
                        .into_iter()
                        .find(|&k| decode::lookup(mnemonic, k).is_some())
                        .unwrap_or(OperandKind::Direct);
                    (kind, Some(parse_expr(text, line_num)?))
                }
            }
        };

        let opcode = decode::lookup(mnemonic, kind).ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("{} does not take {} operand", mnemonic, describe(kind)),
        })?;

        Ok(Item::Instr { opcode, kind, operand })
    }

    /// The location counter as an address, if it still names a byte.
    fn location(&self, line: usize) -> Result<u16, AssemblerError> {
        u16::try_from(self.current_addr).map_err(|_| AssemblerError::ValueOutOfRange {
            line,
            value: self.current_addr as i32,
        })
    }

    fn place(&mut self, line: usize, item: Item, len: usize) -> Result<(), AssemblerError> {
        let addr = self.location(line)?;
        let end = u32::try_from(len)
            .ok()
            .and_then(|len| self.current_addr.checked_add(len))
            .filter(|&end| end <= ADDRESS_LIMIT)
            .ok_or(AssemblerError::ValueOutOfRange {
                line,
                value: i32::try_from((self.current_addr as usize).saturating_add(len)).unwrap_or(i32::MAX),
            })?;
        self.placed.push(Placed { addr, line, item });
        self.current_addr = end;
        Ok(())
    }

    fn resolve(&self, expr: &Expr, line: usize) -> Result<i32, AssemblerError> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Label(label) => self
                .symbols
                .get(label)
                .map(|&addr| i32::from(addr))
                .ok_or_else(|| AssemblerError::UndefinedLabel { line, label: label.clone() }),
        }
    }

    fn encode(&self, placed: &Placed) -> Result<Vec<u8>, AssemblerError> {
        let line = placed.line;
        match &placed.item {
            Item::Bytes(values) => values
                .iter()
                .map(|v| {
                    let value = self.resolve(v, line)?;
                    to_byte(value, line)
                })
                .collect(),

            Item::Instr { opcode, kind, operand } => {
                let mut bytes = vec![*opcode];
                let value = match operand {
                    Some(expr) => self.resolve(expr, line)?,
                    None => return Ok(bytes),
                };
                match kind {
                    OperandKind::None => {}
                    OperandKind::Immediate | OperandKind::Direct => bytes.push(to_byte(value, line)?),
                    OperandKind::Relative => {
                        // Offsets count from the byte after the offset.
                        let next = i32::from(placed.addr) + 2;
                        let offset = value - next;
                        let offset = i8::try_from(offset)
                            .map_err(|_| AssemblerError::BranchOutOfRange { line, offset })?;
                        bytes.push(offset as u8);
                    }
                    OperandKind::Absolute => {
                        let addr = u16::try_from(value)
                            .map_err(|_| AssemblerError::ValueOutOfRange { line, value })?;
                        bytes.extend_from_slice(&addr.to_le_bytes());
                    }
                }
                Ok(bytes)
            }
        }
    }
}

fn require<'a>(operand: Option<&'a str>, line: usize, message: &str) -> Result<&'a str, AssemblerError> {
    operand.ok_or_else(|| AssemblerError::SyntaxError { line, message: message.into() })
}

fn describe(kind: OperandKind) -> &'static str {
    match kind {
        OperandKind::None => "no",
        OperandKind::Immediate => "an immediate",
        OperandKind::Direct => "a direct",
        OperandKind::Relative => "a relative",
        OperandKind::Absolute => "an absolute",
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Bytes accept -128..=255 so signed data can be written naturally.
fn to_byte(value: i32, line: usize) -> Result<u8, AssemblerError> {
    if (-128..=255).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AssemblerError::ValueOutOfRange { line, value })
    }
}

fn parse_expr(text: &str, line: usize) -> Result<Expr, AssemblerError> {
    let text = text.trim();
    let invalid = |what: &str| AssemblerError::SyntaxError {
        line,
        message: format!("invalid {} literal '{}'", what, text),
    };

    if let Some(hex) = text.strip_prefix('$') {
        return i32::from_str_radix(hex, 16).map(Expr::Number).map_err(|_| invalid("hex"));
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i32::from_str_radix(hex, 16).map(Expr::Number).map_err(|_| invalid("hex"));
    }
    if let Some(bin) = text.strip_prefix('%') {
        return i32::from_str_radix(bin, 2).map(Expr::Number).map_err(|_| invalid("binary"));
    }
    if let Ok(num) = text.parse::<i32>() {
        return Ok(Expr::Number(num));
    }

    let label = text.to_uppercase();
    if is_identifier(&label) {
        Ok(Expr::Label(label))
    } else {
        Err(AssemblerError::SyntaxError {
            line,
            message: format!("cannot parse operand '{}'", text),
        })
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("label defined twice on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i32 },

    #[error("branch target out of range on line {line}: offset {offset}")]
    BranchOutOfRange { line: usize, offset: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LDA #$0A
            ADD $11
            STA $12
            MUL
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x01, 0x0A, 0x11, 0x11, 0x04, 0x12, 0x14]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        START:
            LDA #1
            JMP END
            NOP
        END: BRA END
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x01, 0x01, 0x50, 0x06, 0x00, 0x00, 0x48, 0xFE]);
    }

    #[test]
    fn test_backward_branch() {
        let source = r#"
            LDX #3
        LOOP:
            DEC
            BNE loop
        "#;
        let result = assemble(source).unwrap();
        // BNE at 0x0003; next byte 0x0005; target 0x0002
        assert_eq!(result, vec![0x06, 0x03, 0x17, 0x41, 0xFD]);
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            DB 42, -1, $7F
            .byte %1010
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![42, 0xFF, 0x7F, 0x0A]);
    }

    #[test]
    fn test_org_pads_with_zero() {
        let result = assemble("NOP\n.org 4\nRTS").unwrap();
        assert_eq!(result, vec![0x00, 0x00, 0x00, 0x00, 0x53]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(assemble("FOO"), Err(AssemblerError::UnknownMnemonic { line: 1, .. })));
        assert!(matches!(assemble("JMP nowhere"), Err(AssemblerError::UndefinedLabel { .. })));
        assert!(matches!(assemble("LDA #256"), Err(AssemblerError::ValueOutOfRange { value: 256, .. })));
        assert!(matches!(assemble("X:\nX:"), Err(AssemblerError::DuplicateLabel { line: 2, .. })));
        assert!(matches!(assemble("MUL #1"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble(".org 8\n.org 4"), Err(AssemblerError::SyntaxError { line: 2, .. })));
    }

    #[test]
    fn test_code_must_fit_below_top_of_memory() {
        let image = assemble(".org $FFFE\nDB 1, 2").unwrap();
        assert_eq!(image.len(), 0x1_0000);
        assert_eq!(&image[0xFFFE..], &[1, 2]);

        assert!(matches!(
            assemble(".org $FFFE\nDB 1, 2, 3"),
            Err(AssemblerError::ValueOutOfRange { line: 2, value: 0x1_0001 })
        ));
        assert!(matches!(
            assemble(".org $FFFF\nJMP $0000"),
            Err(AssemblerError::ValueOutOfRange { line: 2, .. })
        ));
        // Nothing may follow the last byte, not even a label.
        assert!(matches!(
            assemble(".org $FFFF\nNOP\nNOP"),
            Err(AssemblerError::ValueOutOfRange { line: 3, value: 0x1_0000 })
        ));
        assert!(matches!(
            assemble(".org $FFFF\nNOP\nend:"),
            Err(AssemblerError::ValueOutOfRange { line: 3, .. })
        ));
    }

    #[test]
    fn test_branch_out_of_range() {
        let source = "BEQ far\n.org $90\nfar: NOP";
        assert!(matches!(
            assemble(source),
            Err(AssemblerError::BranchOutOfRange { line: 1, offset: 142 })
        ));
    }
}
