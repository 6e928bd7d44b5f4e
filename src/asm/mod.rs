//! Assembler and disassembler for acc8 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → program image)
//! - A disassembler (program image → readable text)
//! - Loading and saving program images (assembly, hex text, raw binary)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_at, listing};
pub use image::{load_image, save_image, parse_hex, to_hex, ImageError};
