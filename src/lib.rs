//! # acc8
//!
//! A cycle-level emulator of a synchronous 8-bit accumulator processor with
//! 16-bit addressing.
//!
//! The core is three clocked blocks sharing one bus:
//! - [`alu`]: the arithmetic unit, with multi-step MUL, DIV and SQRT
//! - [`cpu::registers`]: the register file
//! - [`cpu::control`]: the nine-phase sequencer
//!
//! [`Cpu`] wires them together and advances all three on each clock edge.

pub mod alu;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use alu::{AluOp, ArithmeticUnit, Flags};
pub use cpu::{Cpu, CpuError, CpuState, Instruction, Memory, Phase, Retired, RunOutcome, SystemBus};
pub use asm::{assemble, disassemble, AssemblerError, ImageError, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
