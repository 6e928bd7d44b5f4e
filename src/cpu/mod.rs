//! CPU emulation for the 8-bit accumulator core.
//!
//! This module implements:
//! - a register file with write-enable bundles and PC update precedence
//! - a two-region system bus (read-only program page, stack page, data)
//! - the opcode table
//! - a nine-phase control unit sequencing fetch, decode and execute
//! - the clocked [`Cpu`] tying them to the ALU

pub mod memory;
pub mod registers;
pub mod decode;
pub mod control;
pub mod execute;

pub use memory::{Memory, MemoryError, SystemBus};
pub use registers::{Register, RegisterFile, RegisterSnapshot, RegisterWrites};
pub use decode::{Condition, Instruction, OperandKind};
pub use control::{BusRequest, ControlUnit, Phase};
pub use execute::{Cpu, CpuError, CpuState, Retired, RunOutcome};
