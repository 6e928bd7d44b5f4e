//! The register file.
//!
//! Registers:
//! - ACC: 8-bit accumulator
//! - X, Y: 8-bit index/operand registers
//! - PC: 16-bit program counter (always the address of the next byte to fetch)
//! - SP: 8-bit stack pointer, an offset into page 0x01
//! - IR: 8-bit instruction register
//! - FLAGS: 8-bit status register
//!
//! Writes are collected into a [`RegisterWrites`] bundle during a cycle and
//! committed together by [`RegisterFile::clock`]. Reads always see the value
//! committed on the most recent edge.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::alu::Flags;
use crate::cpu::memory::STACK_BASE;

/// Value of SP after reset.
pub const SP_RESET: u8 = 0xFF;

/// A byte-wide register addressable by load, store, push and pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    Acc,
    X,
    Y,
    Flags,
}

impl Register {
    pub const fn name(self) -> &'static str {
        match self {
            Register::Acc => "A",
            Register::X => "X",
            Register::Y => "Y",
            Register::Flags => "P",
        }
    }
}

/// The three ways PC can change on an edge.
///
/// If more than one is requested, direct-write wins over load, and load wins
/// over increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PcUpdate {
    /// Absolute jump, call or return.
    pub direct: Option<u16>,
    /// Branch resolution.
    pub load: Option<u16>,
    /// Step past one consumed byte.
    pub increment: bool,
}

impl PcUpdate {
    /// The value PC takes after the edge.
    pub fn resolve(&self, pc: u16) -> u16 {
        if let Some(target) = self.direct {
            target
        } else if let Some(target) = self.load {
            target
        } else if self.increment {
            pc.wrapping_add(1)
        } else {
            pc
        }
    }

    pub fn is_idle(&self) -> bool {
        self.direct.is_none() && self.load.is_none() && !self.increment
    }
}

/// Write-enables and data inputs for one edge. `None` means the enable is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisterWrites {
    pub acc: Option<u8>,
    pub x: Option<u8>,
    pub y: Option<u8>,
    pub sp: Option<u8>,
    pub ir: Option<u8>,
    pub flags: Option<Flags>,
    pub pc: PcUpdate,
    /// Address output latch.
    pub address: Option<u16>,
}

impl RegisterWrites {
    /// Route a byte to one of the addressable registers.
    pub fn set(&mut self, reg: Register, value: u8) {
        match reg {
            Register::Acc => self.acc = Some(value),
            Register::X => self.x = Some(value),
            Register::Y => self.y = Some(value),
            Register::Flags => self.flags = Some(Flags::from_bits(value)),
        }
    }
}

/// The register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    acc: u8,
    x: u8,
    y: u8,
    pc: u16,
    sp: u8,
    ir: u8,
    flags: Flags,
    address: u16,
}

impl RegisterFile {
    /// Create a register file in its reset state.
    pub fn new() -> Self {
        Self {
            acc: 0,
            x: 0,
            y: 0,
            pc: 0x0000,
            sp: SP_RESET,
            ir: 0,
            flags: Flags::empty(),
            address: 0x0000,
        }
    }

    /// Force every register to its reset value. Overrides any pending writes.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Commit one edge's worth of writes.
    pub fn clock(&mut self, writes: &RegisterWrites) {
        if let Some(v) = writes.acc {
            self.acc = v;
        }
        if let Some(v) = writes.x {
            self.x = v;
        }
        if let Some(v) = writes.y {
            self.y = v;
        }
        if let Some(v) = writes.sp {
            self.sp = v;
        }
        if let Some(v) = writes.ir {
            self.ir = v;
        }
        if let Some(v) = writes.flags {
            self.flags = v;
        }
        if let Some(v) = writes.address {
            self.address = v;
        }
        self.pc = writes.pc.resolve(self.pc);
    }

    #[inline]
    pub fn acc(&self) -> u8 {
        self.acc
    }

    #[inline]
    pub fn x(&self) -> u8 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> u8 {
        self.y
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[inline]
    pub fn sp(&self) -> u8 {
        self.sp
    }

    #[inline]
    pub fn ir(&self) -> u8 {
        self.ir
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Last address driven onto the bus.
    #[inline]
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Read one of the addressable registers.
    pub fn get(&self, reg: Register) -> u8 {
        match reg {
            Register::Acc => self.acc,
            Register::X => self.x,
            Register::Y => self.y,
            Register::Flags => self.flags.bits(),
        }
    }

    /// Absolute address of the current top of stack.
    #[inline]
    pub fn stack_top(&self) -> u16 {
        STACK_BASE | u16::from(self.sp)
    }

    /// Copy out the externally observable registers.
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            acc: self.acc,
            x: self.x,
            y: self.y,
            pc: self.pc,
            sp: self.sp,
            ir: self.ir,
            flags: self.flags.bits(),
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A={:02X} X={:02X} Y={:02X} PC={:04X} SP={:02X} IR={:02X} P={}",
            self.acc, self.x, self.y, self.pc, self.sp, self.ir, self.flags
        )
    }
}

/// Plain copy of the observable registers, for traces and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub acc: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub ir: u8,
    pub flags: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_values() {
        let regs = RegisterFile::new();
        assert_eq!(regs.acc(), 0);
        assert_eq!(regs.x(), 0);
        assert_eq!(regs.y(), 0);
        assert_eq!(regs.ir(), 0);
        assert_eq!(regs.flags().bits(), 0);
        assert_eq!(regs.pc(), 0x0000);
        assert_eq!(regs.sp(), 0xFF);
        assert_eq!(regs.address(), 0x0000);
    }

    #[test]
    fn test_writes_only_with_enable() {
        let mut regs = RegisterFile::new();
        let writes = RegisterWrites { x: Some(0x42), ..Default::default() };
        regs.clock(&writes);
        assert_eq!(regs.x(), 0x42);
        assert_eq!(regs.acc(), 0);
        assert_eq!(regs.pc(), 0);
    }

    #[test]
    fn test_pc_precedence() {
        let all = PcUpdate { direct: Some(0x1234), load: Some(0x5678), increment: true };
        assert_eq!(all.resolve(0x0010), 0x1234);

        let load_inc = PcUpdate { direct: None, load: Some(0x5678), increment: true };
        assert_eq!(load_inc.resolve(0x0010), 0x5678);

        let inc = PcUpdate { increment: true, ..Default::default() };
        assert_eq!(inc.resolve(0x0010), 0x0011);
        assert_eq!(inc.resolve(0xFFFF), 0x0000);

        assert_eq!(PcUpdate::default().resolve(0x0010), 0x0010);
    }

    #[test]
    fn test_reset_overrides_state() {
        let mut regs = RegisterFile::new();
        let mut writes = RegisterWrites {
            sp: Some(0x10),
            flags: Some(Flags::from_bits(0xFF)),
            ..Default::default()
        };
        writes.set(Register::Acc, 0x99);
        writes.pc.direct = Some(0x0400);
        regs.clock(&writes);
        regs.reset();
        assert_eq!(regs, RegisterFile::new());
    }

    #[test]
    fn test_stack_top() {
        let regs = RegisterFile::new();
        assert_eq!(regs.stack_top(), 0x01FF);
    }
}
