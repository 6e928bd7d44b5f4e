//! Memory interface and the two-region system bus.
//!
//! Address map:
//! - 0x0000-0x00FF: program memory (read-only to the core)
//! - 0x0100-0x01FF: stack page
//! - 0x0200-0xFFFF: general data memory
//!
//! The stack page and general data both live in data memory; only program
//! memory is a separate store.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// First byte past program memory.
pub const PROGRAM_SIZE: usize = 0x100;
/// Base of the stack page.
pub const STACK_BASE: u16 = 0x0100;
/// Base of the page addressed by one-byte direct operands.
pub const DATA_PAGE: u16 = 0x0200;
/// Lowest address served by data memory.
pub const DATA_START: u16 = 0x0100;
/// Bytes of data memory (0x0100-0xFFFF).
pub const DATA_SIZE: usize = 0x1_0000 - DATA_START as usize;

/// Byte-wide memory as seen by the core.
///
/// The core issues at most one of these per clock cycle.
pub trait Memory {
    fn read(&self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
}

/// Which store answers a given address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Program,
    Stack,
    Data,
}

impl Region {
    /// Address decode.
    #[inline]
    pub const fn decode(address: u16) -> Self {
        match address {
            0x0000..=0x00FF => Region::Program,
            0x0100..=0x01FF => Region::Stack,
            _ => Region::Data,
        }
    }

    /// Program memory is not writable through the bus.
    #[inline]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Region::Program)
    }
}

/// The concrete backing stores behind a [`Memory`] request.
///
/// Exactly one source drives the data lines for any address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Program(usize),
    Data(usize),
}

impl Source {
    #[inline]
    fn route(address: u16) -> Self {
        match Region::decode(address) {
            Region::Program => Source::Program(address as usize),
            Region::Stack | Region::Data => Source::Data((address - DATA_START) as usize),
        }
    }
}

/// Program ROM plus data RAM behind a single address decoder.
#[derive(Clone, Serialize, Deserialize)]
pub struct SystemBus {
    program: Vec<u8>,
    data: Vec<u8>,
}

impl SystemBus {
    /// Create a bus with both stores zeroed.
    pub fn new() -> Self {
        Self {
            program: vec![0; PROGRAM_SIZE],
            data: vec![0; DATA_SIZE],
        }
    }

    /// Copy a program image into program memory starting at 0x0000.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        if image.len() > PROGRAM_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: image.len(),
                available: PROGRAM_SIZE,
            });
        }
        self.program.fill(0);
        self.program[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Write straight into program memory, bypassing the read-only decode.
    /// Used by loaders and debuggers, never by the core.
    pub fn poke_program(&mut self, address: u8, value: u8) {
        self.program[address as usize] = value;
    }

    /// Clear data memory. Program memory is kept.
    pub fn clear_data(&mut self) {
        self.data.fill(0);
    }

    /// Read a contiguous range for display, wrapping at 0xFFFF.
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u8)> {
        (0..count)
            .map(|i| {
                let addr = start.wrapping_add(i as u16);
                (addr, self.read(addr))
            })
            .collect()
    }

    /// Program memory contents.
    pub fn program(&self) -> &[u8] {
        &self.program
    }
}

impl Memory for SystemBus {
    #[inline]
    fn read(&self, address: u16) -> u8 {
        match Source::route(address) {
            Source::Program(i) => self.program[i],
            Source::Data(i) => self.data[i],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match Source::route(address) {
            Source::Program(_) => {
                log::warn!("ignored write of {:#04x} to program memory at {:#06x}", value, address);
            }
            Source::Data(i) => self.data[i] = value,
        }
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program_used = self.program.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let data_non_zero = self.data.iter().filter(|&&b| b != 0).count();

        f.debug_struct("SystemBus")
            .field("program_bytes", &program_used)
            .field("non_zero_data", &data_non_zero)
            .finish()
    }
}

/// Errors that can occur while loading memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds program memory ({available} bytes)")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_decode() {
        assert_eq!(Region::decode(0x0000), Region::Program);
        assert_eq!(Region::decode(0x00FF), Region::Program);
        assert_eq!(Region::decode(0x0100), Region::Stack);
        assert_eq!(Region::decode(0x01FF), Region::Stack);
        assert_eq!(Region::decode(0x0200), Region::Data);
        assert_eq!(Region::decode(0xFFFF), Region::Data);
    }

    #[test]
    fn test_data_read_write() {
        let mut bus = SystemBus::new();
        bus.write(0x0200, 0x42);
        bus.write(0xFFFF, 0x99);
        bus.write(0x01FE, 0x07);
        assert_eq!(bus.read(0x0200), 0x42);
        assert_eq!(bus.read(0xFFFF), 0x99);
        assert_eq!(bus.read(0x01FE), 0x07);
    }

    #[test]
    fn test_program_memory_is_read_only() {
        let mut bus = SystemBus::new();
        bus.load_program(&[0x01, 0x0A]).unwrap();
        bus.write(0x0000, 0xEE);
        assert_eq!(bus.read(0x0000), 0x01);
        assert_eq!(bus.read(0x0001), 0x0A);
    }

    #[test]
    fn test_regions_do_not_alias() {
        let mut bus = SystemBus::new();
        bus.load_program(&[0xAA; 4]).unwrap();
        bus.write(0x0100, 0x55);
        assert_eq!(bus.read(0x0000), 0xAA);
        assert_eq!(bus.read(0x0100), 0x55);
    }

    #[test]
    fn test_load_program_bounds() {
        let mut bus = SystemBus::new();
        assert!(bus.load_program(&[0; PROGRAM_SIZE]).is_ok());
        assert_eq!(
            bus.load_program(&[0; PROGRAM_SIZE + 1]),
            Err(MemoryError::ProgramTooLarge { size: PROGRAM_SIZE + 1, available: PROGRAM_SIZE })
        );
    }
}
