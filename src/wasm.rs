//! WebAssembly bindings for the acc8 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::{Cpu, CpuState, RunOutcome};
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_at;
use crate::cpu::memory::Memory;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    program: Vec<u8>,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            program: Vec::new(),
        }
    }

    /// Load a program from assembly source code. Returns its size in bytes.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let image = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;
        self.load_bytes(&image)?;
        Ok(image.len())
    }

    /// Load a raw program image.
    #[wasm_bindgen]
    pub fn load_bytes(&mut self, image: &[u8]) -> Result<(), JsError> {
        let mut cpu = Cpu::new();
        cpu.load_program(image).map_err(|e| JsError::new(&e.to_string()))?;
        self.cpu = cpu;
        self.program = image.to_vec();
        Ok(())
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let retired = self.cpu.step().map_err(|e| JsError::new(&e.to_string()))?;
        Ok(disassemble_at(&self.program, retired.pc).text)
    }

    /// Apply one clock edge. Returns true if an instruction retired.
    #[wasm_bindgen]
    pub fn clock(&mut self) -> bool {
        self.cpu.tick().is_some()
    }

    /// Run until a trap or `max_instructions`. Returns true if trapped.
    #[wasm_bindgen]
    pub fn run(&mut self, max_instructions: u32) -> Result<bool, JsError> {
        let outcome = self
            .cpu
            .run(u64::from(max_instructions))
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(matches!(outcome, RunOutcome::Trapped { .. }))
    }

    /// Reset the core. Memory is kept.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Reset the core and reload the program into cleared memory.
    #[wasm_bindgen]
    pub fn reload(&mut self) -> Result<(), JsError> {
        let program = self.program.clone();
        self.load_bytes(&program)
    }

    #[wasm_bindgen]
    pub fn is_trapped(&self) -> bool {
        self.cpu.state == CpuState::Trapped
    }

    /// Clock edges since reset.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Instructions retired since reset.
    #[wasm_bindgen]
    pub fn instructions(&self) -> u64 {
        self.cpu.instructions
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.regs.pc()
    }

    #[wasm_bindgen]
    pub fn accumulator(&self) -> u8 {
        self.cpu.regs.acc()
    }

    #[wasm_bindgen]
    pub fn flags(&self) -> u8 {
        self.cpu.regs.flags().bits()
    }

    /// Sequencer phase name.
    #[wasm_bindgen]
    pub fn phase(&self) -> String {
        self.cpu.phase().to_string()
    }

    #[wasm_bindgen]
    pub fn read(&self, address: u16) -> u8 {
        self.cpu.bus.read(address)
    }

    /// Copy `len` bytes starting at `start`.
    #[wasm_bindgen]
    pub fn memory_range(&self, start: u16, len: u16) -> js_sys::Uint8Array {
        let bytes: Vec<u8> = self.cpu.bus.dump(start, len as usize).into_iter().map(|(_, b)| b).collect();
        js_sys::Uint8Array::from(bytes.as_slice())
    }

    /// Get registers as JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.regs.snapshot()).map_err(|e| JsError::new(&e.to_string()))
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the image.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u8>, JsError> {
    assemble(source).map_err(|e| JsError::new(&e.to_string()))
}

/// Disassemble the instruction at the start of `bytes`.
#[wasm_bindgen]
pub fn wasm_disassemble(bytes: &[u8]) -> String {
    disassemble_at(bytes, 0).text
}
