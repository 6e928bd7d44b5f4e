//! The clocked core.
//!
//! [`Cpu::tick`] advances every sequential element by one edge:
//! 1. the control unit computes this cycle's outputs from the visible state,
//! 2. the bus request is performed (a read is latched for the next cycle),
//! 3. the register file commits its write bundle,
//! 4. the ALU is clocked with any request.
//!
//! Instruction-level helpers ([`Cpu::step`], [`Cpu::run`]) are built on top
//! of `tick` and never bypass it.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::alu::ArithmeticUnit;
use crate::cpu::control::{BusRequest, ControlInputs, ControlUnit, Phase};
use crate::cpu::decode::Instruction;
use crate::cpu::memory::{Memory, MemoryError, SystemBus};
use crate::cpu::registers::{RegisterFile, RegisterSnapshot};

/// Run-level state, as seen by instruction runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Instructions are being retired normally.
    Running,
    /// The last instruction left PC on its own address without touching the
    /// stack. The core keeps clocking, but will never leave the loop.
    /// A `JSR` to itself is not a trap: each pass pushes another return
    /// address, so the machine state keeps changing.
    Trapped,
}

/// One retired instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retired {
    /// Address the instruction was fetched from.
    pub pc: u16,
    pub opcode: u8,
    pub instr: Instruction,
    /// Clock edges from FETCH to `done`, inclusive.
    pub cycles: u32,
    /// Registers after the retiring edge.
    pub regs: RegisterSnapshot,
}

impl Retired {
    /// True if the instruction jumped or branched to itself.
    pub fn is_trap(&self) -> bool {
        self.regs.pc == self.pc && self.instr != Instruction::Jsr
    }
}

/// Why [`Cpu::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// An instruction at `pc` looped onto itself.
    Trapped { pc: u16 },
    /// The instruction budget ran out first.
    LimitReached,
}

/// The processor: register file, ALU, control unit and the bus they share.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu<M: Memory = SystemBus> {
    pub regs: RegisterFile,
    pub alu: ArithmeticUnit,
    pub control: ControlUnit,
    pub bus: M,
    pub state: CpuState,
    /// Clock edges since reset.
    pub cycles: u64,
    /// Instructions retired since reset.
    pub instructions: u64,
    /// Byte returned by the most recent bus read.
    data_latch: u8,
    /// Edges spent on the instruction in flight.
    in_flight: u32,
    last: Option<Retired>,
}

impl Cpu<SystemBus> {
    /// Create a CPU with an empty system bus.
    pub fn new() -> Self {
        Self::with_bus(SystemBus::new())
    }

    /// Copy a program image into program memory. Registers are untouched.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), CpuError> {
        self.bus.load_program(image)?;
        Ok(())
    }
}

impl Default for Cpu<SystemBus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Memory> Cpu<M> {
    /// Create a CPU in its reset state around an existing bus.
    pub fn with_bus(bus: M) -> Self {
        Self {
            regs: RegisterFile::new(),
            alu: ArithmeticUnit::new(),
            control: ControlUnit::new(),
            bus,
            state: CpuState::Running,
            cycles: 0,
            instructions: 0,
            data_latch: 0,
            in_flight: 0,
            last: None,
        }
    }

    /// Asynchronous reset of every sequential element. Memory is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.alu.reset();
        self.control.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.instructions = 0;
        self.data_latch = 0;
        self.in_flight = 0;
        self.last = None;
        log::debug!("reset");
    }

    /// Apply one clock edge. Returns the instruction that retired on this
    /// edge, if any.
    pub fn tick(&mut self) -> Option<Retired> {
        let before = *self.control.state();
        let flags = self.regs.flags();

        let out = self.control.clock(&ControlInputs {
            regs: &self.regs,
            data: self.data_latch,
            alu_done: self.alu.done(),
            alu_result: self.alu.result(),
            alu_flags: self.alu.flags(),
        });

        match out.bus {
            BusRequest::None => {}
            BusRequest::Read(address) => self.data_latch = self.bus.read(address),
            BusRequest::Write(address, value) => self.bus.write(address, value),
        }

        self.regs.clock(&out.writes);
        self.alu.clock(out.alu, flags);

        self.cycles += 1;
        if before.phase != Phase::Idle {
            self.in_flight += 1;
        }

        if !out.done {
            return None;
        }

        let retired = Retired {
            pc: before.origin,
            opcode: self.regs.ir(),
            instr: before.instr,
            cycles: self.in_flight,
            regs: self.regs.snapshot(),
        };
        self.instructions += 1;
        self.in_flight = 0;
        self.last = Some(retired);
        if retired.is_trap() {
            self.state = CpuState::Trapped;
        }

        log::trace!(
            "{:04X}  {:<6} {:>2} cyc  {:?}",
            retired.pc,
            retired.instr.mnemonic(),
            retired.cycles,
            self.regs
        );

        Some(retired)
    }

    /// Clock until the next instruction retires.
    pub fn step(&mut self) -> Result<Retired, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }
        loop {
            if let Some(retired) = self.tick() {
                return Ok(retired);
            }
            if self.in_flight > MAX_INSTRUCTION_CYCLES {
                return Err(CpuError::Stalled { phase: self.control.phase(), cycles: self.in_flight });
            }
        }
    }

    /// Retire up to `max_instructions`, stopping early on a trap.
    pub fn run(&mut self, max_instructions: u64) -> Result<RunOutcome, CpuError> {
        for _ in 0..max_instructions {
            let retired = self.step()?;
            if retired.is_trap() {
                return Ok(RunOutcome::Trapped { pc: retired.pc });
            }
        }
        Ok(RunOutcome::LimitReached)
    }

    /// Current sequencer phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.control.phase()
    }

    /// Most recently retired instruction.
    pub fn last_retired(&self) -> Option<&Retired> {
        self.last.as_ref()
    }

    /// Byte latched by the last bus read.
    #[inline]
    pub fn data_latch(&self) -> u8 {
        self.data_latch
    }
}

/// No instruction needs anywhere near this many edges; exceeding it means the
/// sequencer is wedged.
const MAX_INSTRUCTION_CYCLES: u32 = 64;

/// Errors raised by the instruction-level helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("instruction did not retire after {cycles} cycles (stuck in {phase})")]
    Stalled { phase: Phase, cycles: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alu::flags;

    fn cpu_with(program: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(program).unwrap();
        cpu
    }

    #[test]
    fn test_reset_state() {
        let cpu = Cpu::new();
        assert_eq!(cpu.phase(), Phase::Idle);
        assert_eq!(cpu.regs.pc(), 0);
        assert_eq!(cpu.regs.sp(), 0xFF);
        assert_eq!(cpu.state, CpuState::Running);
    }

    #[test]
    fn test_phase_sequence_for_immediate_load() {
        // LDA #$0A
        let mut cpu = cpu_with(&[0x01, 0x0A]);
        let mut phases = Vec::new();
        loop {
            phases.push(cpu.phase());
            if cpu.tick().is_some() {
                break;
            }
        }
        assert_eq!(
            phases,
            vec![Phase::Idle, Phase::Fetch, Phase::Decode, Phase::Execute, Phase::MemRead]
        );
        assert_eq!(cpu.regs.acc(), 0x0A);
        assert_eq!(cpu.regs.pc(), 0x0002);
        assert_eq!(cpu.regs.ir(), 0x01);
    }

    #[test]
    fn test_step_reports_cycles() {
        // NOP; LDA #1; MUL
        let mut cpu = cpu_with(&[0x00, 0x01, 0x01, 0x14]);
        let nop = cpu.step().unwrap();
        let lda = cpu.step().unwrap();
        let mul = cpu.step().unwrap();
        assert_eq!(nop.instr, Instruction::Nop);
        assert!(nop.cycles < lda.cycles);
        assert!(lda.cycles < mul.cycles);
    }

    #[test]
    fn test_store_and_load_direct() {
        // LDA #$5A; STA $10; LDA #0; LDA $10
        let mut cpu = cpu_with(&[0x01, 0x5A, 0x04, 0x10, 0x01, 0x00, 0x02, 0x10]);
        for _ in 0..4 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.bus.read(0x0210), 0x5A);
        assert_eq!(cpu.regs.acc(), 0x5A);
        assert_eq!(cpu.regs.pc(), 0x0008);
    }

    #[test]
    fn test_add_sets_flags_and_keeps_high_nibble() {
        // LDA #$80; PHA; PLP; LDA #$FF; ADD #1
        let mut cpu = cpu_with(&[0x01, 0x80, 0x60, 0x67, 0x01, 0xFF, 0x10, 0x01]);
        cpu.run(5).unwrap();
        assert_eq!(cpu.regs.acc(), 0x00);
        let p = cpu.regs.flags();
        assert!(p.zero());
        assert!(p.carry());
        assert!(!p.negative());
        assert!(p.contains(flags::EXTENDED));
    }

    #[test]
    fn test_trap_detection() {
        // loop: JMP loop
        let mut cpu = cpu_with(&[0x50, 0x00, 0x00]);
        assert_eq!(cpu.run(10).unwrap(), RunOutcome::Trapped { pc: 0 });
        assert_eq!(cpu.state, CpuState::Trapped);
        assert_eq!(cpu.step(), Err(CpuError::NotRunning(CpuState::Trapped)));

        // The core itself keeps going.
        assert!((0..20).any(|_| cpu.tick().is_some()));
    }

    #[test]
    fn test_self_call_is_not_a_trap() {
        // here: JSR here
        let mut cpu = cpu_with(&[0x52, 0x00, 0x00]);
        assert_eq!(cpu.run(3).unwrap(), RunOutcome::LimitReached);
        assert_eq!(cpu.state, CpuState::Running);
        assert_eq!(cpu.regs.pc(), 0x0000);
        assert_eq!(cpu.regs.sp(), 0xF9);
    }

    #[test]
    fn test_limit_reached() {
        let mut cpu = cpu_with(&[0x00; 16]);
        assert_eq!(cpu.run(4).unwrap(), RunOutcome::LimitReached);
        assert_eq!(cpu.instructions, 4);
        assert_eq!(cpu.regs.pc(), 4);
    }

    #[test]
    fn test_reset_mid_instruction_keeps_memory() {
        // LDA #7; STA $00; MUL
        let mut cpu = cpu_with(&[0x01, 0x07, 0x04, 0x00, 0x14]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        cpu.tick();
        cpu.tick();
        cpu.tick();
        assert_ne!(cpu.phase(), Phase::Idle);

        cpu.reset();
        assert_eq!(cpu.phase(), Phase::Idle);
        assert_eq!(cpu.regs.acc(), 0);
        assert_eq!(cpu.regs.pc(), 0);
        assert!(!cpu.alu.busy());
        assert_eq!(cpu.bus.read(0x0200), 0x07);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut cpu = Cpu::new();
        let err = cpu.load_program(&[0; 0x101]).unwrap_err();
        assert!(matches!(err, CpuError::MemoryError(MemoryError::ProgramTooLarge { .. })));
    }
}
