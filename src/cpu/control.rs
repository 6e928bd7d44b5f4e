//! The control unit: a nine-phase instruction sequencer.
//!
//! ```text
//!            +------------------------------------------------------+
//!            v                                                      |
//!   IDLE -> FETCH -> DECODE -> EXECUTE -+-> MEM_READ <-+--> ALU_OP --+
//!                                       |     |   \___/            |
//!                                       |     +--> MEM_WRITE ------+
//!                                       +-> BRANCH ----------------+
//!                                       +-> JUMP <-> MEM_WRITE ----+
//! ```
//!
//! Each clock the sequencer looks at its latched state and the visible
//! inputs (registers, the byte returned by the previous cycle's read, the
//! ALU handshake) and produces:
//! - at most one bus request,
//! - a bundle of register write-enables,
//! - at most one ALU request,
//! - the `done` strobe when an instruction retires.
//!
//! [`next_state`] is a pure function of `(state, inputs)`; [`ControlUnit`]
//! just holds the state between edges.
//!
//! PC bookkeeping: PC holds the opcode address through DECODE. Every phase
//! that consumes a byte of the instruction stream (the opcode in EXECUTE,
//! each operand byte afterwards) increments PC once, so PC names the next
//! instruction when `done` is raised.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::alu::{arith, AluOp, AluRequest, Flags};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::memory::{DATA_PAGE, STACK_BASE};
use crate::cpu::registers::{Register, RegisterFile, RegisterWrites};

/// Externally visible sequencer phase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Fetch,
    Decode,
    Execute,
    MemRead,
    MemWrite,
    AluOp,
    Branch,
    Jump,
}

impl Phase {
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Fetch => "FETCH",
            Phase::Decode => "DECODE",
            Phase::Execute => "EXECUTE",
            Phase::MemRead => "MEM_READ",
            Phase::MemWrite => "MEM_WRITE",
            Phase::AluOp => "ALU_OP",
            Phase::Branch => "BRANCH",
            Phase::Jump => "JUMP",
        }
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the next MEM_READ, MEM_WRITE, ALU_OP or JUMP phase has to do with
/// its input, plus any bytes latched along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Micro {
    #[default]
    None,
    /// Returned byte goes to `reg`. `operand` is set when the byte came from
    /// the instruction stream and PC must step past it.
    Load { reg: Register, operand: bool },
    /// Returned byte is a direct address to read into `reg`.
    ResolveLoad(Register),
    /// Returned byte is a direct address to store `reg` to.
    ResolveStore(Register),
    /// Returned byte is a direct address holding an ALU operand.
    ResolveAlu(AluOp),
    /// Returned byte is operand b for `op`.
    AluOperand { op: AluOp, operand: bool },
    /// Waiting on the ALU handshake.
    AwaitAlu { write_back: bool },
    /// RTS: returned byte is the low half of the return address.
    PullReturnLow,
    /// RTS: returned byte is the high half.
    PullReturnHigh { lo: u8 },
    /// JMP/JSR: returned byte is the low half of the target.
    AddressLow,
    /// JMP/JSR: returned byte is the high half.
    AddressHigh { lo: u8 },
    /// JSR: high half of the return address is being pushed.
    PushReturnLow { ret_lo: u8, target: u16 },
    /// Final PC write.
    JumpTo(u16),
    /// A store is on the bus.
    StoreDone,
}

/// Latched sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub phase: Phase,
    pub micro: Micro,
    /// Instruction latched in DECODE.
    pub instr: Instruction,
    /// Address the current instruction was fetched from.
    pub origin: u16,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            micro: Micro::None,
            instr: Instruction::Nop,
            origin: 0,
        }
    }
}

impl ControlState {
    fn goto(self, phase: Phase, micro: Micro) -> Self {
        Self { phase, micro, ..self }
    }
}

/// A single bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusRequest {
    #[default]
    None,
    Read(u16),
    Write(u16, u8),
}

impl BusRequest {
    pub fn address(&self) -> Option<u16> {
        match *self {
            BusRequest::None => None,
            BusRequest::Read(a) | BusRequest::Write(a, _) => Some(a),
        }
    }
}

/// Everything the sequencer can see during a cycle.
#[derive(Debug, Clone, Copy)]
pub struct ControlInputs<'a> {
    pub regs: &'a RegisterFile,
    /// Byte returned by the read issued on the previous cycle.
    pub data: u8,
    pub alu_done: bool,
    pub alu_result: u8,
    pub alu_flags: Flags,
}

/// Everything the sequencer drives during a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlOutputs {
    pub bus: BusRequest,
    pub writes: RegisterWrites,
    pub alu: Option<AluRequest>,
    pub done: bool,
}

impl ControlOutputs {
    fn read(&mut self, address: u16) {
        self.bus = BusRequest::Read(address);
        self.writes.address = Some(address);
    }

    fn write(&mut self, address: u16, value: u8) {
        self.bus = BusRequest::Write(address, value);
        self.writes.address = Some(address);
    }

    fn advance_pc(&mut self) {
        self.writes.pc.increment = true;
    }

    fn retire(&mut self) {
        self.done = true;
    }
}

#[inline]
fn stack_address(sp: u8) -> u16 {
    STACK_BASE | u16::from(sp)
}

#[inline]
fn direct_address(byte: u8) -> u16 {
    DATA_PAGE | u16::from(byte)
}

/// Pure transition function of the control unit.
pub fn next_state(state: &ControlState, inputs: &ControlInputs<'_>) -> (ControlState, ControlOutputs) {
    let regs = inputs.regs;
    let pc = regs.pc();
    let mut out = ControlOutputs::default();

    let next = match state.phase {
        Phase::Idle => ControlState { origin: pc, ..state.goto(Phase::Fetch, Micro::None) },

        Phase::Fetch => {
            out.read(pc);
            ControlState { origin: pc, ..state.goto(Phase::Decode, Micro::None) }
        }

        Phase::Decode => {
            out.writes.ir = Some(inputs.data);
            ControlState {
                instr: decode::decode(inputs.data),
                ..state.goto(Phase::Execute, Micro::None)
            }
        }

        Phase::Execute => execute(state, regs, &mut out),

        Phase::MemRead => mem_read(state, inputs, &mut out),

        Phase::MemWrite => match state.micro {
            Micro::PushReturnLow { ret_lo, target } => {
                let sp = regs.sp().wrapping_sub(1);
                out.write(stack_address(sp), ret_lo);
                out.writes.sp = Some(sp);
                state.goto(Phase::Jump, Micro::JumpTo(target))
            }
            _ => {
                out.retire();
                state.goto(Phase::Idle, Micro::None)
            }
        },

        Phase::AluOp => {
            if inputs.alu_done {
                if let Micro::AwaitAlu { write_back: true } = state.micro {
                    out.writes.acc = Some(inputs.alu_result);
                }
                out.writes.flags = Some(regs.flags().merge_alu(inputs.alu_flags));
                out.retire();
                state.goto(Phase::Idle, Micro::None)
            } else {
                *state
            }
        }

        Phase::Branch => {
            // PC sits on the offset byte; the target is relative to the byte after it.
            let offset = inputs.data as i8;
            let target = pc.wrapping_add(1).wrapping_add_signed(i16::from(offset));
            out.writes.pc.load = Some(target);
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }

        Phase::Jump => jump(state, inputs, &mut out),
    };

    (next, out)
}

fn execute(state: &ControlState, regs: &RegisterFile, out: &mut ControlOutputs) -> ControlState {
    let pc = regs.pc();
    let acc = regs.acc();
    let operand_addr = pc.wrapping_add(1);

    // Every path consumes the opcode byte.
    out.advance_pc();

    match state.instr {
        Instruction::Nop => {
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }
        Instruction::Illegal(op) => {
            log::warn!("illegal opcode {:#04x} at {:#06x}; executing as NOP", op, state.origin);
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }

        Instruction::LoadImmediate(reg) => {
            out.read(operand_addr);
            state.goto(Phase::MemRead, Micro::Load { reg, operand: true })
        }
        Instruction::LoadDirect(reg) => {
            out.read(operand_addr);
            state.goto(Phase::MemRead, Micro::ResolveLoad(reg))
        }
        Instruction::StoreDirect(reg) => {
            out.read(operand_addr);
            state.goto(Phase::MemRead, Micro::ResolveStore(reg))
        }
        Instruction::AluImmediate(op) => {
            out.read(operand_addr);
            state.goto(Phase::MemRead, Micro::AluOperand { op, operand: true })
        }
        Instruction::AluDirect(op) => {
            out.read(operand_addr);
            state.goto(Phase::MemRead, Micro::ResolveAlu(op))
        }

        Instruction::AluImplied(op) => {
            let b = match op {
                AluOp::Mul | AluOp::Div => regs.x(),
                _ => 0,
            };
            out.alu = Some(AluRequest::new(op, acc, b));
            state.goto(Phase::AluOp, Micro::AwaitAlu { write_back: op.writes_result() })
        }
        Instruction::Neg => {
            out.alu = Some(AluRequest::new(AluOp::Sub, 0, acc));
            state.goto(Phase::AluOp, Micro::AwaitAlu { write_back: true })
        }
        Instruction::Abs => {
            let req = if arith::is_negative(acc) {
                AluRequest::new(AluOp::Sub, 0, acc)
            } else {
                AluRequest::new(AluOp::Or, acc, 0)
            };
            out.alu = Some(req);
            state.goto(Phase::AluOp, Micro::AwaitAlu { write_back: true })
        }

        Instruction::Branch(cond) => {
            if cond.holds(regs.flags()) {
                out.read(operand_addr);
                state.goto(Phase::Branch, Micro::None)
            } else {
                // Skip opcode and offset in one load.
                out.writes.pc.load = Some(pc.wrapping_add(2));
                out.retire();
                state.goto(Phase::Idle, Micro::None)
            }
        }

        Instruction::Jmp | Instruction::Jsr => {
            out.read(operand_addr);
            state.goto(Phase::Jump, Micro::AddressLow)
        }

        Instruction::Rts => {
            out.read(stack_address(regs.sp()));
            out.writes.sp = Some(regs.sp().wrapping_add(1));
            state.goto(Phase::MemRead, Micro::PullReturnLow)
        }

        Instruction::Push(reg) => {
            let sp = regs.sp().wrapping_sub(1);
            out.write(stack_address(sp), regs.get(reg));
            out.writes.sp = Some(sp);
            state.goto(Phase::MemWrite, Micro::StoreDone)
        }
        Instruction::Pull(reg) => {
            out.read(stack_address(regs.sp()));
            out.writes.sp = Some(regs.sp().wrapping_add(1));
            state.goto(Phase::MemRead, Micro::Load { reg, operand: false })
        }
    }
}

fn mem_read(state: &ControlState, inputs: &ControlInputs<'_>, out: &mut ControlOutputs) -> ControlState {
    let regs = inputs.regs;
    let data = inputs.data;

    match state.micro {
        Micro::Load { reg, operand } => {
            out.writes.set(reg, data);
            if operand {
                out.advance_pc();
            }
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }
        Micro::ResolveLoad(reg) => {
            out.read(direct_address(data));
            out.advance_pc();
            state.goto(Phase::MemRead, Micro::Load { reg, operand: false })
        }
        Micro::ResolveStore(reg) => {
            out.write(direct_address(data), regs.get(reg));
            out.advance_pc();
            state.goto(Phase::MemWrite, Micro::StoreDone)
        }
        Micro::ResolveAlu(op) => {
            out.read(direct_address(data));
            out.advance_pc();
            state.goto(Phase::MemRead, Micro::AluOperand { op, operand: false })
        }
        Micro::AluOperand { op, operand } => {
            out.alu = Some(AluRequest::new(op, regs.acc(), data));
            if operand {
                out.advance_pc();
            }
            state.goto(Phase::AluOp, Micro::AwaitAlu { write_back: op.writes_result() })
        }
        Micro::PullReturnLow => {
            out.read(stack_address(regs.sp()));
            out.writes.sp = Some(regs.sp().wrapping_add(1));
            state.goto(Phase::MemRead, Micro::PullReturnHigh { lo: data })
        }
        Micro::PullReturnHigh { lo } => {
            let target = u16::from_le_bytes([lo, data]);
            state.goto(Phase::Jump, Micro::JumpTo(target))
        }
        other => {
            // Unreachable by construction; retire rather than wedge the sequencer.
            log::warn!("MEM_READ entered with {:?}", other);
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }
    }
}

fn jump(state: &ControlState, inputs: &ControlInputs<'_>, out: &mut ControlOutputs) -> ControlState {
    let regs = inputs.regs;
    let pc = regs.pc();

    match state.micro {
        Micro::AddressLow => {
            out.read(pc.wrapping_add(1));
            out.advance_pc();
            state.goto(Phase::Jump, Micro::AddressHigh { lo: inputs.data })
        }
        Micro::AddressHigh { lo } => {
            let target = u16::from_le_bytes([lo, inputs.data]);
            if state.instr == Instruction::Jsr {
                // PC sits on the high address byte; return to the byte after it.
                let [ret_lo, ret_hi] = pc.wrapping_add(1).to_le_bytes();
                let sp = regs.sp().wrapping_sub(1);
                out.write(stack_address(sp), ret_hi);
                out.writes.sp = Some(sp);
                state.goto(Phase::MemWrite, Micro::PushReturnLow { ret_lo, target })
            } else {
                out.writes.pc.direct = Some(target);
                out.retire();
                state.goto(Phase::Idle, Micro::None)
            }
        }
        Micro::JumpTo(target) => {
            out.writes.pc.direct = Some(target);
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }
        other => {
            log::warn!("JUMP entered with {:?}", other);
            out.retire();
            state.goto(Phase::Idle, Micro::None)
        }
    }
}

/// Holds the sequencer state between edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlUnit {
    state: ControlState,
}

impl ControlUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to IDLE, dropping any half-finished instruction.
    pub fn reset(&mut self) {
        self.state = ControlState::default();
    }

    /// Compute this cycle's outputs and latch the next state.
    pub fn clock(&mut self, inputs: &ControlInputs<'_>) -> ControlOutputs {
        let (next, out) = next_state(&self.state, inputs);
        self.state = next;
        out
    }

    #[inline]
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }
}
