//! The clocked arithmetic unit.
//!
//! Single-cycle operations latch their result and flags on the same edge
//! they are issued. MUL, DIV and SQRT run an internal sub-state machine:
//!
//! ```text
//!   Idle --issue, step 1--> Busy --step--> ... --last step--> Ready --edge--> Idle (done)
//! ```
//!
//! `done` is high for exactly the one cycle following the completing edge.
//! While the unit is `Busy` or `Ready` new requests are refused.

use serde::{Serialize, Deserialize};

use crate::alu::arith;
use crate::alu::{AluOp, Flags};

/// Operation select and operands driven by the control unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluRequest {
    pub op: AluOp,
    pub a: u8,
    pub b: u8,
}

impl AluRequest {
    pub const fn new(op: AluOp, a: u8, b: u8) -> Self {
        Self { op, a, b }
    }
}

/// A completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluResult {
    pub op: AluOp,
    pub value: u8,
    pub flags: Flags,
}

/// Working registers of an in-flight multi-step operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    op: AluOp,
    a: u8,
    b: u8,
    flags: Flags,
    step: u8,
    /// Multiplier running total.
    total: u8,
    /// Divider partial remainder and quotient shift register.
    remainder: u16,
    quotient: u8,
}

impl Job {
    fn start(request: AluRequest, flags: Flags) -> Self {
        Self {
            op: request.op,
            a: request.a,
            b: request.b,
            flags,
            step: 0,
            total: 0,
            remainder: 0,
            quotient: request.a,
        }
    }

    /// Run the next internal step.
    fn advance(mut self) -> Self {
        match self.op {
            AluOp::Mul => self.total = arith::mul_step(self.total, self.a, self.b, self.step),
            AluOp::Div => {
                let (r, q) = arith::div_step(self.remainder, self.quotient, self.b);
                self.remainder = r;
                self.quotient = q;
            }
            AluOp::Sqrt => self.total = arith::isqrt(self.a),
            _ => {}
        }
        self.step += 1;
        self
    }

    fn exhausted(&self) -> bool {
        self.step >= self.op.step_count()
    }

    fn result(&self) -> AluResult {
        let value = match self.op {
            AluOp::Div => self.quotient,
            _ => self.total,
        };
        AluResult {
            op: self.op,
            value,
            flags: arith::finish_flags(self.op, value, self.b, self.flags),
        }
    }
}

/// Sub-state of the arithmetic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AluState {
    /// Accepting requests.
    #[default]
    Idle,
    /// A multi-step operation is in progress.
    Busy(Job),
    /// Steps are exhausted; `done` is raised on the next edge.
    Ready(AluResult),
}

impl AluState {
    /// True while a request would be refused.
    pub const fn in_progress(&self) -> bool {
        !matches!(self, AluState::Idle)
    }
}

/// Pure transition function.
///
/// Given the current state, the (optional) request presented this cycle and
/// the FLAGS register as currently visible, returns the state after the edge
/// and the result to latch if the edge completes an operation.
pub fn next_state(
    state: AluState,
    request: Option<AluRequest>,
    flags: Flags,
) -> (AluState, Option<AluResult>) {
    match state {
        AluState::Idle => match request {
            None => (AluState::Idle, None),
            Some(req) if req.op.is_multi_step() => {
                // The first internal step runs on the issue edge.
                let job = Job::start(req, flags).advance();
                if job.exhausted() {
                    (AluState::Ready(job.result()), None)
                } else {
                    (AluState::Busy(job), None)
                }
            }
            Some(req) => {
                // Single-cycle ops always evaluate.
                let (value, flags) = arith::evaluate(req.op, req.a, req.b, flags)
                    .unwrap_or((0, flags));
                (AluState::Idle, Some(AluResult { op: req.op, value, flags }))
            }
        },
        AluState::Busy(job) => {
            let job = job.advance();
            if job.exhausted() {
                (AluState::Ready(job.result()), None)
            } else {
                (AluState::Busy(job), None)
            }
        }
        AluState::Ready(result) => (AluState::Idle, Some(result)),
    }
}

/// The arithmetic unit with its output latches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArithmeticUnit {
    state: AluState,
    result: u8,
    flags: Flags,
    done: bool,
    last_op: Option<AluOp>,
}

impl ArithmeticUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any in-flight operation and clear the output latches.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one clock edge.
    ///
    /// A request presented while an operation is in progress is dropped; the
    /// caller is expected to poll [`done`](Self::done) first.
    pub fn clock(&mut self, request: Option<AluRequest>, flags: Flags) {
        if let Some(req) = request {
            if self.state.in_progress() {
                log::warn!("ALU busy; dropping {} request", req.op);
            }
        }
        let (state, completed) = next_state(self.state, request, flags);
        self.state = state;
        self.done = completed.is_some();
        if let Some(out) = completed {
            self.result = out.value;
            self.flags = out.flags;
            self.last_op = Some(out.op);
        }
    }

    /// High for one cycle after an operation completes.
    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    /// True while a multi-step operation is running.
    #[inline]
    pub fn busy(&self) -> bool {
        self.state.in_progress()
    }

    /// Last latched result.
    #[inline]
    pub fn result(&self) -> u8 {
        self.result
    }

    /// Last latched flags. Only bits 0-3 are meaningful.
    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Operation that produced the latched result.
    #[inline]
    pub fn last_op(&self) -> Option<AluOp> {
        self.last_op
    }

    #[inline]
    pub fn state(&self) -> &AluState {
        &self.state
    }
}
