//! TUI debugger for the acc8 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register, FLAGS and sequencer phase display
//! - Memory and stack views
//! - Instruction step, single clock edge, run and breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
