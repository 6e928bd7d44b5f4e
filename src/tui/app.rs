//! Debugger application state and logic.

use std::collections::HashSet;

use crate::asm::disasm::disassemble_at;
use crate::cpu::memory::{Memory, DATA_PAGE};
use crate::{Cpu, CpuState};

/// Instructions retired per frame while running.
const RUN_BATCH: usize = 64;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// First address shown in the memory view.
    pub mem_base: u16,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut cpu = Cpu::new();
        let status = match cpu.load_program(&program) {
            Ok(()) => "Ready. 's' step, 'c' clock, 'r' run, 'q' quit.".to_string(),
            Err(e) => format!("Load failed: {}", e),
        };

        Self {
            cpu,
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status,
            mem_base: DATA_PAGE,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.cpu.state == CpuState::Trapped {
            self.status = format!("Trapped at PC={:04X}; 'x' to reset", self.cpu.regs.pc());
            self.running = false;
            return;
        }

        match self.cpu.step() {
            Ok(retired) => {
                let text = disassemble_at(self.cpu.bus.program(), retired.pc).text;
                self.status = format!("{:04X}: {}  ({} cycles)", retired.pc, text, retired.cycles);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Apply a single clock edge.
    pub fn clock(&mut self) {
        let phase = self.cpu.phase();
        match self.cpu.tick() {
            Some(retired) => {
                self.status = format!("{} -> done: {} at {:04X}", phase, retired.instr, retired.pc);
            }
            None => self.status = format!("{} -> {}", phase, self.cpu.phase()),
        }
    }

    /// Run until trap, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..RUN_BATCH {
            if !self.running {
                return;
            }

            if self.cpu.state == CpuState::Trapped {
                self.running = false;
                self.status = format!(
                    "Trapped at PC={:04X} after {} instructions",
                    self.cpu.regs.pc(),
                    self.cpu.instructions
                );
                return;
            }

            self.step();

            let pc = self.cpu.regs.pc();
            if self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC={:04X}", pc);
            }
        }
    }

    /// Toggle breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:04X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:04X}", pc);
        }
    }

    /// Reset the core. Memory, including data written by the program, is kept.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    pub fn scroll_memory(&mut self, rows: i32) {
        let delta = (rows * 8) as i16;
        self.mem_base = self.mem_base.wrapping_add_signed(delta);
    }

    /// Disassembly starting a little before the current instruction.
    ///
    /// Returns `(address, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let program = self.cpu.bus.program();
        let pc = self.cpu.regs.pc();

        // Sweep from zero so multi-byte instructions stay aligned.
        let mut all = Vec::new();
        let mut addr = 0u16;
        while (addr as usize) < program.len() {
            let line = disassemble_at(program, addr);
            let len = line.bytes.len() as u16;
            all.push((addr, line.text, addr == pc));
            addr += len;
        }

        let current = all.iter().position(|(a, _, _)| *a >= pc).unwrap_or(0);
        let start = current.saturating_sub(lines / 3);
        all.into_iter().skip(start).take(lines).collect()
    }

    /// `rows` rows of eight bytes from the memory view base.
    pub fn memory_rows(&self, rows: usize) -> Vec<(u16, Vec<u8>)> {
        (0..rows)
            .map(|r| {
                let base = self.mem_base.wrapping_add((r * 8) as u16);
                let bytes = (0..8).map(|i| self.cpu.bus.read(base.wrapping_add(i))).collect();
                (base, bytes)
            })
            .collect()
    }

    /// Stack contents from the top of stack up to 0x01FF.
    pub fn stack_view(&self, max: usize) -> Vec<(u16, u8)> {
        let sp = self.cpu.regs.sp();
        (sp..=0xFF)
            .take(max)
            .map(|offset| {
                let addr = 0x0100 | u16::from(offset);
                (addr, self.cpu.bus.read(addr))
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('c') => {
                            app.running = false;
                            app.clock();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-8),
                        KeyCode::PageDown => app.scroll_memory(8),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn app(source: &str) -> DebuggerApp {
        DebuggerApp::new(assemble(source).unwrap())
    }

    #[test]
    fn test_run_stops_on_trap() {
        let mut app = app("LDA #3\nhalt: BRA halt");
        app.run();
        app.tick();
        assert!(!app.running);
        assert_eq!(app.cpu.state, CpuState::Trapped);
        assert!(app.status.contains("Trapped"));
    }

    #[test]
    fn test_breakpoint_pauses() {
        let mut app = app("NOP\nNOP\nNOP\nhalt: BRA halt");
        app.step();
        app.toggle_breakpoint();
        app.reset();
        app.run();
        app.tick();
        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc(), 1);
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let mut app = app("LDA #1\nMUL\nNOP");
        app.step();
        let lines = app.get_disassembly(4);
        let current: Vec<_> = lines.iter().filter(|(_, _, cur)| *cur).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].0, 2);
        assert_eq!(current[0].1, "MUL");
    }

    #[test]
    fn test_clock_advances_one_phase() {
        let mut app = app("NOP");
        app.clock();
        assert!(app.status.starts_with("IDLE -> FETCH"));
    }

    #[test]
    fn test_stack_view() {
        let mut app = app("LDA #$AB\nPHA");
        app.step();
        app.step();
        assert_eq!(app.stack_view(4), vec![(0x01FE, 0xAB), (0x01FF, 0x00)]);
    }
}
