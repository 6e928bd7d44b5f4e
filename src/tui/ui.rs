//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::alu::flags;
use crate::CpuState;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code, registers, status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory, stack, help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_stack(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;
    let value = |v: String| Span::styled(v, Style::default().fg(Color::White));

    let content = vec![
        Line::from(vec![
            Span::raw("A: "), value(format!("{:02X}", regs.acc())),
            Span::raw("  X: "), value(format!("{:02X}", regs.x())),
            Span::raw("  Y: "), value(format!("{:02X}", regs.y())),
            Span::raw("  IR: "), value(format!("{:02X}", regs.ir())),
        ]),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:04X}", regs.pc()), Style::default().fg(Color::Yellow)),
            Span::raw("  SP: "), value(format!("{:02X}", regs.sp())),
            Span::raw("  ADDR: "), value(format!("{:04X}", regs.address())),
        ]),
        Line::from(flag_spans(regs.flags().bits())),
        Line::from(vec![
            Span::raw("Phase: "),
            Span::styled(format!("{:<9}", app.cpu.phase()), Style::default().fg(Color::Cyan)),
            Span::raw(" ALU: "),
            if app.cpu.alu.busy() {
                Span::styled("busy", Style::default().fg(Color::Yellow))
            } else {
                Span::styled("idle", Style::default().fg(Color::DarkGray))
            },
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("  Instr: "),
            Span::styled(format!("{}", app.cpu.instructions), Style::default().fg(Color::Cyan)),
            Span::raw("  State: "),
            Span::styled(format!("{:?}", app.cpu.state),
                if app.cpu.state == CpuState::Running {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// One span per FLAGS bit, most significant first.
fn flag_spans(bits: u8) -> Vec<Span<'static>> {
    const NAMES: [(u8, &str); 8] = [
        (flags::EXTENDED, "E"),
        (flags::BREAK, "B"),
        (flags::DECIMAL, "D"),
        (flags::IRQ_DISABLE, "I"),
        (flags::OVERFLOW, "V"),
        (flags::NEGATIVE, "N"),
        (flags::ZERO, "Z"),
        (flags::CARRY, "C"),
    ];

    let mut spans = vec![Span::raw("P:  ")];
    for (mask, name) in NAMES {
        let style = if bits & mask != 0 {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{} ", name), style));
    }
    spans
}

fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let last = app.cpu.regs.address();

    let items: Vec<ListItem> = app
        .memory_rows(visible_rows)
        .into_iter()
        .map(|(base, bytes)| {
            let mut spans = vec![Span::raw(format!("{:04X}: ", base))];
            for (i, b) in bytes.iter().enumerate() {
                let addr = base.wrapping_add(i as u16);
                let style = if addr == last {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if *b != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:02X} ", b), style));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

fn draw_stack(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = (area.height as usize).saturating_sub(2);
    let items: Vec<ListItem> = app
        .stack_view(rows)
        .into_iter()
        .map(|(addr, value)| ListItem::new(format!("{:04X}: {:02X}", addr, value)))
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(format!(" Stack (SP={:02X}) ", app.cpu.regs.sp()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(list, area);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  c: Clock  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓ PgUp PgDn: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
